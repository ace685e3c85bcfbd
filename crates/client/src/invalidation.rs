//! Push events → cache invalidation.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracker_shared::protocol::events;

use crate::query::{QueryCache, QueryKey};
use crate::ws::{EventChannel, Subscription};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidationError {
    #[error("invalidation rule with an empty event name")]
    EmptyEvent,
    #[error("event '{0}' has more than one invalidation rule")]
    DuplicateEvent(String),
    #[error("event '{0}' invalidates nothing")]
    NoPrefixes(String),
    #[error("event '{event}' lists prefix {prefix} twice")]
    DuplicatePrefix { event: String, prefix: QueryKey },
    #[error("event '{0}' lists an empty prefix")]
    EmptyPrefix(String),
}

/// When `event` arrives, every cache entry under one of `prefixes` is refetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRule {
    pub event: String,
    pub prefixes: Vec<QueryKey>,
}

impl InvalidationRule {
    pub fn new(event: impl Into<String>, prefixes: impl IntoIterator<Item = QueryKey>) -> Self {
        Self {
            event: event.into(),
            prefixes: prefixes.into_iter().collect(),
        }
    }
}

/// Validated set of invalidation rules, at most one per event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationTable {
    rules: Vec<InvalidationRule>,
}

impl InvalidationTable {
    pub fn new(rules: Vec<InvalidationRule>) -> Result<Self, InvalidationError> {
        let mut events = HashSet::new();
        for rule in &rules {
            if rule.event.trim().is_empty() {
                return Err(InvalidationError::EmptyEvent);
            }
            if !events.insert(rule.event.as_str()) {
                return Err(InvalidationError::DuplicateEvent(rule.event.clone()));
            }
            if rule.prefixes.is_empty() {
                return Err(InvalidationError::NoPrefixes(rule.event.clone()));
            }
            let mut seen = HashSet::new();
            for prefix in &rule.prefixes {
                if prefix.is_empty() {
                    return Err(InvalidationError::EmptyPrefix(rule.event.clone()));
                }
                if !seen.insert(prefix) {
                    return Err(InvalidationError::DuplicatePrefix {
                        event: rule.event.clone(),
                        prefix: prefix.clone(),
                    });
                }
            }
        }
        Ok(Self { rules })
    }

    /// The rules every tracker screen relies on.
    pub fn tracker_default() -> Self {
        use crate::resources::{attendance, dashboard, leaves, shifts};

        Self {
            rules: vec![
                InvalidationRule::new(events::DASHBOARD_STATS_UPDATE, [dashboard::keys::all()]),
                InvalidationRule::new(
                    events::ATTENDANCE_UPDATE,
                    [attendance::keys::all(), dashboard::keys::all()],
                ),
                InvalidationRule::new(
                    events::LEAVE_UPDATE,
                    [leaves::keys::all(), leaves::keys::balance(), dashboard::keys::all()],
                ),
                InvalidationRule::new(
                    events::SHIFT_UPDATE,
                    [shifts::keys::all(), dashboard::keys::all()],
                ),
            ],
        }
    }

    pub fn rules(&self) -> &[InvalidationRule] {
        &self.rules
    }

    pub fn prefixes_for(&self, event: &str) -> Option<&[QueryKey]> {
        self.rules
            .iter()
            .find(|r| r.event == event)
            .map(|r| r.prefixes.as_slice())
    }

    /// Register one handler per rule. Dropping the binding removes them all.
    pub fn bind(&self, channel: Arc<dyn EventChannel>, cache: QueryCache) -> InvalidationBinding {
        let subscriptions = self
            .rules
            .iter()
            .map(|rule| invalidate_on(channel.clone(), cache.clone(), &rule.event, rule.prefixes.clone()))
            .collect();
        InvalidationBinding { subscriptions }
    }
}

impl Default for InvalidationTable {
    fn default() -> Self {
        Self::tracker_default()
    }
}

/// Handlers registered by [`InvalidationTable::bind`].
pub struct InvalidationBinding {
    subscriptions: Vec<Subscription>,
}

impl InvalidationBinding {
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(Subscription::event)
    }
}

/// Invalidate `prefixes` whenever `event` fires, until the returned
/// subscription is dropped.
pub fn invalidate_on(
    channel: Arc<dyn EventChannel>,
    cache: QueryCache,
    event: &str,
    prefixes: Vec<QueryKey>,
) -> Subscription {
    let name = event.to_string();
    Subscription::new(channel, event, move |_| {
        let matched: usize = prefixes.iter().map(|p| cache.invalidate(p)).sum();
        crate::log_debug!("'{}' invalidated {} cache entries", name, matched);
    })
}
