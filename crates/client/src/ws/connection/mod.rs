//! Push connection: shared types, the [`EventChannel`] seam and the
//! handler registry every channel implementation dispatches through.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;

/// Connection state for the push channel
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = infinite)
    pub max_attempts: u32,
    /// Delay before the first retry; also the floor for every retry
    pub initial_delay: Duration,
    /// Ceiling no retry delay exceeds
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 1.5,
        }
    }
}

impl ReconnectConfig {
    /// Delay before retry number `attempt` (0-based), clamped to
    /// `[initial_delay, max_delay]`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let floor = self.initial_delay;
        let ceiling = self.max_delay.max(floor);
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = floor.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs >= ceiling.as_secs_f64() {
            return ceiling;
        }
        Duration::from_secs_f64(secs).max(floor)
    }

    /// Whether another retry is allowed after `attempt` failed retries.
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt < self.max_attempts
    }
}

/// Callback run for every occurrence of an event, with the event's payload.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Registration token returned by [`EventChannel::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// The push channel as seen by everything above it.
///
/// One instance is built at startup and handed to whoever needs it; there is
/// no global connection. `connect` and `disconnect` are idempotent and never
/// fail: transport problems are retried internally and only show up in
/// [`EventChannel::state`].
pub trait EventChannel: Send + Sync {
    fn connect(&self);
    fn disconnect(&self);
    fn state(&self) -> ConnectionState;
    fn watch_state(&self) -> watch::Receiver<ConnectionState>;
    fn on(&self, event: &str, handler: EventHandler) -> HandlerId;
    fn off(&self, event: &str, id: HandlerId);
}

/// Event name → handlers table.
#[derive(Default)]
pub struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<String, Vec<(HandlerId, EventHandler)>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, event: &str, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    /// Returns whether a handler was removed.
    pub fn remove(&self, event: &str, id: HandlerId) -> bool {
        let mut handlers = self.lock();
        let Some(list) = handlers.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(hid, _)| *hid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(event);
        }
        removed
    }

    /// Run every handler registered for `event`; returns how many ran.
    ///
    /// Handlers are called outside the lock so they may register or remove
    /// handlers themselves.
    pub fn dispatch(&self, event: &str, data: &Value) -> usize {
        let targets: Vec<EventHandler> = match self.lock().get(event) {
            Some(list) => list.iter().map(|(_, h)| h.clone()).collect(),
            None => return 0,
        };
        for handler in &targets {
            handler(data);
        }
        targets.len()
    }

    pub fn count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<(HandlerId, EventHandler)>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

mod connection_native;
pub use connection_native::{WsConnection, WsError};
