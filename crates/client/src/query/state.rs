use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracker_shared::ApiError;

/// Per-query behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long fetched data counts as fresh. Fresh data is not refetched
    /// when another consumer mounts.
    pub stale_time: Duration,
    /// Fixed polling period while at least one consumer is mounted.
    pub refetch_interval: Option<Duration>,
    /// How long data outlives its last consumer.
    pub gc_time: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            refetch_interval: None,
            gc_time: Duration::from_secs(5 * 60),
        }
    }
}

impl QueryOptions {
    pub fn polling(every: Duration) -> Self {
        Self {
            refetch_interval: Some(every),
            ..Self::default()
        }
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }
}

/// Snapshot of one cache entry.
#[derive(Debug)]
pub struct QueryState<T> {
    /// Last successful result. Kept across failed refetches.
    pub data: Option<Arc<T>>,
    /// Error of the most recent fetch, cleared by the next success.
    pub error: Option<ApiError>,
    pub is_fetching: bool,
    /// Invalidated since the last successful fetch.
    pub is_stale: bool,
    pub updated_at: Option<DateTime<Utc>>,
    /// Completed fetches, successful or not.
    pub fetch_count: u64,
    pub(crate) fetched_at: Option<Instant>,
}

impl<T> QueryState<T> {
    /// No data yet and a first result is still on its way.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && (self.is_fetching || self.fetch_count == 0)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub(crate) fn is_fresh(&self, stale_time: Duration) -> bool {
        match (&self.data, self.fetched_at) {
            (Some(_), Some(at)) => !self.is_stale && at.elapsed() < stale_time,
            _ => false,
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_fetching: false,
            is_stale: false,
            updated_at: None,
            fetch_count: 0,
            fetched_at: None,
        }
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            updated_at: self.updated_at,
            fetch_count: self.fetch_count,
            fetched_at: self.fetched_at,
        }
    }
}

impl<T: PartialEq> PartialEq for QueryState<T> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
            && self.error == other.error
            && self.is_fetching == other.is_fetching
            && self.is_stale == other.is_stale
            && self.fetch_count == other.fetch_count
    }
}
