use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracker_shared::ApiError;

use super::{QueryKey, QueryOptions, QueryState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("cache key {key} is already observed with a different value type")]
    TypeMismatch { key: QueryKey },
    #[error("queries need a running tokio runtime")]
    NoRuntime,
}

/// Type-erased view of an entry's `watch::Sender<QueryState<T>>`.
trait ErasedState: Send + Sync {
    fn mark_stale(&self);
    fn is_fresh(&self, stale_time: Duration) -> bool;
    fn is_fetching(&self) -> bool;
    fn observers(&self) -> usize;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Send + Sync + 'static> ErasedState for watch::Sender<QueryState<T>> {
    fn mark_stale(&self) {
        self.send_modify(|s| s.is_stale = true);
    }

    fn is_fresh(&self, stale_time: Duration) -> bool {
        self.borrow().is_fresh(stale_time)
    }

    fn is_fetching(&self) -> bool {
        self.borrow().is_fetching
    }

    fn observers(&self) -> usize {
        self.receiver_count()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct Entry {
    state: Arc<dyn ErasedState>,
    /// Bumped on every invalidation or manual refetch; the driver refetches on change.
    invalidations: Arc<watch::Sender<u64>>,
    /// A driver task is running for this entry.
    active: bool,
    inactive_since: Option<Instant>,
    gc_time: Duration,
}

impl Entry {
    fn new<T: Send + Sync + 'static>(gc_time: Duration) -> Self {
        let (state, _) = watch::channel(QueryState::<T>::default());
        let (invalidations, _) = watch::channel(0u64);
        Self {
            state: Arc::new(state),
            invalidations: Arc::new(invalidations),
            active: false,
            inactive_since: Some(Instant::now()),
            gc_time,
        }
    }

    fn bump(&self) {
        self.invalidations.send_modify(|g| *g = g.wrapping_add(1));
    }

    fn expired(&self, now: Instant) -> bool {
        !self.active
            && self
                .inactive_since
                .is_some_and(|since| now.duration_since(since) >= self.gc_time)
    }
}

type Entries = HashMap<QueryKey, Entry>;

/// Request cache shared by every data hook.
///
/// Each key has at most one fetch driver, started by the first observer and
/// stopped when the last one goes away. Entries outlive their observers for
/// `gc_time` so a remount shows the previous data while it revalidates.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<Mutex<Entries>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start observing `key`, fetching with `fetch` if nothing fresh is cached.
    pub fn observe<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetch: F,
    ) -> Result<QueryObserver<T>, QueryError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| QueryError::NoRuntime)?;
        self.collect_garbage();

        let mut entries = self.lock();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new::<T>(options.gc_time));
        let state = entry
            .state
            .clone()
            .into_any()
            .downcast::<watch::Sender<QueryState<T>>>()
            .map_err(|_| QueryError::TypeMismatch { key: key.clone() })?;

        let receiver = state.subscribe();
        entry.inactive_since = None;
        entry.gc_time = entry.gc_time.max(options.gc_time);
        let fresh = entry.state.is_fresh(options.stale_time);

        if !entry.active {
            entry.active = true;
            crate::log_debug!("query {}: starting driver", key);
            let driver = Driver {
                cache: Arc::downgrade(&self.entries),
                key: key.clone(),
                state,
                invalidations: entry.invalidations.subscribe(),
                fetch,
                options,
            };
            runtime.spawn(driver.run(!fresh));
        } else if !fresh && !entry.state.is_fetching() {
            // Refetch on mount, same as a fresh driver would.
            entry.bump();
        }

        Ok(QueryObserver {
            key,
            receiver,
            invalidations: entry.invalidations.clone(),
        })
    }

    /// Mark every entry whose key starts with `prefix` stale and refetch the
    /// observed ones. Returns how many entries matched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let entries = self.lock();
        let mut matched = 0;
        for (key, entry) in entries.iter().filter(|(k, _)| k.starts_with(prefix)) {
            entry.state.mark_stale();
            entry.bump();
            crate::log_debug!("query {}: invalidated", key);
            matched += 1;
        }
        matched
    }

    /// Refetch exactly `key` if it is cached.
    pub fn refetch(&self, key: &QueryKey) -> bool {
        match self.lock().get(key) {
            Some(entry) => {
                entry.bump();
                true
            }
            None => false,
        }
    }

    /// Current state of `key`, if cached with value type `T`.
    pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<QueryState<T>> {
        let state = self
            .lock()
            .get(key)?
            .state
            .clone()
            .into_any()
            .downcast::<watch::Sender<QueryState<T>>>()
            .ok()?;
        let snapshot = state.borrow().clone();
        Some(snapshot)
    }

    /// Drop entries nobody observed for longer than their retention window.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, entry| {
            let keep = !entry.expired(now);
            if !keep {
                crate::log_debug!("query {}: collected", key);
            }
            keep
        });
        before - entries.len()
    }

    /// Run [`QueryCache::collect_garbage`] every `period` until the cache is dropped.
    pub fn spawn_gc(&self, period: Duration) -> JoinHandle<()> {
        let entries = Arc::downgrade(&self.entries);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                QueryCache { entries }.collect_garbage();
            }
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Release `key` if nobody observes it any more. Returns `true` when the
/// driver should stop.
fn release(entries: &Weak<Mutex<Entries>>, key: &QueryKey) -> bool {
    let Some(entries) = entries.upgrade() else {
        return true;
    };
    let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(entry) = entries.get_mut(key) else {
        return true;
    };
    if entry.state.observers() > 0 {
        return false;
    }
    entry.active = false;
    entry.inactive_since = Some(Instant::now());
    crate::log_debug!("query {}: no observers, driver stopping", key);
    true
}

/// Background task that keeps one entry fresh while it is observed.
struct Driver<T, F> {
    cache: Weak<Mutex<Entries>>,
    key: QueryKey,
    state: Arc<watch::Sender<QueryState<T>>>,
    invalidations: watch::Receiver<u64>,
    fetch: F,
    options: QueryOptions,
}

impl<T, F, Fut> Driver<T, F>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    async fn run(mut self, mut needs_fetch: bool) {
        let mut poll = self.options.refetch_interval.map(|every| {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            if needs_fetch {
                // Invalidations from here on land after this fetch and cause one more.
                self.invalidations.borrow_and_update();
                self.fetch_once().await;
                needs_fetch = false;
            }

            tokio::select! {
                changed = self.invalidations.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    needs_fetch = true;
                }
                _ = next_tick(&mut poll) => {
                    needs_fetch = true;
                }
                _ = self.state.closed() => {
                    if release(&self.cache, &self.key) {
                        break;
                    }
                }
            }
        }
    }

    async fn fetch_once(&self) {
        self.state.send_modify(|s| s.is_fetching = true);
        let result = (self.fetch)().await;
        match result {
            Ok(data) => self.state.send_modify(|s| {
                s.data = Some(Arc::new(data));
                s.error = None;
                s.is_stale = false;
                s.is_fetching = false;
                s.updated_at = Some(Utc::now());
                s.fetched_at = Some(Instant::now());
                s.fetch_count += 1;
            }),
            Err(e) => {
                crate::log_warn!("query {}: fetch failed: {}", self.key, e);
                self.state.send_modify(|s| {
                    s.error = Some(e);
                    s.is_fetching = false;
                    s.fetch_count += 1;
                });
            }
        }
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// A consumer's handle on one cache entry. Dropping it unsubscribes.
pub struct QueryObserver<T> {
    key: QueryKey,
    receiver: watch::Receiver<QueryState<T>>,
    invalidations: Arc<watch::Sender<u64>>,
}

impl<T> QueryObserver<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next state change. `false` once the entry is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Wait until `predicate` holds for the current state.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&QueryState<T>) -> bool,
    ) -> Option<QueryState<T>> {
        let state = self.receiver.wait_for(predicate).await.ok()?;
        Some(state.clone())
    }

    /// Force a refetch of this key.
    pub fn refetch(&self) {
        self.invalidations.send_modify(|g| *g = g.wrapping_add(1));
    }
}
