//! Dioxus bindings for the query cache, mutations and toasts.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use dioxus::core::Task;
use dioxus::prelude::*;
use tracker_shared::ApiError;

use crate::invalidation::invalidate_on;
use crate::notify::Toast;
use crate::provider::{use_tracker, TrackerContext};
use crate::query::{QueryError, QueryKey, QueryObserver, QueryState};
use crate::ws::Subscription;

/// Observe one cache entry and re-render on every change.
///
/// `observe` runs on mount and whenever `key` changes; the previous entry's
/// observer is dropped at that point. Until the new entry has data or an
/// error, the signal keeps showing the previous state.
///
/// ```rust,ignore
/// let shifts = use_query(shifts::keys::all(), |ctx| shifts::observe(ctx));
/// ```
pub fn use_query<T>(
    key: QueryKey,
    observe: impl FnOnce(&TrackerContext) -> Result<QueryObserver<T>, QueryError>,
) -> Signal<QueryState<T>>
where
    T: Send + Sync + 'static,
{
    let ctx = use_tracker();
    let mut state = use_signal(QueryState::<T>::default);
    let current = use_hook(|| Rc::new(RefCell::new(None::<(QueryKey, Task)>)));

    let stale = current
        .borrow()
        .as_ref()
        .map_or(true, |(observed, _)| *observed != key);
    if stale {
        if let Some((_, task)) = current.borrow_mut().take() {
            task.cancel();
        }
        match observe(&ctx) {
            Ok(mut observer) => {
                let task = spawn(async move {
                    // Hold the previous key's state until this entry has data or an error.
                    let mut reported = false;
                    loop {
                        let next = observer.state();
                        reported |= next.data.is_some() || next.error.is_some();
                        if reported {
                            state.set(next);
                        }
                        if !observer.changed().await {
                            break;
                        }
                    }
                });
                *current.borrow_mut() = Some((key, task));
            }
            Err(e) => crate::log_error!("query {}: {}", key, e),
        }
    }

    state
}

/// Refetch everything under a key prefix, e.g. from a "reload" button.
pub fn use_refetch() -> impl Fn(&QueryKey) -> usize + Clone {
    let cache = use_tracker().cache;
    move |prefix: &QueryKey| cache.invalidate(prefix)
}

/// Progress of writes started from one component.
#[derive(Clone, Copy, PartialEq)]
pub struct UseMutation {
    pending: Signal<bool>,
    error: Signal<Option<ApiError>>,
}

impl UseMutation {
    pub fn is_pending(&self) -> bool {
        *self.pending.read()
    }

    /// Error of the last write, cleared when the next one succeeds.
    pub fn error(&self) -> Option<ApiError> {
        self.error.read().clone()
    }

    /// Run `write` in this component's scope. Cache invalidation and toasts
    /// are the write's business (see [`crate::mutation::Mutation`]).
    pub fn mutate<T, Fut>(self, write: Fut) -> Task
    where
        T: 'static,
        Fut: Future<Output = Result<T, ApiError>> + 'static,
    {
        let UseMutation {
            mut pending,
            mut error,
        } = self;
        spawn(async move {
            pending.set(true);
            let result = write.await;
            error.set(result.err());
            pending.set(false);
        })
    }
}

/// ```rust,ignore
/// let ctx = use_tracker();
/// let approve = use_mutation();
/// rsx! {
///     button {
///         disabled: approve.is_pending(),
///         onclick: move |_| {
///             let ctx = ctx.clone();
///             approve.mutate(async move { leaves::review(&ctx, "l1", &change).await });
///         },
///         "Approve"
///     }
/// }
/// ```
pub fn use_mutation() -> UseMutation {
    UseMutation {
        pending: use_signal(|| false),
        error: use_signal(|| None),
    }
}

/// Invalidate `prefixes` whenever `event` arrives, for as long as the
/// component is mounted. Changing either argument replaces the registration.
pub fn use_invalidation(event: &str, prefixes: Vec<QueryKey>) {
    let ctx = use_tracker();
    let current = use_hook(|| Rc::new(RefCell::new(None::<(String, Vec<QueryKey>, Subscription)>)));

    let mut slot = current.borrow_mut();
    let unchanged = slot
        .as_ref()
        .is_some_and(|(e, p, _)| e == event && *p == prefixes);
    if !unchanged {
        // Old handler goes before the new one registers.
        *slot = None;
        let subscription = invalidate_on(ctx.channel.clone(), ctx.cache.clone(), event, prefixes.clone());
        *slot = Some((event.to_string(), prefixes, subscription));
    }
}

/// Current toasts, newest last. Dismiss with `use_tracker().toasts.dismiss(id)`.
pub fn use_toasts() -> Signal<Vec<Toast>> {
    let toasts = use_tracker().toasts;
    let mut list = use_signal(|| toasts.snapshot());
    use_hook(move || {
        let mut rx = toasts.subscribe();
        spawn(async move {
            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                list.set(next);
            }
        })
    });
    list
}
