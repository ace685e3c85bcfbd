//! Writes that keep the cache honest.

use std::future::Future;

use tracker_shared::ApiError;

use crate::notify::ToastQueue;
use crate::query::{QueryCache, QueryKey};

/// What a write invalidates and what the user is told about it.
///
/// On success every declared key is invalidated and a success toast is
/// shown; on failure nothing is invalidated and an error toast carries the
/// server's message, or the fallback when the server sent none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    name: &'static str,
    invalidates: Vec<QueryKey>,
    success_message: Option<String>,
    error_fallback: String,
}

impl Mutation {
    pub fn new(name: &'static str, error_fallback: impl Into<String>) -> Self {
        Self {
            name,
            invalidates: Vec::new(),
            success_message: None,
            error_fallback: error_fallback.into(),
        }
    }

    pub fn invalidates(mut self, key: QueryKey) -> Self {
        self.invalidates.push(key);
        self
    }

    pub fn on_success(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn keys(&self) -> &[QueryKey] {
        &self.invalidates
    }

    pub fn error_fallback(&self) -> &str {
        &self.error_fallback
    }

    /// Await `write` and apply the outcome to `cache` and `toasts`.
    pub async fn run<T, Fut>(
        &self,
        cache: &QueryCache,
        toasts: &ToastQueue,
        write: Fut,
    ) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        match write.await {
            Ok(value) => {
                crate::log_info!("{} succeeded", self.name);
                for key in &self.invalidates {
                    cache.invalidate(key);
                }
                if let Some(message) = &self.success_message {
                    toasts.success(message.clone());
                }
                Ok(value)
            }
            Err(e) => {
                crate::log_warn!("{} failed: {}", self.name, e);
                toasts.error(e.user_message(&self.error_fallback));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ToastKind;
    use crate::query::{QueryObserver, QueryOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn approve() -> Mutation {
        Mutation::new("approve leave", "Failed to approve leave")
            .invalidates(QueryKey::new("leaves"))
            .invalidates(QueryKey::new("leave-balance"))
            .invalidates(QueryKey::new("dashboard-data"))
            .on_success("Leave approved")
    }

    async fn watched(cache: &QueryCache, root: &str) -> (Arc<AtomicUsize>, QueryObserver<usize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let mut observer = cache
            .observe(QueryKey::new(root), QueryOptions::default(), move || {
                std::future::ready(Ok::<_, ApiError>(c.fetch_add(1, Ordering::SeqCst) + 1))
            })
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), observer.wait_for(|s| s.fetch_count == 1))
            .await
            .unwrap();
        (calls, observer)
    }

    #[tokio::test]
    async fn success_invalidates_every_declared_key() {
        let cache = QueryCache::new();
        let toasts = ToastQueue::new();
        let mut observed = Vec::new();
        for root in ["leaves", "leave-balance", "dashboard-data", "shifts"] {
            observed.push(watched(&cache, root).await);
        }

        let out = approve()
            .run(&cache, &toasts, async { Ok::<_, ApiError>("l1") })
            .await;
        assert_eq!(out, Ok("l1"));

        for (calls, observer) in observed.iter_mut().take(3) {
            tokio::time::timeout(Duration::from_secs(5), observer.wait_for(|s| s.fetch_count == 2))
                .await
                .unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 2);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(observed[3].0.load(Ordering::SeqCst), 1);

        let shown = toasts.snapshot();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].kind, ToastKind::Success);
        assert_eq!(shown[0].message, "Leave approved");
    }

    #[tokio::test]
    async fn failure_invalidates_nothing_and_shows_server_message() {
        let cache = QueryCache::new();
        let toasts = ToastQueue::new();
        let (calls, _observer) = watched(&cache, "leaves").await;

        let err = approve()
            .run(&cache, &toasts, async {
                Err::<(), _>(ApiError::Http {
                    status: 400,
                    body: r#"{"message":"X"}"#.into(),
                })
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let shown = toasts.snapshot();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].kind, ToastKind::Error);
        assert_eq!(shown[0].message, "X");
    }

    #[tokio::test]
    async fn failure_without_server_message_uses_fallback() {
        let cache = QueryCache::new();
        let toasts = ToastQueue::new();

        let _ = approve()
            .run(&cache, &toasts, async {
                Err::<(), _>(ApiError::Network("connection refused".into()))
            })
            .await;

        assert_eq!(toasts.snapshot()[0].message, "Failed to approve leave");
    }

    #[tokio::test]
    async fn silent_success_raises_no_toast() {
        let toasts = ToastQueue::new();
        let silent = Mutation::new("refresh", "Failed").invalidates(QueryKey::new("shifts"));
        silent
            .run(&QueryCache::new(), &toasts, async { Ok::<_, ApiError>(()) })
            .await
            .unwrap();
        assert!(toasts.snapshot().is_empty());
        assert_eq!(silent.keys(), &[QueryKey::new("shifts")]);
    }
}
