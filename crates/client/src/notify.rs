//! Toast notifications raised by mutations.

use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

/// Toasts kept at once; pushing past this drops the oldest.
pub const MAX_TOASTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: Uuid,
    pub kind: ToastKind,
    pub message: String,
}

/// Queue of visible toasts, oldest first. Cloning shares the queue.
#[derive(Clone)]
pub struct ToastQueue {
    toasts: Arc<watch::Sender<Vec<Toast>>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self {
            toasts: Arc::new(watch::channel(Vec::new()).0),
        }
    }

    pub fn push(&self, kind: ToastKind, message: impl Into<String>) -> Uuid {
        let toast = Toast {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
        };
        let id = toast.id;
        self.toasts.send_modify(|toasts| {
            toasts.push(toast);
            let overflow = toasts.len().saturating_sub(MAX_TOASTS);
            toasts.drain(..overflow);
        });
        id
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.push(ToastKind::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.push(ToastKind::Error, message)
    }

    /// Remove a toast. Returns `false` if it was already gone.
    pub fn dismiss(&self, id: Uuid) -> bool {
        self.toasts.send_if_modified(|toasts| {
            let before = toasts.len();
            toasts.retain(|t| t.id != id);
            toasts.len() != before
        })
    }

    pub fn snapshot(&self) -> Vec<Toast> {
        self.toasts.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Toast>> {
        self.toasts.subscribe()
    }
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new()
    }
}
