//! Composition root: the services every tracker screen shares.

use std::sync::Arc;
use std::time::Duration;

use dioxus::prelude::*;

use crate::api_client::ApiClient;
use crate::auth_session::{AuthContext, Credentials};
use crate::config::ClientConfig;
use crate::invalidation::{InvalidationBinding, InvalidationTable};
use crate::notify::ToastQueue;
use crate::query::QueryCache;
use crate::ws::{EventChannel, WsConnection, WsManager};

const GC_PERIOD: Duration = Duration::from_secs(60);

/// Shared client services, provided once at the app root.
///
/// The push channel is held here and passed down explicitly; nothing in the
/// crate reaches for a process-wide connection.
#[derive(Clone)]
pub struct TrackerContext {
    pub api: ApiClient,
    pub cache: QueryCache,
    pub channel: Arc<dyn EventChannel>,
    pub toasts: ToastQueue,
    pub credentials: Credentials,
}

impl TrackerContext {
    pub fn new(api: ApiClient, channel: Arc<dyn EventChannel>, credentials: Credentials) -> Self {
        Self {
            api,
            cache: QueryCache::new(),
            channel,
            toasts: ToastQueue::new(),
            credentials,
        }
    }

    /// HTTP client and push connection for `config`, sharing one set of credentials.
    pub fn from_config(config: &ClientConfig) -> Self {
        let credentials = Credentials::default();
        let api = ApiClient::http(config.api_url(), credentials.clone());
        let channel = Arc::new(WsConnection::from_config(config, credentials.clone()));
        Self::new(api, channel, credentials)
    }

    /// Register the tracker's event → cache invalidation rules on this context's channel.
    pub fn bind_invalidation(&self, table: &InvalidationTable) -> InvalidationBinding {
        table.bind(self.channel.clone(), self.cache.clone())
    }
}

/// Provides [`TrackerContext`] to its children and keeps it in step with the
/// session from [`crate::AuthProvider`], which must be an ancestor.
///
/// ```rust,ignore
/// rsx! {
///     AuthProvider {
///         TrackerProvider {
///             Dashboard {}
///         }
///     }
/// }
/// ```
#[component]
pub fn TrackerProvider(children: Element) -> Element {
    let auth = use_context::<AuthContext>();
    let ctx = use_context_provider(|| TrackerContext::from_config(&ClientConfig::from_env()));

    let credentials = ctx.credentials.clone();
    use_effect(move || credentials.set(auth.token()));

    let binding_ctx = ctx.clone();
    use_hook(move || Arc::new(binding_ctx.bind_invalidation(&InvalidationTable::tracker_default())));

    let gc_cache = ctx.cache.clone();
    let gc = use_hook(move || Arc::new(gc_cache.spawn_gc(GC_PERIOD)));
    use_drop(move || gc.abort());

    rsx! {
        WsManager { {children} }
    }
}

/// The [`TrackerContext`] provided by the nearest [`TrackerProvider`].
pub fn use_tracker() -> TrackerContext {
    use_context::<TrackerContext>()
}
