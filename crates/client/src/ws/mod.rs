//! Real-time push channel.
//!
//! One [`WsConnection`] per process, created by [`crate::TrackerProvider`]
//! and shared through [`crate::TrackerContext`] as an `Arc<dyn EventChannel>`.
//!
//! ```text
//!   AuthContext.session ──▶ WsManager (SessionLink) ──connect/disconnect──▶ WsConnection
//!                                                                              │ frames
//!                                                 ┌────────────────────────────┤
//!                                                 ▼                            ▼
//!                                   InvalidationBinding               use_ws_event / EventListener
//!                                   (QueryCache::invalidate)          (component callbacks)
//! ```
//!
//! Handlers are registered per event name with [`EventChannel::on`]. Prefer
//! the RAII wrappers ([`Subscription`], [`EventListener`]) over calling
//! `on`/`off` by hand.

mod connection;
mod hooks;
mod manager;
mod subscription;

pub use connection::{
    ConnectionState, EventChannel, EventHandler, HandlerId, HandlerRegistry, ReconnectConfig,
    WsConnection, WsError,
};
pub use hooks::{use_connection_state, use_ws_event};
pub use manager::WsManager;
pub use subscription::{EventListener, SessionLink, Subscription};
