//! Forrof Tracker client - real-time cache synchronization
//!
//! One shared push connection, lifetime-scoped event subscriptions, a keyed
//! request cache with polling, and the event → cache invalidation table that
//! keeps tracker screens current without manual reloads.

pub mod api_client;
pub mod auth_session;
pub mod config;
pub mod hooks;
pub mod invalidation;
pub mod logging;
pub mod mutation;
pub mod notify;
pub mod provider;
pub mod query;
pub mod resources;
pub mod storage;
pub mod ws;

#[cfg(test)]
mod testing;

pub use api_client::ApiClient;
pub use auth_session::{AuthContext, AuthProvider, AuthSession, Credentials};
pub use config::ClientConfig;
pub use invalidation::{InvalidationRule, InvalidationTable};
pub use provider::{use_tracker, TrackerContext, TrackerProvider};
pub use query::{QueryCache, QueryKey};
