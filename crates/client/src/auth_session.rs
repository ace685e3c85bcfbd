//! Authentication session with on-disk persistence.
//!
//! Only the opaque session token is held here. Logging in and out is the
//! host application's business; the real-time layer only cares whether a
//! session exists.

use std::sync::{Arc, PoisonError, RwLock};

use dioxus::prelude::*;
use serde::{Deserialize, Serialize};

use crate::storage;

const STORAGE_KEY: &str = "tracker_session";

/// Stored session data
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub user_id: String,
    pub token: String,
}

/// Bearer token shared by the HTTP transport and the push connection.
///
/// Both read it on every request / handshake, so a login or logout takes
/// effect without rebuilding either.
#[derive(Clone, Default)]
pub struct Credentials(Arc<RwLock<Option<String>>>);

impl Credentials {
    pub fn set(&self, token: Option<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn token(&self) -> Option<String> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present = self.token().is_some();
        f.debug_struct("Credentials")
            .field("token", &if present { "<redacted>" } else { "<none>" })
            .finish()
    }
}

/// Authentication context provided to the app
#[derive(Clone, Copy, Debug)]
pub struct AuthContext {
    pub session: Signal<Option<AuthSession>>,
}

/// Provider component that sets up auth context
#[component]
pub fn AuthProvider(children: Element) -> Element {
    let session = use_signal(|| storage::load::<AuthSession>(STORAGE_KEY));

    // Sync session to disk
    use_effect(move || match session.read().as_ref() {
        Some(sess) => {
            if !storage::save(STORAGE_KEY, sess) {
                crate::log_warn!("failed to persist session for {}", sess.user_id);
            }
        }
        None => storage::remove(STORAGE_KEY),
    });

    use_context_provider(|| AuthContext { session });

    children
}

impl AuthContext {
    pub fn login(&mut self, session: AuthSession) {
        crate::log_info!("session started for {}", session.user_id);
        self.session.set(Some(session));
    }

    pub fn logout(&mut self) {
        crate::log_info!("session ended");
        self.session.set(None);
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    pub fn user_id(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.user_id.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.token.clone())
    }
}
