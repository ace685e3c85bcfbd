//! Client configuration from environment variables.

use std::time::Duration;

use crate::ws::ReconnectConfig;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_WS_PATH: &str = "/ws";

/// Where the client talks to, and how it reconnects.
///
/// One base URL serves both the REST API and the push channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    api_url: String,
    ws_path: String,
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    /// Parse configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TRACKER_API_URL`: REST and push base URL (default: "http://localhost:3000")
    /// - `TRACKER_WS_PATH`: push channel path (default: "/ws")
    /// - `TRACKER_RECONNECT_INITIAL_MS`: first reconnect delay (default: 1000)
    /// - `TRACKER_RECONNECT_MAX_MS`: reconnect delay ceiling (default: 5000)
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("TRACKER_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let ws_path =
            std::env::var("TRACKER_WS_PATH").unwrap_or_else(|_| DEFAULT_WS_PATH.to_string());

        let mut reconnect = ReconnectConfig::default();
        if let Some(ms) = env_millis("TRACKER_RECONNECT_INITIAL_MS") {
            reconnect.initial_delay = ms;
        }
        if let Some(ms) = env_millis("TRACKER_RECONNECT_MAX_MS") {
            reconnect.max_delay = ms;
        }
        if reconnect.max_delay < reconnect.initial_delay {
            crate::log_warn!(
                "reconnect ceiling {:?} is below the initial delay {:?}; using the initial delay",
                reconnect.max_delay,
                reconnect.initial_delay
            );
            reconnect.max_delay = reconnect.initial_delay;
        }

        Self::new(api_url)
            .with_ws_path(ws_path)
            .with_reconnect(reconnect)
    }

    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: normalize_base(&api_url.into()),
            ws_path: DEFAULT_WS_PATH.to_string(),
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = normalize_base(&api_url.into());
        self
    }

    pub fn with_ws_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.ws_path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// REST base URL, never ending in `/`.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Push channel URL derived from the REST base (`http` → `ws`, `https` → `wss`).
    pub fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.api_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.api_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{}", self.api_url)
        };
        format!("{}{}", base, self.ws_path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

fn normalize_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn env_millis(name: &str) -> Option<Duration> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            crate::log_warn!("ignoring {}={:?}: not a number of milliseconds", name, raw);
            None
        }
    }
}
