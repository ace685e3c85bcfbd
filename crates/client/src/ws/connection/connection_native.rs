//! WebSocket implementation of [`EventChannel`] using tokio-tungstenite.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{InvalidHeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracker_shared::PushEvent;

use super::{ConnectionState, EventChannel, EventHandler, HandlerId, HandlerRegistry, ReconnectConfig};
use crate::auth_session::Credentials;
use crate::config::ClientConfig;

/// Errors building the handshake request. Logged by the connection loop,
/// never returned to callers.
#[derive(Debug, Error)]
pub enum WsError {
    #[error("invalid push channel url: {0}")]
    Request(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("session token is not a valid header value")]
    Header(#[from] InvalidHeaderValue),
}

/// The running connection loop and the means to stop it.
struct Running {
    task: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

/// Push connection to the Tracker server.
///
/// Creating one does no I/O. [`EventChannel::connect`] starts a background
/// loop that connects, dispatches frames to registered handlers and
/// reconnects with capped backoff until [`EventChannel::disconnect`] or drop.
pub struct WsConnection {
    url: String,
    credentials: Credentials,
    reconnect: ReconnectConfig,
    handlers: Arc<HandlerRegistry>,
    state: Arc<watch::Sender<ConnectionState>>,
    running: Mutex<Option<Running>>,
}

impl WsConnection {
    pub fn new(url: impl Into<String>, credentials: Credentials, reconnect: ReconnectConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            url: url.into(),
            credentials,
            reconnect,
            handlers: Arc::new(HandlerRegistry::new()),
            state: Arc::new(state),
            running: Mutex::new(None),
        }
    }

    pub fn from_config(config: &ClientConfig, credentials: Credentials) -> Self {
        Self::new(config.ws_url(), credentials, config.reconnect.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl EventChannel for WsConnection {
    fn connect(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(r) = running.as_ref() {
            if !r.task.is_finished() {
                crate::log_debug!("connect: already open to {}", self.url);
                return;
            }
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            crate::log_error!("connect: no tokio runtime, push channel to {} stays closed", self.url);
            return;
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let ctx = LoopContext {
            url: self.url.clone(),
            credentials: self.credentials.clone(),
            reconnect: self.reconnect.clone(),
            handlers: self.handlers.clone(),
            state: self.state.clone(),
        };
        crate::log_info!("opening push channel to {}", self.url);
        let task = runtime.spawn(ctx.run(shutdown_rx));
        *running = Some(Running {
            task,
            shutdown: shutdown_tx,
        });
    }

    fn disconnect(&self) {
        let taken = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = taken else {
            return;
        };
        crate::log_info!("closing push channel to {}", self.url);
        // The loop may already be gone (bounded retries exhausted).
        let _ = running.shutdown.send(());
        self.state.send_replace(ConnectionState::Disconnected);
    }

    fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn on(&self, event: &str, handler: EventHandler) -> HandlerId {
        self.handlers.add(event, handler)
    }

    fn off(&self, event: &str, id: HandlerId) {
        self.handlers.remove(event, id);
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// How a connected session ended.
enum PumpEnd {
    Shutdown,
    Closed,
}

/// Everything the background loop needs, detached from the owning
/// [`WsConnection`] so that dropping the connection stops the loop.
struct LoopContext {
    url: String,
    credentials: Credentials,
    reconnect: ReconnectConfig,
    handlers: Arc<HandlerRegistry>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl LoopContext {
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut attempt = 0u32;

        loop {
            if attempt == 0 {
                self.set_state(ConnectionState::Connecting);
            } else {
                self.set_state(ConnectionState::Reconnecting { attempt });
            }

            // Built on each attempt so a refreshed session token is picked up.
            let request = match self.handshake_request() {
                Ok(request) => request,
                Err(e) => {
                    crate::log_error!("push channel to {}: {}", self.url, e);
                    self.set_state(ConnectionState::Failed {
                        reason: e.to_string(),
                    });
                    return;
                }
            };

            let connected = tokio::select! {
                _ = &mut shutdown => break,
                res = connect_async(request) => res,
            };

            match connected {
                Ok((stream, _response)) => {
                    attempt = 0;
                    self.set_state(ConnectionState::Connected);
                    crate::log_info!("push channel connected to {}", self.url);

                    match self.pump(stream, &mut shutdown).await {
                        PumpEnd::Shutdown => break,
                        PumpEnd::Closed => {
                            crate::log_warn!("push channel to {} closed", self.url);
                            self.set_state(ConnectionState::Disconnected);
                        }
                    }
                }
                Err(e) => {
                    crate::log_warn!("push channel error for {}: {}", self.url, e);
                }
            }

            if !self.reconnect.allows_attempt(attempt) {
                self.set_state(ConnectionState::Failed {
                    reason: format!(
                        "Max reconnect attempts ({}) exceeded",
                        self.reconnect.max_attempts
                    ),
                });
                return;
            }

            let delay = self.reconnect.delay_for_attempt(attempt);
            crate::log_info!(
                "reconnecting to {} in {}ms (attempt {})",
                self.url,
                delay.as_millis(),
                attempt + 1
            );
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }

        self.set_state(ConnectionState::Disconnected);
    }

    fn handshake_request(&self) -> Result<Request, WsError> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(token) = self.credentials.token() {
            request
                .headers_mut()
                .insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        }
        Ok(request)
    }

    async fn pump(
        &self,
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> PumpEnd {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                _ = &mut *shutdown => {
                    let _ = write.send(Message::Close(None)).await;
                    return PumpEnd::Shutdown;
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.dispatch_frame(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => return PumpEnd::Closed,
                    Some(Ok(_)) => {
                        // Ping is answered by tungstenite; binary frames are not part of the protocol.
                    }
                    Some(Err(e)) => {
                        crate::log_error!("push channel read error: {}", e);
                        return PumpEnd::Closed;
                    }
                },
            }
        }
    }

    fn dispatch_frame(&self, text: &str) {
        match serde_json::from_str::<PushEvent>(text) {
            Ok(event) => {
                let delivered = self.handlers.dispatch(&event.event, &event.data);
                crate::log_debug!("push event '{}' delivered to {} handler(s)", event.event, delivered);
            }
            Err(e) => crate::log_error!("failed to parse push frame: {}", e),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connection_is_idle() {
        let conn = WsConnection::new("ws://127.0.0.1:9/ws", Credentials::default(), ReconnectConfig::default());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.running.lock().unwrap().is_none());
    }

    #[test]
    fn disconnect_when_closed_is_a_noop() {
        let conn = WsConnection::new("ws://127.0.0.1:9/ws", Credentials::default(), ReconnectConfig::default());
        conn.disconnect();
        conn.disconnect();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn connect_without_runtime_stays_closed() {
        let conn = WsConnection::new("ws://127.0.0.1:9/ws", Credentials::default(), ReconnectConfig::default());
        conn.connect();
        assert!(conn.running.lock().unwrap().is_none());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn handshake_carries_bearer_token() {
        let credentials = Credentials::default();
        credentials.set(Some("t0k3n".into()));
        let ctx = LoopContext {
            url: "ws://localhost:3000/ws".into(),
            credentials,
            reconnect: ReconnectConfig::default(),
            handlers: Arc::new(HandlerRegistry::new()),
            state: Arc::new(watch::channel(ConnectionState::Disconnected).0),
        };
        let request = ctx.handshake_request().unwrap();
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer t0k3n");
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let handlers = Arc::new(HandlerRegistry::new());
        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let h = hits.clone();
        handlers.add(
            "leave-update",
            Arc::new(move |_| {
                h.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }),
        );
        let ctx = LoopContext {
            url: "ws://localhost:3000/ws".into(),
            credentials: Credentials::default(),
            reconnect: ReconnectConfig::default(),
            handlers,
            state: Arc::new(watch::channel(ConnectionState::Disconnected).0),
        };

        ctx.dispatch_frame("not json");
        ctx.dispatch_frame(r#"{"data":{}}"#);
        ctx.dispatch_frame(r#"{"event":"leave-update","data":{"id":"l1"}}"#);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
