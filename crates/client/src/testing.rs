//! In-process fakes for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dioxus::core::{NoOpMutations, VirtualDom};
use serde_json::Value;
use tokio::sync::{watch, Semaphore};
use tracker_shared::ApiError;

use crate::api_client::{ApiRequest, Transport};
use crate::ws::{ConnectionState, EventChannel, EventHandler, HandlerId, HandlerRegistry};

/// Channel whose events are emitted by the test itself.
pub struct FakeChannel {
    handlers: HandlerRegistry,
    state: watch::Sender<ConnectionState>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    ons: AtomicUsize,
}

impl FakeChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handlers: HandlerRegistry::new(),
            state: watch::channel(ConnectionState::Disconnected).0,
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            ons: AtomicUsize::new(0),
        })
    }

    pub fn emit(&self, event: &str, data: Value) -> usize {
        self.handlers.dispatch(event, &data)
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.count(event)
    }

    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn on_calls(&self) -> usize {
        self.ons.load(Ordering::SeqCst)
    }
}

impl EventChannel for FakeChannel {
    fn connect(&self) {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(ConnectionState::Connected);
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(ConnectionState::Disconnected);
    }

    fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn on(&self, event: &str, handler: EventHandler) -> HandlerId {
        self.ons.fetch_add(1, Ordering::SeqCst);
        self.handlers.add(event, handler)
    }

    fn off(&self, event: &str, id: HandlerId) {
        self.handlers.remove(event, id);
    }
}

/// Transport that records every request and answers from a script keyed by path.
///
/// Unscripted paths answer `{"data": null}`.
pub struct RecordingTransport {
    requests: Mutex<Vec<ApiRequest>>,
    script: Mutex<HashMap<String, Result<Option<Value>, ApiError>>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(HashMap::new()),
            gate: Mutex::new(None),
        })
    }

    pub fn respond(&self, path: &str, body: Option<Value>) {
        self.script.lock().unwrap().insert(path.to_string(), Ok(body));
    }

    pub fn fail(&self, path: &str, status: u16, body: &str) {
        self.script.lock().unwrap().insert(
            path.to_string(),
            Err(ApiError::Http {
                status,
                body: body.to_string(),
            }),
        );
    }

    /// Park every request after it is recorded until [`RecordingTransport::release`].
    pub fn hold(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, requests: usize) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(requests);
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, request: ApiRequest) -> Result<Option<Value>, ApiError> {
        let path = request.path.clone();
        self.requests.lock().unwrap().push(request);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.script
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .unwrap_or_else(|| Ok(Some(serde_json::json!({ "data": null }))))
    }
}

/// Re-render `dom` as its tasks and signals wake it until `done` holds.
pub async fn render_until(dom: &mut VirtualDom, mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            dom.wait_for_work().await;
            dom.render_immediate(&mut NoOpMutations);
        }
    })
    .await
    .expect("component never reached the expected state");
}
