//! Lifetime-scoped event subscriptions and the connect-on-auth link.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use super::connection::{EventChannel, HandlerId};

/// A handler registered on an [`EventChannel`] for as long as this value lives.
///
/// Dropping it deregisters the handler; once `drop` returns the handler is
/// never started again.
pub struct Subscription {
    channel: Arc<dyn EventChannel>,
    event: String,
    id: HandlerId,
    alive: Arc<AtomicBool>,
}

impl Subscription {
    pub fn new(
        channel: Arc<dyn EventChannel>,
        event: &str,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Self {
        let alive = Arc::new(AtomicBool::new(true));
        let gate = alive.clone();
        let id = channel.on(
            event,
            Arc::new(move |data: &Value| {
                if gate.load(Ordering::Acquire) {
                    handler(data);
                }
            }),
        );
        crate::log_debug!("subscribed to '{}'", event);
        Self {
            channel,
            event: event.to_string(),
            id,
            alive,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
        self.channel.off(&self.event, self.id);
        crate::log_debug!("unsubscribed from '{}'", self.event);
    }
}

type Callback = Box<dyn FnMut(&Value) + Send>;

/// Runs the latest callback whenever a named event fires.
///
/// The registered handler only ever reaches the callback through a shared
/// slot, so swapping the callback ([`EventListener::set_callback`]) never
/// touches the channel. Changing the event name replaces the registration,
/// keeping exactly one handler per listener.
pub struct EventListener {
    channel: Arc<dyn EventChannel>,
    callback: Arc<Mutex<Option<Callback>>>,
    subscription: Option<Subscription>,
}

impl EventListener {
    pub fn new(
        channel: Arc<dyn EventChannel>,
        event: &str,
        callback: impl FnMut(&Value) + Send + 'static,
    ) -> Self {
        let callback: Arc<Mutex<Option<Callback>>> = Arc::new(Mutex::new(Some(Box::new(callback))));
        let mut listener = Self {
            channel,
            callback,
            subscription: None,
        };
        listener.subscribe(event);
        listener
    }

    pub fn event(&self) -> &str {
        self.subscription.as_ref().map_or("", Subscription::event)
    }

    pub fn set_callback(&self, callback: impl FnMut(&Value) + Send + 'static) {
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(callback));
    }

    /// Move the listener to another event. No-op when the name is unchanged.
    pub fn set_event(&mut self, event: &str) {
        if self.event() == event {
            return;
        }
        // Old registration goes first so two handlers never coexist.
        self.subscription = None;
        self.subscribe(event);
    }

    fn subscribe(&mut self, event: &str) {
        let slot = self.callback.clone();
        self.subscription = Some(Subscription::new(self.channel.clone(), event, move |data| {
            // Held while the callback runs: after `drop` clears the slot no call is in flight.
            if let Some(cb) = slot.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
                cb(data);
            }
        }));
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Opens the channel once per session and closes it when the session or
/// the owner goes away.
pub struct SessionLink {
    channel: Arc<dyn EventChannel>,
    connected: bool,
}

impl SessionLink {
    pub fn new(channel: Arc<dyn EventChannel>) -> Self {
        Self {
            channel,
            connected: false,
        }
    }

    /// Follow the session: connect on absent → present, disconnect on
    /// present → absent. Repeated calls with the same value do nothing.
    pub fn sync(&mut self, session_present: bool) {
        match (session_present, self.connected) {
            (true, false) => {
                crate::log_info!("session present, connecting push channel");
                self.channel.connect();
                self.connected = true;
            }
            (false, true) => {
                crate::log_info!("session gone, disconnecting push channel");
                self.channel.disconnect();
                self.connected = false;
            }
            _ => {}
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn teardown(&mut self) {
        self.channel.disconnect();
        self.connected = false;
    }
}

impl Drop for SessionLink {
    fn drop(&mut self) {
        self.teardown();
    }
}
