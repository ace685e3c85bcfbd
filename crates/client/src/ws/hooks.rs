//! Push channel hooks for Dioxus components.

use std::cell::RefCell;
use std::rc::Rc;

use dioxus::prelude::*;
use serde_json::Value;
use tokio::sync::mpsc;

use super::connection::ConnectionState;
use super::subscription::EventListener;
use crate::provider::use_tracker;

type Callback = Box<dyn FnMut(Value)>;

/// Call `callback` with the payload of every `event` frame while the
/// component is mounted.
///
/// The newest `callback` from each render is the one called, without
/// re-registering on the channel. A changed `event` moves the registration.
/// Nothing is called after unmount.
pub fn use_ws_event(event: &str, callback: impl FnMut(Value) + 'static) {
    let ctx = use_tracker();
    let slot = use_hook(|| Rc::new(RefCell::new(Box::new(|_: Value| {}) as Callback)));
    *slot.borrow_mut() = Box::new(callback);

    let listener = use_hook(|| {
        // Handlers run on the channel's thread; hop onto the component's task.
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let deliver = slot.clone();
        spawn(async move {
            while let Some(data) = rx.recv().await {
                (deliver.borrow_mut())(data);
            }
        });
        Rc::new(RefCell::new(EventListener::new(ctx.channel.clone(), event, move |data: &Value| {
            let _ = tx.send(data.clone());
        })))
    });
    listener.borrow_mut().set_event(event);
}

/// Connection state of the shared push channel, updated live.
pub fn use_connection_state() -> Signal<ConnectionState> {
    let channel = use_tracker().channel;
    let mut state = use_signal(|| channel.state());
    use_hook(move || {
        let mut rx = channel.watch_state();
        spawn(async move {
            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                state.set(next);
            }
        })
    });
    state
}
