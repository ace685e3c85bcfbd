//! Component that ties the push channel to the signed-in session.

use std::cell::RefCell;
use std::rc::Rc;

use dioxus::prelude::*;

use super::subscription::SessionLink;
use crate::auth_session::AuthContext;
use crate::provider::use_tracker;

/// Connects the shared push channel when a session appears and
/// disconnects it on logout or unmount. Mounted by [`crate::TrackerProvider`].
#[component]
pub fn WsManager(children: Element) -> Element {
    let auth = use_context::<AuthContext>();
    let channel = use_tracker().channel;
    let link = use_hook(|| Rc::new(RefCell::new(SessionLink::new(channel))));

    let sync_link = link.clone();
    use_effect(move || {
        let present = auth.session.read().is_some();
        sync_link.borrow_mut().sync(present);
    });

    use_drop(move || link.borrow_mut().teardown());

    children
}
