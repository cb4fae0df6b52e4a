//! The per-window composition root.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use atrium_bus::{
    invoke_slot, listener, CallbackRegistry, CallbackSlots, FrameHandle, Listener, MessageBus,
    WindowRef,
};
use atrium_common::{new_correlation_id, Envelope, FrameId, MessageKind};

use crate::config::SdkConfig;

/// One window's SDK instance. Explicitly constructed and passed around (no
/// module-level singleton) so tests and hot reload can build isolated
/// instances.
pub struct ShellSdk {
    bus: Arc<MessageBus>,
    callbacks: Arc<Mutex<CallbackRegistry>>,
    /// Last URL reported to the parent, for net-change suppression.
    last_url: Mutex<Option<String>>,
}

/// Resource counters for the leak surfaces this substrate deliberately does
/// not reap (see the callback registry).
#[derive(Debug, Clone, Copy)]
pub struct SdkDiagnostics {
    pub pending_callbacks: usize,
    pub oldest_callback: Option<Duration>,
    pub frames: usize,
}

impl ShellSdk {
    /// Build the SDK for a window: `parent` is `None` at the root shell.
    /// Installs the bus and the cross-cutting reply listeners.
    pub fn new(window: WindowRef, parent: Option<WindowRef>, config: SdkConfig) -> Arc<Self> {
        let bus = Arc::new(
            MessageBus::new(window, parent).with_allowed_origins(config.allowed_origins),
        );
        bus.install();
        let sdk = Arc::new(Self {
            bus,
            callbacks: Arc::new(Mutex::new(CallbackRegistry::new())),
            last_url: Mutex::new(None),
        });
        sdk.install_reply_routing();
        sdk
    }

    /// Route the three reply kinds back into the callback table. These
    /// listeners live for the window's lifetime.
    fn install_reply_routing(&self) {
        for kind in [
            MessageKind::ReplyAction,
            MessageKind::ReplyCancel,
            MessageKind::ReplySecondary,
        ] {
            let callbacks = Arc::clone(&self.callbacks);
            let _lifetime = self.bus.add_listener(
                kind,
                listener(move |env| {
                    let Some(id) = env.correlation_id() else {
                        warn!(kind = %env.kind, "reply without correlation id");
                        return;
                    };
                    // Take the slot under the lock, invoke it after the
                    // guard drops: the callback may re-enter the SDK and
                    // needs the table free.
                    let slot = {
                        let mut table = callbacks.lock().unwrap();
                        match env.kind {
                            MessageKind::ReplyCancel => table.take_cancel(id),
                            MessageKind::ReplySecondary => table.take_secondary(id),
                            _ => table.take_action(id),
                        }
                    };
                    let handled = slot.is_some();
                    if let Some(f) = slot {
                        invoke_slot(id, f);
                    }
                    debug!(id, kind = %env.kind, handled, "reply routed");
                }),
            );
        }
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn is_root(&self) -> bool {
        self.bus.is_root()
    }

    /// Handle everything queued on this window's mailbox.
    pub fn pump(&self) -> usize {
        self.bus.pump()
    }

    // -- public bus surface ---------------------------------------------

    pub fn add_frame(&self, handle: FrameHandle) -> atrium_common::Result<FrameId> {
        self.bus.add_frame(handle)
    }

    pub fn remove_frame(&self, id: &FrameId) -> bool {
        self.bus.remove_frame(id)
    }

    pub fn remove_frame_window(&self, window: &WindowRef) -> bool {
        self.bus.remove_frame_window(window)
    }

    pub fn add_listener(
        &self,
        kind: MessageKind,
        l: Listener,
    ) -> impl FnOnce() -> bool + Send {
        self.bus.add_listener(kind, l)
    }

    pub fn remove_listener(&self, kind: MessageKind, l: &Listener) -> bool {
        self.bus.remove_listener(kind, l)
    }

    pub fn send(&self, env: &Envelope) -> usize {
        self.bus.send(env)
    }

    pub fn broadcast(&self, env: &Envelope) -> usize {
        self.bus.broadcast(env)
    }

    pub fn send_to_parent(&self, env: &Envelope) -> bool {
        self.bus.send_to_parent(env)
    }

    // -- cross-cutting behavior -----------------------------------------

    /// Report this window's current location. Called by the embedder on
    /// every history event (`pushState`, `replaceState`, `popstate`,
    /// `hashchange`); only *net* changes leave the window. Returns whether a
    /// notification was sent to the parent.
    pub fn report_url(&self, url: &str) -> bool {
        {
            let mut last = self.last_url.lock().unwrap();
            if last.as_deref() == Some(url) {
                return false;
            }
            *last = Some(url.to_string());
        }
        if self.bus.is_root() {
            // The root has no one to tell; it only tracks itself.
            debug!(url, "root url changed");
            return false;
        }
        self.bus
            .send_to_parent(&Envelope::new(MessageKind::UrlChange, json!({ "url": url })))
    }

    /// Escape pressed in this window: ask the shell above us to close
    /// whatever transient overlay is on top. At the root there is nothing
    /// above, so the close request goes to the children instead.
    pub fn handle_escape_key(&self) -> bool {
        self.dispatch_request(&Envelope::new(MessageKind::OverlayClose, json!(null)))
    }

    /// Mint a correlation id, park the slots, and send the request on its
    /// way. Used by every verb that can be answered.
    pub(crate) fn request_with_reply(
        &self,
        kind: MessageKind,
        mut payload: serde_json::Value,
        slots: CallbackSlots,
    ) -> String {
        let id = new_correlation_id();
        if let serde_json::Value::Object(map) = &mut payload {
            map.insert("id".into(), json!(id));
        }
        self.callbacks.lock().unwrap().register(id.clone(), slots);
        self.dispatch_request(&Envelope::new(kind, payload));
        id
    }

    /// Requests travel toward whoever renders: upward when nested, to the
    /// children when we are the root.
    pub(crate) fn dispatch_request(&self, env: &Envelope) -> bool {
        if self.bus.is_root() {
            self.bus.broadcast(env) > 0
        } else {
            self.bus.send_to_parent(env)
        }
    }

    /// Drop the callbacks of an interaction that will never be answered
    /// (e.g. the requesting view unmounted).
    pub fn clear_callbacks(&self, id: &str) -> bool {
        self.callbacks.lock().unwrap().clear(id)
    }

    pub fn diagnostics(&self) -> SdkDiagnostics {
        let cb = self.callbacks.lock().unwrap().diagnostics();
        SdkDiagnostics {
            pending_callbacks: cb.pending,
            oldest_callback: cb.oldest,
            frames: self.bus.frame_count(),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_callbacks(&self) -> usize {
        self.callbacks.lock().unwrap().pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{DialogOptions, ToastOptions};
    use atrium_bus::pump_all;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Realm {
        sdk: Arc<ShellSdk>,
    }

    impl Realm {
        fn root() -> Self {
            Self {
                sdk: ShellSdk::new(WindowRef::new("app://shell"), None, SdkConfig::new()),
            }
        }

        fn child_of(parent: &Realm) -> (Self, FrameId) {
            let window = WindowRef::new("app://shell");
            let sdk = ShellSdk::new(
                window.clone(),
                Some(parent.sdk.bus().window().clone()),
                SdkConfig::new(),
            );
            let id = parent.sdk.add_frame(FrameHandle::new(window)).unwrap();
            (Self { sdk }, id)
        }

        fn record(&self, kind: MessageKind) -> Arc<Mutex<Vec<Envelope>>> {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            let _lifetime = self.sdk.add_listener(
                kind,
                listener(move |env| sink.lock().unwrap().push(env.clone())),
            );
            seen
        }
    }

    fn run(realms: &[&Realm]) -> usize {
        let buses: Vec<&MessageBus> = realms.iter().map(|r| r.sdk.bus()).collect();
        pump_all(&buses)
    }

    #[test]
    fn dialog_round_trip_resolves_and_clears_the_callback() {
        let root = Realm::root();
        let (b, b_id) = Realm::child_of(&root);

        let shows = root.record(MessageKind::DialogShow);
        let replies_at_b = b.record(MessageKind::ReplyAction);

        let confirmed = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&confirmed);
        let cid = b.sdk.dialog(
            DialogOptions::new("Delete?", "This cannot be undone"),
            CallbackSlots::new().on_action(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
        );
        run(&[&root, &b]);

        // The request arrived at the root carrying the path back to B.
        let shows = shows.lock().unwrap();
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].from, vec![b_id]);
        assert_eq!(shows[0].correlation_id(), Some(cid.as_str()));

        // Root's UI answers, addressed back along the path.
        let reply = Envelope::new(MessageKind::ReplyAction, json!({ "id": cid }))
            .addressed_to(shows[0].from.clone());
        root.sdk.send(&reply);
        run(&[&root, &b]);

        assert_eq!(confirmed.load(Ordering::SeqCst), 1);
        // Fully consumed address by the time it reached B.
        assert!(replies_at_b.lock().unwrap()[0].to.is_empty());
        // Resolving auto-cleared the entry: a duplicate reply is a no-op.
        assert_eq!(b.sdk.pending_callbacks(), 0);
        root.sdk.send(&reply);
        run(&[&root, &b]);
        assert_eq!(confirmed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn three_level_toast_reaches_root_and_reply_comes_back() {
        let root = Realm::root();
        let (a, a_id) = Realm::child_of(&root);
        let (a1, a1_id) = Realm::child_of(&a);
        let (sibling, _) = Realm::child_of(&a);

        let shows = root.record(MessageKind::ToastShow);
        let sibling_replies = sibling.record(MessageKind::ReplyAction);

        let tapped = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&tapped);
        let cid = a1.sdk.toast(
            ToastOptions::info("Saved").with_action_label("Undo"),
            CallbackSlots::new().on_action(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
        );
        run(&[&root, &a, &a1, &sibling]);

        let shows = shows.lock().unwrap();
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].from, vec![a1_id, a_id]);

        let reply = Envelope::new(MessageKind::ReplyAction, json!({ "id": cid }))
            .addressed_to(shows[0].from.clone());
        root.sdk.send(&reply);
        run(&[&root, &a, &a1, &sibling]);

        assert_eq!(tapped.load(Ordering::SeqCst), 1);
        assert!(sibling_replies.lock().unwrap().is_empty());
    }

    #[test]
    fn cancel_reply_fires_the_cancel_slot_only() {
        let root = Realm::root();
        let (b, _) = Realm::child_of(&root);
        let shows = root.record(MessageKind::DialogShow);

        let confirmed = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicUsize::new(0));
        let c1 = Arc::clone(&confirmed);
        let c2 = Arc::clone(&cancelled);
        b.sdk.dialog(
            DialogOptions::new("Quit?", ""),
            CallbackSlots::new()
                .on_action(move || {
                    c1.fetch_add(1, Ordering::SeqCst);
                })
                .on_cancel(move || {
                    c2.fetch_add(1, Ordering::SeqCst);
                }),
        );
        run(&[&root, &b]);

        let shows = shows.lock().unwrap();
        let reply = Envelope::new(
            MessageKind::ReplyCancel,
            json!({ "id": shows[0].correlation_id().unwrap() }),
        )
        .addressed_to(shows[0].from.clone());
        root.sdk.send(&reply);
        run(&[&root, &b]);

        assert_eq!(confirmed.load(Ordering::SeqCst), 0);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_can_reenter_the_sdk() {
        let root = Realm::root();
        let (b, _) = Realm::child_of(&root);
        let shows = root.record(MessageKind::DialogShow);
        let toasts = root.record(MessageKind::ToastShow);

        // The confirm handler issues a follow-up toast and inspects the
        // callback table, both of which go through the same mutex the reply
        // router uses.
        let inner = Arc::clone(&b.sdk);
        b.sdk.dialog(
            DialogOptions::new("Publish?", "This page will go live"),
            CallbackSlots::new().on_action(move || {
                inner.toast(ToastOptions::info("Published"), CallbackSlots::new());
                assert_eq!(inner.diagnostics().pending_callbacks, 1);
            }),
        );
        run(&[&root, &b]);

        let reply = {
            let shows = shows.lock().unwrap();
            Envelope::new(
                MessageKind::ReplyAction,
                json!({ "id": shows[0].correlation_id().unwrap() }),
            )
            .addressed_to(shows[0].from.clone())
        };
        root.sdk.send(&reply);
        run(&[&root, &b]);

        assert_eq!(toasts.lock().unwrap().len(), 1);
        assert_eq!(toasts.lock().unwrap()[0].payload["message"], "Published");
    }

    #[test]
    fn report_url_sends_net_changes_only() {
        let root = Realm::root();
        let (child, _) = Realm::child_of(&root);
        let at_root = root.record(MessageKind::UrlChange);

        assert!(child.sdk.report_url("/home"));
        assert!(!child.sdk.report_url("/home"));
        assert!(child.sdk.report_url("/settings"));
        assert!(!child.sdk.report_url("/settings"));
        run(&[&root, &child]);

        let seen = at_root.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].payload["url"], "/home");
        assert_eq!(seen[1].payload["url"], "/settings");
    }

    #[test]
    fn root_report_url_stays_local() {
        let root = Realm::root();
        assert!(!root.sdk.report_url("/dashboard"));
    }

    #[test]
    fn escape_requests_overlay_close_upward() {
        let root = Realm::root();
        let (child, _) = Realm::child_of(&root);
        let closes = root.record(MessageKind::OverlayClose);

        assert!(child.sdk.handle_escape_key());
        run(&[&root, &child]);
        assert_eq!(closes.lock().unwrap().len(), 1);
    }

    #[test]
    fn diagnostics_counts_pending_interactions() {
        let root = Realm::root();
        let (b, _) = Realm::child_of(&root);

        let cid = b.sdk.dialog(DialogOptions::new("?", ""), CallbackSlots::new().on_action(|| {}));
        let diag = b.sdk.diagnostics();
        assert_eq!(diag.pending_callbacks, 1);
        assert!(diag.oldest_callback.is_some());

        // Abandoned interaction: the owner clears it explicitly.
        assert!(b.sdk.clear_callbacks(&cid));
        assert_eq!(b.sdk.diagnostics().pending_callbacks, 0);
    }
}
