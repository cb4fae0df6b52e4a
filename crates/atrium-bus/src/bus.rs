//! Per-window message bus: listener dispatch plus hop-by-hop relay.
//!
//! Every window runs the same algorithm, which is what lets a message
//! originate at any depth and reach any other depth without bespoke routing
//! per message type:
//!
//! - Upward: an envelope received from a registered child has that child's id
//!   appended to its `from` path and is forwarded to our own parent. At the
//!   root the accumulated path is the full origin→root route, ready to be
//!   reversed into a `to` address for the reply.
//! - Downward: an envelope received from our parent is relayed to our own
//!   children, each forwarded copy with the receiving child's id consumed
//!   from `to`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, trace, warn};

use atrium_common::{Envelope, FrameId, MessageKind};

use crate::frame::{FrameHandle, FrameRegistry};
use crate::listener::{Listener, ListenerRegistry};
use crate::window::{Inbound, WindowRef};

pub struct MessageBus {
    window: WindowRef,
    parent: Option<WindowRef>,
    /// Origin prefixes (beyond our own origin) whose messages we accept.
    allowed_origins: Vec<String>,
    frames: Mutex<FrameRegistry>,
    listeners: Arc<Mutex<ListenerRegistry>>,
    listening: AtomicBool,
}

impl MessageBus {
    pub fn new(window: WindowRef, parent: Option<WindowRef>) -> Self {
        Self {
            window,
            parent,
            allowed_origins: Vec::new(),
            frames: Mutex::new(FrameRegistry::new()),
            listeners: Arc::new(Mutex::new(ListenerRegistry::new())),
            listening: AtomicBool::new(false),
        }
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Install the global message handler. Idempotent: returns `false` when
    /// already listening.
    pub fn install(&self) -> bool {
        !self.listening.swap(true, Ordering::SeqCst)
    }

    /// Stop handling messages. Queued mail stays on the mailbox; needed for
    /// test isolation and hot reload, not for normal operation.
    pub fn teardown(&self) -> bool {
        self.listening.swap(false, Ordering::SeqCst)
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// "Am I root" is normal state, not an error.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn window(&self) -> &WindowRef {
        &self.window
    }

    // -- frame registration ---------------------------------------------

    /// Register a child frame. A handle whose content window is this realm
    /// itself is rejected: it would relay every message back into our own
    /// mailbox forever.
    pub fn add_frame(&self, handle: FrameHandle) -> atrium_common::Result<FrameId> {
        if handle.content_window().same_window(&self.window) {
            return Err(atrium_common::BusError::InvalidFrame(
                "frame's content window is the registering window".into(),
            ));
        }
        self.frames.lock().unwrap().add(handle)
    }

    pub fn remove_frame(&self, id: &FrameId) -> bool {
        self.frames.lock().unwrap().remove(id)
    }

    pub fn remove_frame_window(&self, window: &WindowRef) -> bool {
        self.frames.lock().unwrap().remove_window(window)
    }

    pub fn frame_id_by_window(&self, window: &WindowRef) -> Option<FrameId> {
        self.frames.lock().unwrap().id_by_window(window).cloned()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    // -- listener registration ------------------------------------------

    /// Register a listener and get back the closure that removes exactly
    /// this `(kind, listener)` pair.
    pub fn add_listener(
        &self,
        kind: MessageKind,
        l: Listener,
    ) -> impl FnOnce() -> bool + Send {
        self.listeners.lock().unwrap().add(kind, l.clone());
        let listeners = Arc::clone(&self.listeners);
        move || listeners.lock().unwrap().remove(kind, &l)
    }

    pub fn remove_listener(&self, kind: MessageKind, l: &Listener) -> bool {
        self.listeners.lock().unwrap().remove(kind, l)
    }

    pub fn listener_count(&self, kind: MessageKind) -> usize {
        self.listeners.lock().unwrap().count(kind)
    }

    // -- sending ---------------------------------------------------------

    /// Deliver to the children named in `to`, or all children when `to` is
    /// empty or wildcard. Each forwarded copy has the receiving child's own
    /// id consumed from `to`, so nested shells only see the portion of the
    /// address still relevant below them. Zero reached children is a normal
    /// condition: a leaf window has none.
    pub fn send(&self, env: &Envelope) -> usize {
        let frames = self.frames.lock().unwrap();
        let broadcast = env.is_broadcast();
        let mut reached = 0;
        for (id, handle) in frames.iter() {
            if !broadcast && !env.to.contains(id) {
                continue;
            }
            let mut fwd = env.clone();
            fwd.to.retain(|t| t != id);
            handle
                .content_window()
                .post_message(&self.window, fwd.to_json());
            reached += 1;
        }
        trace!(kind = %env.kind, reached, "send fan-out");
        reached
    }

    /// `send` with `to` forced to the wildcard.
    pub fn broadcast(&self, env: &Envelope) -> usize {
        let all = env.clone().addressed_to(vec![FrameId::wildcard()]);
        self.send(&all)
    }

    /// Post directly to the parent window. Returns `false` at the root.
    pub fn send_to_parent(&self, env: &Envelope) -> bool {
        match &self.parent {
            Some(parent) => {
                parent.post_message(&self.window, env.to_json());
                true
            }
            None => false,
        }
    }

    // -- receiving -------------------------------------------------------

    /// Drain this realm's mailbox and run the global dispatch for each
    /// message. Returns how many messages were handled. A no-op until
    /// [`MessageBus::install`] has run.
    pub fn pump(&self) -> usize {
        if !self.is_listening() {
            return 0;
        }
        let batch = self.window.drain();
        let handled = batch.len();
        for inbound in batch {
            self.dispatch(inbound);
        }
        handled
    }

    fn dispatch(&self, inbound: Inbound) {
        // 1. Foreign traffic on a shared transport is not an error.
        let Some(mut env) = Envelope::parse(&inbound.data) else {
            return;
        };

        if !self.origin_allowed(inbound.source.origin()) {
            warn!(
                kind = %env.kind,
                origin = inbound.source.origin(),
                "dropping message from disallowed origin"
            );
            return;
        }

        // 2. Resolve the sender: one of our registered children, or our
        // parent. Anything else looks like ours but cannot be routed a
        // reply, so it is dropped loudly.
        let from_child = self.frame_id_by_window(&inbound.source);
        let from_parent = self
            .parent
            .as_ref()
            .is_some_and(|p| p.same_window(&inbound.source));
        if from_child.is_none() && !from_parent {
            warn!(kind = %env.kind, "dropping message from unregistered window");
            return;
        }

        // Extend the path as the message crosses into this window, so both
        // local listeners and the upward relay see where it came from.
        if let Some(child_id) = &from_child {
            env.from.push(child_id.clone());
        }

        // 3. Local fan-out. A concrete `to` that does not name us suppresses
        // local delivery in a nested shell; the root always observes, and
        // URL-change is always locally observable because every window must
        // know its own children's navigation regardless of addressing.
        if self.is_root() || env.is_broadcast() || env.kind == MessageKind::UrlChange {
            self.fan_out(&env);
        }

        // 4. URL-change is per-window telemetry, never relayed further up.
        if env.kind == MessageKind::UrlChange {
            return;
        }

        if from_child.is_some() {
            // 5. Bubble one hop toward the root.
            if let Some(parent) = &self.parent {
                trace!(kind = %env.kind, "relaying upward");
                parent.post_message(&self.window, env.to_json());
            }
        } else {
            // 6. Relay downward for deeper descendants, consuming `to` one
            // hop at a time.
            self.send(&env);
        }
    }

    fn fan_out(&self, env: &Envelope) {
        let snapshot = self.listeners.lock().unwrap().snapshot(env.kind);
        if snapshot.is_empty() {
            debug!(kind = %env.kind, "no listeners for message");
            return;
        }
        for l in snapshot {
            // One bad listener must not stop the rest.
            if catch_unwind(AssertUnwindSafe(|| l(env))).is_err() {
                error!(kind = %env.kind, "listener panicked during dispatch");
            }
        }
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        origin == self.window.origin()
            || self.allowed_origins.iter().any(|p| origin.starts_with(p))
    }
}

/// Pump every bus until the whole tree is quiescent. Deterministic: delivery
/// interleaving is fixed by the order of `buses`.
pub fn pump_all(buses: &[&MessageBus]) -> usize {
    let mut total = 0;
    loop {
        let handled: usize = buses.iter().map(|b| b.pump()).sum();
        if handled == 0 {
            return total;
        }
        total += handled;
    }
}
