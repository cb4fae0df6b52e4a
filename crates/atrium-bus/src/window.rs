//! The realm/mailbox model underneath the bus.
//!
//! A [`WindowRef`] stands in for a browser window reference: it is the
//! identity of a realm (compared by reference, the way `event.source` is
//! compared against an iframe's content window) and the only way to reach
//! that realm (posting queues data on its mailbox). Delivery is asynchronous:
//! nothing runs until the receiving realm pumps its own bus. The queue
//! preserves send order per sender, matching the platform guarantee.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One message queued on a realm's mailbox: the raw transport data plus the
/// sending realm, the analogue of a `message` event's `data` and `source`.
#[derive(Clone)]
pub struct Inbound {
    pub source: WindowRef,
    pub data: String,
}

struct Realm {
    origin: String,
    inbox: Mutex<VecDeque<Inbound>>,
}

/// A shared reference to a window realm.
#[derive(Clone)]
pub struct WindowRef(Arc<Realm>);

impl WindowRef {
    pub fn new(origin: impl Into<String>) -> Self {
        Self(Arc::new(Realm {
            origin: origin.into(),
            inbox: Mutex::new(VecDeque::new()),
        }))
    }

    pub fn origin(&self) -> &str {
        &self.0.origin
    }

    /// Reference identity, like comparing window objects across realms.
    pub fn same_window(&self, other: &WindowRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Queue raw data on this realm's mailbox. Always succeeds; whether the
    /// receiver ever handles it is the receiver's business.
    pub fn post_message(&self, source: &WindowRef, data: String) {
        if let Ok(mut inbox) = self.0.inbox.lock() {
            inbox.push_back(Inbound {
                source: source.clone(),
                data,
            });
        }
    }

    /// Take everything currently queued, in arrival order.
    pub fn drain(&self) -> Vec<Inbound> {
        match self.0.inbox.lock() {
            Ok(mut inbox) => inbox.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// How many messages are waiting.
    pub fn pending(&self) -> usize {
        self.0.inbox.lock().map(|q| q.len()).unwrap_or(0)
    }
}

impl PartialEq for WindowRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_window(other)
    }
}

impl Eq for WindowRef {}

impl std::fmt::Debug for WindowRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowRef")
            .field("origin", &self.0.origin)
            .field("ptr", &Arc::as_ptr(&self.0))
            .finish()
    }
}
