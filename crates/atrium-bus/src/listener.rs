//! Typed listener table: message kind → ordered listener list.

use std::collections::HashMap;

use atrium_common::{Envelope, MessageKind};

/// A registered message listener. `Arc` so registrations can be compared by
/// identity: adding the same listener to a kind twice is a no-op, and an
/// unsubscribe removes exactly the pair it was created for.
pub type Listener = std::sync::Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Envelope) + Send + Sync + 'static,
{
    std::sync::Arc::new(f)
}

#[derive(Default)]
pub struct ListenerRegistry {
    by_kind: HashMap<MessageKind, Vec<Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for a kind. Returns `false` if this exact
    /// listener is already registered for it.
    pub fn add(&mut self, kind: MessageKind, l: Listener) -> bool {
        let entry = self.by_kind.entry(kind).or_default();
        if entry.iter().any(|existing| std::sync::Arc::ptr_eq(existing, &l)) {
            return false;
        }
        entry.push(l);
        true
    }

    /// Remove exactly this `(kind, listener)` pair. The kind's entry is
    /// pruned when its last listener goes, so the table never accumulates
    /// empty sets.
    pub fn remove(&mut self, kind: MessageKind, l: &Listener) -> bool {
        let Some(entry) = self.by_kind.get_mut(&kind) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|existing| !std::sync::Arc::ptr_eq(existing, l));
        let removed = entry.len() != before;
        if entry.is_empty() {
            self.by_kind.remove(&kind);
        }
        removed
    }

    /// Clone the listener list for a kind before invoking anything, so a
    /// listener that mutates registrations cannot invalidate the iteration.
    pub fn snapshot(&self, kind: MessageKind) -> Vec<Listener> {
        self.by_kind.get(&kind).cloned().unwrap_or_default()
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.by_kind.get(&kind).map_or(0, Vec::len)
    }

    /// Whether any listener list exists for the kind (pruning check).
    pub fn has_kind(&self, kind: MessageKind) -> bool {
        self.by_kind.contains_key(&kind)
    }

    pub fn clear(&mut self) {
        self.by_kind.clear();
    }
}
