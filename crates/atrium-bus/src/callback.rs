//! Correlation-id side table for non-serializable callbacks.
//!
//! Closures cannot cross a realm boundary; only structured-clone-safe data
//! can. The requesting window keeps the real closures here, keyed by an id it
//! mints, and puts only the id in the envelope payload. The answering
//! window's UI sends the id back in a reply message, and this table resolves
//! it to the closure.
//!
//! The first successful trigger of *any* slot removes the whole entry, so a
//! duplicate or late reply resolves to "not found" instead of firing twice.
//! Entries never self-expire: an interaction that is never answered stays
//! pending until the owner calls [`CallbackRegistry::clear`], and
//! [`CallbackRegistry::diagnostics`] makes that leak surface visible.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

/// A taken callback, ready to invoke with no registry lock held.
pub type Slot = Box<dyn FnOnce() + Send>;

/// The three independent reply slots of a pending interaction.
#[derive(Default)]
pub struct CallbackSlots {
    action: Option<Slot>,
    cancel: Option<Slot>,
    secondary: Option<Slot>,
}

impl CallbackSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_action<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.action = Some(Box::new(f));
        self
    }

    pub fn on_cancel<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.cancel = Some(Box::new(f));
        self
    }

    pub fn on_secondary<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.secondary = Some(Box::new(f));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    Action,
    Cancel,
    Secondary,
}

impl SlotKind {
    fn as_str(self) -> &'static str {
        match self {
            SlotKind::Action => "action",
            SlotKind::Cancel => "cancel",
            SlotKind::Secondary => "secondary",
        }
    }
}

struct Entry {
    slots: CallbackSlots,
    created_at: Instant,
}

/// Pending-callback counters for leak inspection. There is deliberately no
/// cap and no eviction; abandoned entries are reported, not reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackDiagnostics {
    pub pending: usize,
    pub oldest: Option<Duration>,
}

#[derive(Default)]
pub struct CallbackRegistry {
    entries: HashMap<String, Entry>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the slots for a pending interaction. An all-empty slot set is
    /// valid (the interaction just cannot be handled).
    pub fn register(&mut self, id: impl Into<String>, slots: CallbackSlots) {
        let id = id.into();
        if self.entries.contains_key(&id) {
            warn!(id = %id, "overwriting pending callback entry");
        }
        self.entries.insert(
            id,
            Entry {
                slots,
                created_at: Instant::now(),
            },
        );
    }

    pub fn trigger_action(&mut self, id: &str) -> bool {
        self.trigger(id, SlotKind::Action)
    }

    pub fn trigger_cancel(&mut self, id: &str) -> bool {
        self.trigger(id, SlotKind::Cancel)
    }

    pub fn trigger_secondary(&mut self, id: &str) -> bool {
        self.trigger(id, SlotKind::Secondary)
    }

    /// Remove and return the action slot, resolving the whole entry on a
    /// hit. A caller that guards the registry with a mutex takes the slot
    /// under the lock and invokes it after dropping the guard, so the
    /// callback can re-enter the registry (e.g. to issue a follow-up
    /// request) without self-deadlocking.
    pub fn take_action(&mut self, id: &str) -> Option<Slot> {
        self.take(id, SlotKind::Action)
    }

    pub fn take_cancel(&mut self, id: &str) -> Option<Slot> {
        self.take(id, SlotKind::Cancel)
    }

    pub fn take_secondary(&mut self, id: &str) -> Option<Slot> {
        self.take(id, SlotKind::Secondary)
    }

    fn take(&mut self, id: &str, kind: SlotKind) -> Option<Slot> {
        let Some(entry) = self.entries.get_mut(id) else {
            // Duplicate and late replies are expected under at-least-once
            // delivery; this is not an error.
            debug!(id, slot = kind.as_str(), "no pending callback for reply");
            return None;
        };
        let slot = match kind {
            SlotKind::Action => entry.slots.action.take(),
            SlotKind::Cancel => entry.slots.cancel.take(),
            SlotKind::Secondary => entry.slots.secondary.take(),
        };
        let Some(f) = slot else {
            debug!(id, slot = kind.as_str(), "callback slot not registered");
            return None;
        };

        // One reply resolves the whole interaction: drop the other slots
        // before returning, so re-entrant triggers from inside the callback
        // see a clean table.
        self.entries.remove(id);
        Some(f)
    }

    fn trigger(&mut self, id: &str, kind: SlotKind) -> bool {
        let Some(f) = self.take(id, kind) else {
            return false;
        };
        invoke_slot(id, f);
        true
    }

    /// Drop a pending entry. Idempotent.
    pub fn clear(&mut self, id: &str) -> bool {
        let existed = self.entries.remove(id).is_some();
        if !existed {
            debug!(id, "clear on unknown callback id");
        }
        existed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn diagnostics(&self) -> CallbackDiagnostics {
        CallbackDiagnostics {
            pending: self.entries.len(),
            oldest: self
                .entries
                .values()
                .map(|e| e.created_at.elapsed())
                .max(),
        }
    }
}

/// Run a taken slot, containing its panic so one misbehaving consumer
/// cannot take down the window.
pub fn invoke_slot(id: &str, f: Slot) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!(id, "callback panicked");
    }
}
