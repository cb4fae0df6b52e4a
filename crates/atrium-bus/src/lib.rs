//! The cross-frame message bus.
//!
//! Each window realm owns one [`MessageBus`]: a typed listener table, a
//! registry of child frames, and the relay logic that moves envelopes up and
//! down the frame tree one hop at a time. Windows share nothing but
//! mailboxes; every interaction between realms is a queued message.

pub mod bus;
pub mod callback;
pub mod frame;
pub mod listener;
pub mod window;

pub use bus::{pump_all, MessageBus};
pub use callback::{invoke_slot, CallbackDiagnostics, CallbackRegistry, CallbackSlots, Slot};
pub use frame::{FrameHandle, FrameRegistry};
pub use listener::{listener, Listener, ListenerRegistry};
pub use window::{Inbound, WindowRef};
