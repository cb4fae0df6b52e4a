//! Per-window shell SDK.
//!
//! [`ShellSdk`] is the composition root each window constructs once: it wires
//! the message bus to the callback table, installs the cross-cutting
//! listeners (reply routing, URL-change monitoring, escape-close), and
//! exposes the verb API (`toast`, `dialog`, `open_modal`, …). It renders
//! nothing; a UI collaborator listens for the show/update kinds and owns the
//! payload shapes.

pub mod actions;
pub mod bridge;
pub mod config;
pub mod context;

pub use actions::{DialogOptions, OverlayOptions, OverlaySurface, ToastLevel, ToastOptions};
pub use config::SdkConfig;
pub use context::{SdkDiagnostics, ShellSdk};
