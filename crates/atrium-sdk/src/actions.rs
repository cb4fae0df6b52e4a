//! The public verb API.
//!
//! Every verb does the same four things: mint a correlation id when the verb
//! can be answered, park the caller's closures in the callback table, build
//! an envelope, and send it toward whoever renders: upward when nested,
//! broadcast when this window is the root. Payload *shapes* here are the
//! contract with the rendering collaborator; the bus only guarantees
//! delivery and id correlation.

use serde::{Deserialize, Serialize};
use serde_json::json;

use atrium_bus::CallbackSlots;
use atrium_common::{Envelope, MessageKind};

use crate::context::ShellSdk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToastOptions {
    pub message: String,
    pub level: ToastLevel,
    /// `None` = stays until dismissed or updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
}

impl ToastOptions {
    pub fn new(message: impl Into<String>, level: ToastLevel) -> Self {
        Self {
            message: message.into(),
            level,
            duration_ms: None,
            action_label: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, ToastLevel::Info)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, ToastLevel::Error)
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn with_action_label(mut self, label: impl Into<String>) -> Self {
        self.action_label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogOptions {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_label: Option<String>,
    /// Third button, resolved through the secondary slot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_label: Option<String>,
}

impl DialogOptions {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            confirm_label: None,
            cancel_label: None,
            secondary_label: None,
        }
    }

    pub fn with_labels(
        mut self,
        confirm: impl Into<String>,
        cancel: impl Into<String>,
    ) -> Self {
        self.confirm_label = Some(confirm.into());
        self.cancel_label = Some(cancel.into());
        self
    }

    pub fn with_secondary_label(mut self, label: impl Into<String>) -> Self {
        self.secondary_label = Some(label.into());
        self
    }
}

/// Which transient surface an overlay request opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlaySurface {
    Modal,
    Drawer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayOptions {
    pub surface: OverlaySurface,
    /// What the overlay should embed.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl OverlayOptions {
    pub fn modal(url: impl Into<String>) -> Self {
        Self {
            surface: OverlaySurface::Modal,
            url: url.into(),
            title: None,
        }
    }

    pub fn drawer(url: impl Into<String>) -> Self {
        Self {
            surface: OverlaySurface::Drawer,
            url: url.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

fn to_payload<T: Serialize>(options: &T) -> serde_json::Value {
    serde_json::to_value(options).unwrap_or_else(|_| json!({}))
}

impl ShellSdk {
    /// Show a toast. Returns the correlation id the rendering side will echo
    /// back in its replies; keep it to `clear_callbacks` on unmount.
    pub fn toast(&self, options: ToastOptions, slots: CallbackSlots) -> String {
        self.request_with_reply(MessageKind::ToastShow, to_payload(&options), slots)
    }

    /// Update a toast already on screen (same correlation id).
    pub fn update_toast(&self, id: &str, options: ToastOptions) {
        let mut payload = to_payload(&options);
        if let serde_json::Value::Object(map) = &mut payload {
            map.insert("id".into(), json!(id));
        }
        self.dispatch_request(&Envelope::new(MessageKind::ToastUpdate, payload));
    }

    /// Show a dialog. The answer comes back through the action, cancel, or
    /// secondary slot.
    pub fn dialog(&self, options: DialogOptions, slots: CallbackSlots) -> String {
        self.request_with_reply(MessageKind::DialogShow, to_payload(&options), slots)
    }

    pub fn update_dialog(&self, id: &str, options: DialogOptions) {
        let mut payload = to_payload(&options);
        if let serde_json::Value::Object(map) = &mut payload {
            map.insert("id".into(), json!(id));
        }
        self.dispatch_request(&Envelope::new(MessageKind::DialogUpdate, payload));
    }

    pub fn open_modal(&self, options: OverlayOptions) -> bool {
        self.dispatch_request(&Envelope::new(MessageKind::OverlayOpen, to_payload(&options)))
    }

    pub fn open_drawer(&self, url: impl Into<String>) -> bool {
        self.open_modal(OverlayOptions::drawer(url))
    }

    /// Close the topmost transient overlay.
    pub fn close_overlay(&self) -> bool {
        self.dispatch_request(&Envelope::new(MessageKind::OverlayClose, json!(null)))
    }

    /// Ask the shell to navigate.
    pub fn navigate(&self, url: impl Into<String>) -> bool {
        self.dispatch_request(&Envelope::new(
            MessageKind::Navigate,
            json!({ "url": url.into() }),
        ))
    }
}
