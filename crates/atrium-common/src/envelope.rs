//! The wire unit exchanged between window realms.
//!
//! Everything that crosses a realm boundary is one JSON envelope:
//! `{ "type": "atrium:…", "payload": …, "to": […], "from": […] }`.
//! The transport is shared with the browser and every other script on the
//! page, so parsing is the trust boundary: anything that is not a well-formed
//! envelope in our namespace is foreign traffic and never reaches a listener.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::errors::BusError;
use crate::id::FrameId;

/// Reserved prefix for every message type on the bus.
pub const NAMESPACE: &str = "atrium:";

/// Wildcard sentinel in a `to` list: "all local children".
pub const WILDCARD: &str = "*";

/// Every message type the bus routes. Closed on purpose: dispatch matches
/// exhaustively on this enum, and an unknown-but-namespaced string fails at
/// the parse boundary instead of leaking into routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MessageKind {
    /// A window's location changed. Root-bound telemetry: always locally
    /// observable, never relayed further upward.
    UrlChange,
    /// Request to open a transient overlay (modal, drawer).
    OverlayOpen,
    /// Request to close whatever transient overlay is on top.
    OverlayClose,
    ToastShow,
    ToastUpdate,
    DialogShow,
    DialogUpdate,
    /// Request the shell to navigate to a URL.
    Navigate,
    /// Primary-slot reply for a pending interaction. Carries the correlation
    /// id in `payload.id` and nothing else of ours.
    ReplyAction,
    ReplyCancel,
    ReplySecondary,
}

impl MessageKind {
    pub const ALL: &'static [MessageKind] = &[
        MessageKind::UrlChange,
        MessageKind::OverlayOpen,
        MessageKind::OverlayClose,
        MessageKind::ToastShow,
        MessageKind::ToastUpdate,
        MessageKind::DialogShow,
        MessageKind::DialogUpdate,
        MessageKind::Navigate,
        MessageKind::ReplyAction,
        MessageKind::ReplyCancel,
        MessageKind::ReplySecondary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::UrlChange => "atrium:url-change",
            MessageKind::OverlayOpen => "atrium:overlay-open",
            MessageKind::OverlayClose => "atrium:overlay-close",
            MessageKind::ToastShow => "atrium:toast-show",
            MessageKind::ToastUpdate => "atrium:toast-update",
            MessageKind::DialogShow => "atrium:dialog-show",
            MessageKind::DialogUpdate => "atrium:dialog-update",
            MessageKind::Navigate => "atrium:navigate",
            MessageKind::ReplyAction => "atrium:reply-action",
            MessageKind::ReplyCancel => "atrium:reply-cancel",
            MessageKind::ReplySecondary => "atrium:reply-secondary",
        }
    }

    /// Parse a wire type string. Fails fast on anything outside the
    /// namespace; a silently-ignored typo in a listener registration is
    /// worse than an error at the call site.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if !s.starts_with(NAMESPACE) {
            return Err(BusError::NotNamespaced { got: s.to_string() });
        }
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| BusError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for MessageKind {
    type Error = BusError;

    fn try_from(s: String) -> crate::Result<Self> {
        Self::parse(&s)
    }
}

impl From<MessageKind> for String {
    fn from(k: MessageKind) -> String {
        k.as_str().to_string()
    }
}

/// One routable message.
///
/// `to` is an allow-list of child ids consumed one hop at a time on the way
/// down; `from` is the id path accumulated one hop at a time on the way up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<FrameId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<FrameId>,
}

impl Envelope {
    pub fn new(kind: MessageKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            payload,
            to: Vec::new(),
            from: Vec::new(),
        }
    }

    /// Address this envelope to an explicit set of child ids.
    pub fn addressed_to(mut self, to: Vec<FrameId>) -> Self {
        self.to = to;
        self
    }

    /// An empty or wildcard-bearing `to` means "all local children".
    pub fn is_broadcast(&self) -> bool {
        self.to.is_empty() || self.to.iter().any(FrameId::is_wildcard)
    }

    /// The correlation id for reply kinds (`payload.id`).
    pub fn correlation_id(&self) -> Option<&str> {
        self.payload.get("id")?.as_str()
    }

    pub fn to_json(&self) -> String {
        // Envelope contains only JSON-representable data; serialization
        // cannot fail for any value constructed through this API.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("null"))
    }

    /// Parse raw transport data into an envelope.
    ///
    /// Non-JSON data and types outside our namespace are foreign traffic on
    /// a shared transport: dropped without noise. Data that claims our
    /// namespace but does not decode is logged, since that is a peer speaking a
    /// different protocol version, worth seeing in logs.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(raw).ok()?;
        let kind = value.get("type")?.as_str()?.to_string();
        if !kind.starts_with(NAMESPACE) {
            return None;
        }
        match serde_json::from_value(value) {
            Ok(env) => Some(env),
            Err(err) => {
                warn!(kind = %kind, %err, "dropping malformed namespaced message");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in MessageKind::ALL {
            let s = kind.as_str();
            assert!(s.starts_with(NAMESPACE));
            assert_eq!(MessageKind::parse(s).unwrap(), *kind);
        }
    }

    #[test]
    fn kind_rejects_foreign_namespace() {
        let err = MessageKind::parse("react-devtools:hello").unwrap_err();
        assert!(matches!(err, BusError::NotNamespaced { .. }));
    }

    #[test]
    fn kind_rejects_unknown_suffix() {
        let err = MessageKind::parse("atrium:frobnicate").unwrap_err();
        assert!(matches!(err, BusError::UnknownKind(_)));
    }

    #[test]
    fn envelope_serializes_kind_as_type_string() {
        let env = Envelope::new(MessageKind::ToastShow, json!({"id": "abcd1234"}));
        let raw = env.to_json();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "atrium:toast-show");
        // Empty routing lists stay off the wire.
        assert!(value.get("to").is_none());
        assert!(value.get("from").is_none());
    }

    #[test]
    fn envelope_parse_round_trip() {
        let child = FrameId::new();
        let env = Envelope::new(MessageKind::Navigate, json!({"url": "/settings"}))
            .addressed_to(vec![child.clone()]);
        let back = Envelope::parse(&env.to_json()).unwrap();
        assert_eq!(back.kind, MessageKind::Navigate);
        assert_eq!(back.to, vec![child]);
        assert_eq!(back.payload["url"], "/settings");
    }

    #[test]
    fn parse_drops_foreign_traffic_silently() {
        assert!(Envelope::parse("not json at all").is_none());
        assert!(Envelope::parse("{\"type\":\"webpack:ping\"}").is_none());
        assert!(Envelope::parse("{\"source\":\"react-devtools\"}").is_none());
        assert!(Envelope::parse("42").is_none());
    }

    #[test]
    fn parse_drops_unknown_namespaced_kind() {
        assert!(Envelope::parse("{\"type\":\"atrium:not-a-kind\"}").is_none());
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let env = Envelope::parse("{\"type\":\"atrium:overlay-close\"}").unwrap();
        assert!(env.payload.is_null());
        assert!(env.is_broadcast());
    }

    #[test]
    fn broadcast_detection() {
        let concrete = Envelope::new(MessageKind::ToastShow, json!(null))
            .addressed_to(vec![FrameId::new()]);
        assert!(!concrete.is_broadcast());

        let wildcard = Envelope::new(MessageKind::ToastShow, json!(null))
            .addressed_to(vec![FrameId::wildcard()]);
        assert!(wildcard.is_broadcast());

        let empty = Envelope::new(MessageKind::ToastShow, json!(null));
        assert!(empty.is_broadcast());
    }

    #[test]
    fn correlation_id_reads_payload_id() {
        let env = Envelope::new(MessageKind::ReplyAction, json!({"id": "beefcafe"}));
        assert_eq!(env.correlation_id(), Some("beefcafe"));

        let env = Envelope::new(MessageKind::ReplyAction, json!({}));
        assert_eq!(env.correlation_id(), None);
    }
}
