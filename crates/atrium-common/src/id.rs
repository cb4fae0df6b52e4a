use serde::{Deserialize, Serialize};
use std::fmt;

use crate::envelope::WILDCARD;

/// Mint a short correlation id for callback round-trips.
///
/// Eight hex characters is enough for the per-window callback table; the full
/// UUID would just bloat every reply payload.
pub fn new_correlation_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    format!(
        "{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3]
    )
}

/// Opaque id for a registered child frame.
///
/// Assigned once at registration by the parent's `FrameRegistry` and stable
/// for the frame's lifetime in that window. A child never learns its own id;
/// it only ever appears in `to`/`from` routing lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(String);

impl FrameId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The wildcard sentinel used in `to` lists ("all local children").
    pub fn wildcard() -> Self {
        Self(WILDCARD.to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
