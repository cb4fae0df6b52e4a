#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The handle passed to frame registration cannot be routed to:
    /// registering a window as its own child would loop messages forever.
    #[error("invalid frame handle: {0}")]
    InvalidFrame(String),

    /// The content window is already registered under another id. Two ids
    /// for one window would corrupt reply addressing.
    #[error("frame already registered as {0}")]
    DuplicateFrame(String),

    /// A message type string that does not carry the reserved namespace
    /// prefix. Registering a listener for it would never fire.
    #[error("message type outside the {ns} namespace: {got}", ns = crate::envelope::NAMESPACE)]
    NotNamespaced { got: String },

    /// A namespaced message type this build does not know.
    #[error("unknown message kind: {0}")]
    UnknownKind(String),
}
