pub mod envelope;
pub mod errors;
pub mod id;

pub use envelope::{Envelope, MessageKind, NAMESPACE, WILDCARD};
pub use errors::BusError;
pub use id::{new_correlation_id, FrameId};

pub type Result<T> = std::result::Result<T, BusError>;
