//! Error types for the protocol layer.
//!
//! Each crate in roomlink defines its own error enum. A `ProtocolError`
//! always means a message or frame was malformed, never that the network
//! misbehaved.

/// Errors that can occur while building, encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A routed message needs at least its tag field.
    #[error("routed message has no fields")]
    EmptyMessage,

    /// An inbound frame could not be split into fields.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Serializing a JSON payload failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The payload field is not the expected JSON.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The message has no payload field to decode.
    #[error("message has no payload field")]
    MissingPayload,
}
