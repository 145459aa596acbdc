//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// When you see a `ProtocolError`, the problem is in serialization or
/// deserialization — not networking, not room logic.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed. Common causes: malformed JSON, missing
    /// required fields, an unknown `type` tag, or truncated input.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but is invalid at the protocol level.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
