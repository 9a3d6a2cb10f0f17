//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire messages.
///
/// A `Decode` failure on an incoming frame means the message was
/// unreadable or unrecognized; the connection handler logs it and closes
/// the connection rather than guessing at intent.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown tag, or missing
    /// fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
