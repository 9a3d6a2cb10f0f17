//! Codec trait and implementations for serializing messages.
//!
//! The rest of the server doesn't care how requests and responses become
//! bytes — it only needs something implementing [`Codec`]. [`JsonCodec`]
//! is the default; a binary codec can be swapped in without touching any
//! other layer.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust types to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because the codec is shared across every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed,
    /// truncated, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Human-readable, which makes the wire traffic easy to inspect during
/// development. Behind the `json` feature flag (enabled by default).
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Request, Response};

    #[test]
    fn test_json_codec_round_trips_requests() {
        let codec = JsonCodec;
        let req = Request::ListOpponents {
            player: "alice".into(),
        };

        let bytes = codec.encode(&req).unwrap();
        let decoded: Request = codec.decode(&bytes).unwrap();

        assert_eq!(req, decoded);
    }

    #[test]
    fn test_json_codec_round_trips_responses() {
        let codec = JsonCodec;
        let resp = Response::OpponentList {
            opponents: vec!["bob".into(), "carol".into()],
        };

        let bytes = codec.encode(&resp).unwrap();
        let decoded: Response = codec.decode(&bytes).unwrap();

        assert_eq!(resp, decoded);
    }

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let codec = JsonCodec;
        let result: Result<Request, _> = codec.decode(b"\xff\xfe");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
