//! Unified error type for the server crate.

use morris_auth::CredentialError;
use morris_protocol::ProtocolError;
use morris_registry::RegistryError;

/// Top-level error wrapping the per-layer errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors automatically,
/// so the handler and server loops deal with one type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// An encode/decode failure on the wire.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An identity or game lookup failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A credential-gateway failure.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// A transport-level failure (bind, accept, socket I/O).
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// A WebSocket-level failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
