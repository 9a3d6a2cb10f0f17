//! Wire protocol for the morris server.
//!
//! This crate defines the messages that clients and the server exchange:
//!
//! - **Types** ([`Request`], [`Response`], [`GameMove`], board primitives) —
//!   the tagged records that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those records are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! The protocol layer knows nothing about connections, registries, or game
//! rules — it only describes the shape of messages. Every request is a
//! self-describing tagged record sent over a persistent, ordered, reliable
//! byte stream; one record per logical request.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ActionKind, Coordinate, GameMove, NodeState, Phase, Request, Response,
    StoneColor,
};
