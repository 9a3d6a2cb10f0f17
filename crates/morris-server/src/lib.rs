//! Session-coordination server for networked Nine Men's Morris.
//!
//! This crate is the top layer: it accepts WebSocket connections, runs one
//! handler task per connection, and coordinates logins, matchmaking,
//! in-game actions, reconnection, and teardown through the shared registry.
//! Game rules live behind the [`RulesEngine`](morris_registry::RulesEngine)
//! trait; credentials behind
//! [`CredentialGateway`](morris_auth::CredentialGateway).

mod dispatch;
mod error;
mod handler;
mod net;
mod server;

pub use error::ServerError;
pub use server::{EngineFactory, MorrisServer, MorrisServerBuilder};

/// Commonly used types, re-exported for server embedders.
pub mod prelude {
    pub use crate::{EngineFactory, MorrisServer, MorrisServerBuilder, ServerError};
    pub use morris_auth::{CredentialGateway, MemoryCredentials};
    pub use morris_protocol::{
        ActionKind, Coordinate, GameMove, NodeState, Phase, Request, Response, StoneColor,
    };
    pub use morris_registry::{RuleViolation, RulesEngine};
}
