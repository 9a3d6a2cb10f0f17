//! Shared session state for the morris server.
//!
//! This crate holds everything the connection handlers mutate concurrently:
//!
//! 1. **Identity registry** — canonical, live-attached player identities
//!    ([`IdentityRegistry`]).
//! 2. **Session registry** — the waiting pool, active games, and pending
//!    pair requests, with the compound operations that must be atomic
//!    ([`Registry`]).
//! 3. **Games** — two players plus a board owned by an external rules
//!    engine, behind a per-game lock ([`Game`], [`RulesEngine`]).
//!
//! # Locking discipline
//!
//! The [`Registry`] is *not* internally locked — the server wraps the whole
//! thing in one coordinating mutex, so every registry method is a single
//! atomic compound operation from the point of view of other connections.
//! Each [`Game`] carries its own lock for board mutation. Lock order is
//! strict: registry first, then game, never the reverse. Neither lock is
//! ever held across a socket write.

mod error;
mod game;
mod identity;
mod registry;
mod rules;

pub use error::RegistryError;
pub use game::{Game, GameId, GameState, OutboundSender, Player};
pub use identity::{Identity, IdentityId, IdentityRegistry};
pub use registry::Registry;
pub use rules::{RuleViolation, RulesEngine};
