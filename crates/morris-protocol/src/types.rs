//! Core wire types for the morris protocol.
//!
//! Identity fields on the wire are plain handle strings: a client echoes
//! back the handle it was given at login, and the server resolves it to the
//! canonical identity it tracks. Live attachments (output channels) never
//! cross the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Board primitives
// ---------------------------------------------------------------------------

/// The color of a player's stones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoneColor {
    White,
    Black,
}

impl StoneColor {
    /// Returns the other color.
    pub fn opponent(self) -> StoneColor {
        match self {
            StoneColor::White => StoneColor::Black,
            StoneColor::Black => StoneColor::White,
        }
    }
}

impl fmt::Display for StoneColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoneColor::White => write!(f, "White"),
            StoneColor::Black => write!(f, "Black"),
        }
    }
}

/// A player's sub-state within the rules engine: still placing stones from
/// hand, or moving stones already on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Placing,
    Moving,
}

/// The contents of a single board node.
///
/// A full board snapshot is a `Vec<NodeState>` in the node order defined by
/// the rules engine. Both players always receive the same snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Empty,
    Stone(StoneColor),
}

/// A board-node index.
///
/// Newtype over the raw index so a coordinate can't be confused with other
/// numeric fields. Which indices are valid (and adjacent) is the rules
/// engine's business, not the protocol's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coordinate(pub u8);

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Game actions
// ---------------------------------------------------------------------------

/// The kind of action the game expects next.
///
/// Sent in every [`Response::GameUpdate`] so clients know what input to
/// solicit: `Take` when a formed mill mandates a capture, otherwise `Place`
/// or `Move` depending on the mover's [`Phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Place,
    Move,
    Take,
}

/// A typed in-game action.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, so a placement
/// looks like `{ "type": "Place", "at": 4 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameMove {
    /// Place a stone from hand onto an empty node.
    Place { at: Coordinate },
    /// Move a stone already on the board.
    Move { from: Coordinate, to: Coordinate },
    /// Remove an opposing stone after forming a mill.
    Take { at: Coordinate },
}

// ---------------------------------------------------------------------------
// Requests (client → server)
// ---------------------------------------------------------------------------

/// A client request. One per logical operation, matched exhaustively by the
/// connection handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Create an account and/or log in. With `register: true` the account
    /// is created first; either way an online lock is acquired.
    RegisterOrLogin {
        name: String,
        password: String,
        register: bool,
    },

    /// Ask for the identities currently waiting for a game (minus the
    /// caller).
    ListOpponents { player: String },

    /// One half of the mutual-consent pairing handshake: "I want to play
    /// `opponent`". A game starts only once both directions exist.
    ConnectRequest { player: String, opponent: String },

    /// An in-game action, forwarded to the rules engine.
    GameAction { player: String, mv: GameMove },

    /// Re-attach this connection to a game the identity is still part of.
    Reconnect { player: String },

    /// End the caller's current game; both players return to the lobby.
    EndGame { player: String },

    /// Leave the server entirely. Refused while still in a game.
    EndSession { player: String },
}

// ---------------------------------------------------------------------------
// Responses (server → client)
// ---------------------------------------------------------------------------

/// A server response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Outcome of a `RegisterOrLogin`. On failure `message` is a single
    /// collapsed text per action kind — it does not reveal whether the
    /// password was wrong or the account already online.
    LoginResult {
        player: String,
        success: bool,
        message: String,
    },

    /// The waiting identities, excluding the asking player.
    OpponentList { opponents: Vec<String> },

    /// A full, turn-aware game state. Both players of a game receive the
    /// *same* payload; "is it my turn" is derived client-side by comparing
    /// `to_move` against the client's own handle.
    GameUpdate {
        message: String,
        next_action: ActionKind,
        to_move: String,
        opponent: String,
        board: Vec<NodeState>,
    },

    /// The named player's connection died while in a game.
    DisconnectNotice { player: String },

    /// The caller's opponent ended the game.
    EndGameNotice { message: String },
}

// =========================================================================
// Tests
// =========================================================================
