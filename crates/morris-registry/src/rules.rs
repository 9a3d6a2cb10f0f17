//! The rules-engine gateway — the narrow interface through which all board
//! mutation happens.
//!
//! The server does not know the rules of Nine Men's Morris. It forwards
//! place/move/take operations to a [`RulesEngine`] and derives the "what
//! happens next" view ([`GameState::next_action`](crate::GameState)) from
//! the engine's pure reads. An engine crate (or a test double) implements
//! this trait; nothing else in the workspace contains rule logic.

use morris_protocol::{Coordinate, NodeState, Phase, StoneColor};

/// One game's board and turn logic.
///
/// Mutating operations either succeed (board and turn state updated) or
/// fail with a [`RuleViolation`] and leave the engine untouched — a
/// rejected action must be a complete no-op.
pub trait RulesEngine: Send + 'static {
    /// Places a stone from hand. Fails with `InvalidPhase` outside the
    /// placing phase, `IllegalPlayer` out of turn, `IllegalMove` for an
    /// occupied or invalid node.
    fn place_stone(
        &mut self,
        color: StoneColor,
        at: Coordinate,
    ) -> Result<(), RuleViolation>;

    /// Moves a stone already on the board.
    fn move_stone(
        &mut self,
        color: StoneColor,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<(), RuleViolation>;

    /// Removes an opposing stone after a mill.
    fn take_stone(
        &mut self,
        color: StoneColor,
        at: Coordinate,
    ) -> Result<(), RuleViolation>;

    /// Whose turn it is. Pure read.
    fn next_to_move(&self) -> StoneColor;

    /// Whether a formed mill still awaits its capture. Pure read.
    fn pending_capture(&self) -> bool;

    /// The given color's current phase. Pure read.
    fn phase_of(&self, color: StoneColor) -> Phase;

    /// The full board, in engine-defined node order. Pure read.
    fn snapshot(&self) -> Vec<NodeState>;
}

/// Why the rules engine rejected an operation.
///
/// Each kind maps to one fixed client-facing message; the registry and
/// handler never invent rule-specific text of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    /// The action doesn't fit the acting player's current phase.
    #[error("invalid phase")]
    InvalidPhase,

    /// It isn't the acting player's turn.
    #[error("illegal player")]
    IllegalPlayer,

    /// The source or destination node is not allowed.
    #[error("illegal move")]
    IllegalMove,
}

impl RuleViolation {
    /// The fixed message shown to the requesting player.
    pub fn user_message(self) -> &'static str {
        match self {
            RuleViolation::InvalidPhase => {
                "You are not allowed to perform this action in your current game phase"
            }
            RuleViolation::IllegalPlayer => "It is not your turn to move",
            RuleViolation::IllegalMove => {
                "You are not allowed to move to/from this position"
            }
        }
    }
}
