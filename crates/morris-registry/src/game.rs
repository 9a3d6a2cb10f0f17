//! A running game: two seated players plus a rules engine, behind a
//! per-game lock.
//!
//! The [`Game`] lock guards board mutation only. When both the registry
//! lock and a game lock are needed, the registry lock is taken first; a
//! plain `GameAction` takes only the game lock. Neither lock is held
//! across an await point or a socket write.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use morris_protocol::{ActionKind, GameMove, Phase, Response, StoneColor};
use tokio::sync::mpsc;

use crate::{IdentityId, RegistryError, RuleViolation, RulesEngine};

/// The outbound half of a connection: responses pushed here are drained by
/// that connection's single writer task, which serializes all writes to the
/// socket.
pub type OutboundSender = mpsc::UnboundedSender<Response>;

/// A unique identifier for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// One seat of a game.
///
/// Everything here is fixed at pairing time except the channel, which is
/// swapped on reconnect. The player is dropped with the game, so no stale
/// seat state survives into the next game.
pub struct Player {
    pub identity: IdentityId,
    pub handle: String,
    pub color: StoneColor,
    channel: OutboundSender,
}

impl Player {
    pub fn new(
        identity: IdentityId,
        handle: String,
        color: StoneColor,
        channel: OutboundSender,
    ) -> Self {
        Self {
            identity,
            handle,
            color,
            channel,
        }
    }

    pub fn channel(&self) -> OutboundSender {
        self.channel.clone()
    }
}

/// The lock-guarded interior of a [`Game`].
pub struct GameState<E> {
    players: [Player; 2],
    engine: E,
}

impl<E: RulesEngine> GameState<E> {
    /// Returns the seat index (0 or 1) of an identity.
    ///
    /// # Errors
    /// [`RegistryError::IllegalPlayer`] when the identity holds no seat.
    pub fn seat_of(&self, identity: IdentityId) -> Result<usize, RegistryError> {
        self.players
            .iter()
            .position(|p| p.identity == identity)
            .ok_or(RegistryError::IllegalPlayer)
    }

    pub fn player(&self, seat: usize) -> &Player {
        &self.players[seat]
    }

    pub fn opponent_of(&self, seat: usize) -> &Player {
        &self.players[1 - seat]
    }

    /// Forwards a move to the rules engine on behalf of a seat.
    ///
    /// A rejected move leaves the engine untouched, so callers can compose
    /// an update from the unchanged state afterwards.
    pub fn apply(&mut self, seat: usize, mv: &GameMove) -> Result<(), RuleViolation> {
        let color = self.players[seat].color;
        match *mv {
            GameMove::Place { at } => self.engine.place_stone(color, at),
            GameMove::Move { from, to } => self.engine.move_stone(color, from, to),
            GameMove::Take { at } => self.engine.take_stone(color, at),
        }
    }

    /// The action the game expects next: a capture when a mill is pending,
    /// otherwise placing or moving per the mover's phase. Pure derivation
    /// from engine reads.
    pub fn next_action(&self) -> ActionKind {
        if self.engine.pending_capture() {
            return ActionKind::Take;
        }
        match self.engine.phase_of(self.engine.next_to_move()) {
            Phase::Placing => ActionKind::Place,
            Phase::Moving => ActionKind::Move,
        }
    }

    /// The seat whose turn it is.
    pub fn to_move_seat(&self) -> usize {
        if self.players[0].color == self.engine.next_to_move() {
            0
        } else {
            1
        }
    }

    /// Builds the shared state payload. Both seats receive the identical
    /// payload; clients derive "my turn" by comparing `to_move` with their
    /// own handle.
    pub fn compose_update(&self, message: &str) -> Response {
        let mover = self.to_move_seat();
        Response::GameUpdate {
            message: message.to_string(),
            next_action: self.next_action(),
            to_move: self.players[mover].handle.clone(),
            opponent: self.players[1 - mover].handle.clone(),
            board: self.engine.snapshot(),
        }
    }

    /// Both seats' output channels, in seat order.
    pub fn channels(&self) -> [OutboundSender; 2] {
        [self.players[0].channel(), self.players[1].channel()]
    }

    /// Both seats' identities with their handles, in seat order.
    pub fn identities(&self) -> [(IdentityId, String); 2] {
        [
            (self.players[0].identity, self.players[0].handle.clone()),
            (self.players[1].identity, self.players[1].handle.clone()),
        ]
    }

    /// Re-attaches a seat to a new connection.
    pub fn rebind_channel(&mut self, seat: usize, channel: OutboundSender) {
        self.players[seat].channel = channel;
    }
}

/// A game in the active set.
pub struct Game<E> {
    id: GameId,
    state: Mutex<GameState<E>>,
}

impl<E: RulesEngine> Game<E> {
    pub fn new(id: GameId, players: [Player; 2], engine: E) -> Self {
        Self {
            id,
            state: Mutex::new(GameState { players, engine }),
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    /// Takes the per-game lock. A poisoned lock is recovered, not
    /// propagated: the state itself never holds partial mutations, since a
    /// rejected engine call is a no-op.
    pub fn lock(&self) -> MutexGuard<'_, GameState<E>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether an identity holds a seat in this game.
    pub fn has_player(&self, identity: IdentityId) -> bool {
        self.lock().seat_of(identity).is_ok()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use morris_protocol::{Coordinate, NodeState};

    /// Scripted engine: fixed mover/phase/board, records nothing.
    struct FixedEngine {
        to_move: StoneColor,
        phase: Phase,
        capture: bool,
    }

    impl RulesEngine for FixedEngine {
        fn place_stone(&mut self, _: StoneColor, _: Coordinate) -> Result<(), RuleViolation> {
            Ok(())
        }
        fn move_stone(
            &mut self,
            _: StoneColor,
            _: Coordinate,
            _: Coordinate,
        ) -> Result<(), RuleViolation> {
            Err(RuleViolation::IllegalMove)
        }
        fn take_stone(&mut self, _: StoneColor, _: Coordinate) -> Result<(), RuleViolation> {
            Ok(())
        }
        fn next_to_move(&self) -> StoneColor {
            self.to_move
        }
        fn pending_capture(&self) -> bool {
            self.capture
        }
        fn phase_of(&self, _: StoneColor) -> Phase {
            self.phase
        }
        fn snapshot(&self) -> Vec<NodeState> {
            vec![NodeState::Empty; 4]
        }
    }

    fn game(engine: FixedEngine) -> Game<FixedEngine> {
        let tx = || tokio::sync::mpsc::unbounded_channel().0;
        let white = Player::new(IdentityId(1), "alice".into(), StoneColor::White, tx());
        let black = Player::new(IdentityId(2), "bob".into(), StoneColor::Black, tx());
        Game::new(GameId(1), [white, black], engine)
    }

    #[test]
    fn test_next_action_is_take_when_capture_pending() {
        let g = game(FixedEngine {
            to_move: StoneColor::White,
            phase: Phase::Placing,
            capture: true,
        });

        assert_eq!(g.lock().next_action(), ActionKind::Take);
    }

    #[test]
    fn test_next_action_follows_mover_phase() {
        let placing = game(FixedEngine {
            to_move: StoneColor::White,
            phase: Phase::Placing,
            capture: false,
        });
        let moving = game(FixedEngine {
            to_move: StoneColor::Black,
            phase: Phase::Moving,
            capture: false,
        });

        assert_eq!(placing.lock().next_action(), ActionKind::Place);
        assert_eq!(moving.lock().next_action(), ActionKind::Move);
    }

    #[test]
    fn test_to_move_seat_matches_engine_color() {
        let g = game(FixedEngine {
            to_move: StoneColor::Black,
            phase: Phase::Placing,
            capture: false,
        });

        // Seat 1 is black in the fixture.
        assert_eq!(g.lock().to_move_seat(), 1);
    }

    #[test]
    fn test_compose_update_names_mover_and_opponent() {
        let g = game(FixedEngine {
            to_move: StoneColor::White,
            phase: Phase::Placing,
            capture: false,
        });

        let update = g.lock().compose_update("alice begins!");

        match update {
            Response::GameUpdate {
                message,
                to_move,
                opponent,
                next_action,
                board,
            } => {
                assert_eq!(message, "alice begins!");
                assert_eq!(to_move, "alice");
                assert_eq!(opponent, "bob");
                assert_eq!(next_action, ActionKind::Place);
                assert_eq!(board.len(), 4);
            }
            other => panic!("expected GameUpdate, got {other:?}"),
        }
    }

    #[test]
    fn test_seat_of_rejects_outsider() {
        let g = game(FixedEngine {
            to_move: StoneColor::White,
            phase: Phase::Placing,
            capture: false,
        });

        assert!(g.lock().seat_of(IdentityId(1)).is_ok());
        assert!(matches!(
            g.lock().seat_of(IdentityId(99)),
            Err(RegistryError::IllegalPlayer)
        ));
    }

    #[test]
    fn test_rebind_channel_swaps_only_that_seat() {
        let g = game(FixedEngine {
            to_move: StoneColor::White,
            phase: Phase::Placing,
            capture: false,
        });
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        g.lock().rebind_channel(0, tx);

        let [seat0, seat1] = g.lock().channels();
        seat0
            .send(Response::EndGameNotice { message: "x".into() })
            .unwrap();
        assert!(rx.try_recv().is_ok());
        // Seat 1's original receiver was dropped in the fixture, so its
        // channel is closed — proof it wasn't replaced.
        assert!(seat1
            .send(Response::EndGameNotice { message: "y".into() })
            .is_err());
    }

    #[test]
    fn test_apply_maps_move_kinds_to_engine_calls() {
        let g = game(FixedEngine {
            to_move: StoneColor::White,
            phase: Phase::Placing,
            capture: false,
        });
        let mut state = g.lock();

        assert!(state.apply(0, &GameMove::Place { at: Coordinate(3) }).is_ok());
        assert_eq!(
            state.apply(
                0,
                &GameMove::Move {
                    from: Coordinate(3),
                    to: Coordinate(4)
                }
            ),
            Err(RuleViolation::IllegalMove)
        );
    }
}
