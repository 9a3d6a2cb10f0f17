//! The session registry: waiting pool, active games, and the pairing
//! handshake.
//!
//! The registry is not internally locked. The server keeps the whole thing
//! behind one coordinating `tokio::sync::Mutex`, which makes every method
//! here a single atomic compound operation as seen by other connections.
//! Invariants maintained across all operations:
//!
//! - an identity is never both waiting and seated in a game,
//! - an identity is seated in at most one active game,
//! - an identity seated in a game has no pending pair request,
//! - a game exists only when both identities requested each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use morris_protocol::StoneColor;
use rand::Rng;

use crate::{
    Game, GameId, IdentityId, IdentityRegistry, OutboundSender, Player, RegistryError,
    RulesEngine,
};

static NEXT_GAME_ID: AtomicU64 = AtomicU64::new(1);

/// Shared session state for all connections.
pub struct Registry<E> {
    identities: IdentityRegistry,
    /// Identities available for pairing, in arrival order.
    waiting: Vec<IdentityId>,
    active: HashMap<GameId, Arc<Game<E>>>,
    /// One outstanding pair request per requester: requester -> requested.
    pending_pairs: HashMap<IdentityId, IdentityId>,
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self {
            identities: IdentityRegistry::new(),
            waiting: Vec::new(),
            active: HashMap::new(),
            pending_pairs: HashMap::new(),
        }
    }
}

impl<E: RulesEngine> Registry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    // -- identity passthrough ------------------------------------------------

    pub fn register_identity(&mut self, name: &str, channel: OutboundSender) -> IdentityId {
        self.identities.register(name, channel)
    }

    pub fn resolve(&self, handle: &str) -> Result<IdentityId, RegistryError> {
        self.identities.resolve(handle)
    }

    pub fn handle_of(&self, id: IdentityId) -> Option<String> {
        self.identities.handle_of(id)
    }

    pub fn name_of(&self, id: IdentityId) -> Option<String> {
        self.identities.name_of(id)
    }

    /// Re-attaches an identity's lobby channel to a new connection.
    /// In-game channels are rebound on the game itself.
    pub fn rebind_channel(&mut self, id: IdentityId, channel: OutboundSender) {
        self.identities.rebind_channel(id, channel);
    }

    pub fn channel_of(&self, id: IdentityId) -> Option<OutboundSender> {
        self.identities.get(id).map(|i| i.channel())
    }

    // -- waiting pool --------------------------------------------------------

    /// Adds an identity to the waiting pool. No-op if already waiting.
    pub fn enqueue_waiting(&mut self, id: IdentityId) {
        if !self.waiting.contains(&id) {
            self.waiting.push(id);
        }
    }

    pub fn dequeue_waiting(&mut self, id: IdentityId) {
        self.waiting.retain(|w| *w != id);
    }

    pub fn is_waiting(&self, id: IdentityId) -> bool {
        self.waiting.contains(&id)
    }

    /// Handles of the waiting identities, minus the asking one.
    pub fn list_waiting(&self, excluding: IdentityId) -> Vec<String> {
        self.waiting
            .iter()
            .filter(|id| **id != excluding)
            .filter_map(|id| self.identities.handle_of(*id))
            .collect()
    }

    // -- active games --------------------------------------------------------

    /// Finds the game an identity is seated in.
    ///
    /// A seat in more than one game means an invariant broke; that is
    /// logged and treated as not seated at all.
    pub fn find_game_for(&self, id: IdentityId) -> Option<Arc<Game<E>>> {
        let mut found = self.active.values().filter(|g| g.has_player(id));
        let first = found.next()?;
        if found.next().is_some() {
            tracing::warn!(identity = %id, "identity seated in more than one game");
            return None;
        }
        Some(Arc::clone(first))
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    // -- pairing handshake ---------------------------------------------------

    /// One half of the two-phase pairing handshake.
    ///
    /// When the reverse request already exists, both pending entries are
    /// cleared, both identities leave the waiting pool, colors are assigned
    /// uniformly at random, and the new game (with a fresh engine from
    /// `make_engine`) is returned. Otherwise the request is recorded and
    /// `None` returned; re-requesting just overwrites the previous target.
    pub fn request_pair(
        &mut self,
        requester: IdentityId,
        requested: IdentityId,
        make_engine: impl FnOnce() -> E,
    ) -> Option<Arc<Game<E>>> {
        if self.pending_pairs.get(&requested) != Some(&requester) {
            self.pending_pairs.insert(requester, requested);
            tracing::debug!(%requester, %requested, "pair requested, awaiting consent");
            return None;
        }

        self.pending_pairs.remove(&requested);
        self.pending_pairs.remove(&requester);
        self.dequeue_waiting(requester);
        self.dequeue_waiting(requested);

        let (white, black) = if rand::rng().random_bool(0.5) {
            (requester, requested)
        } else {
            (requested, requester)
        };
        let seat = |id: IdentityId, color: StoneColor| {
            let identity = self.identities.get(id)?;
            Some(Player::new(id, identity.handle(), color, identity.channel()))
        };
        let players = [seat(white, StoneColor::White)?, seat(black, StoneColor::Black)?];

        let game_id = GameId(NEXT_GAME_ID.fetch_add(1, Ordering::Relaxed));
        let game = Arc::new(Game::new(game_id, players, make_engine()));
        self.active.insert(game_id, Arc::clone(&game));
        tracing::info!(%game_id, %requester, %requested, "game created");
        Some(game)
    }

    /// Removes a finished game and returns both identities (with handles)
    /// to the waiting pool. The dropped players carry any per-game state
    /// away with them.
    pub fn end_game(&mut self, game_id: GameId) -> Option<[(IdentityId, String); 2]> {
        let game = self.active.remove(&game_id)?;
        let seats = game.lock().identities();
        for (id, _) in &seats {
            self.enqueue_waiting(*id);
        }
        tracing::info!(%game_id, "game ended");
        Some(seats)
    }

    /// Removes every lobby trace of an identity: its waiting slot, its own
    /// pending request, and any pending request targeting it. Active games
    /// are left alone so the identity can reconnect into them.
    pub fn cleanup_identity(&mut self, id: IdentityId) {
        self.dequeue_waiting(id);
        self.pending_pairs.remove(&id);
        self.pending_pairs.retain(|_, target| *target != id);
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use morris_protocol::{Coordinate, NodeState, Phase, Response};
    use tokio::sync::mpsc;

    use crate::RuleViolation;

    /// Scripted test double: answers every mutation per a fixed script and
    /// keeps a call count so no-op behavior can be asserted.
    struct StubEngine {
        to_move: StoneColor,
        reject: Option<RuleViolation>,
        board: Vec<NodeState>,
        calls: usize,
    }

    impl StubEngine {
        fn new() -> Self {
            Self {
                to_move: StoneColor::White,
                reject: None,
                board: vec![NodeState::Empty; 24],
                calls: 0,
            }
        }

        fn rejecting(violation: RuleViolation) -> Self {
            Self {
                reject: Some(violation),
                ..Self::new()
            }
        }

        fn answer(&mut self, at: Coordinate) -> Result<(), RuleViolation> {
            self.calls += 1;
            if let Some(v) = self.reject {
                return Err(v);
            }
            self.board[at.0 as usize] = NodeState::Stone(self.to_move);
            self.to_move = self.to_move.opponent();
            Ok(())
        }
    }

    impl RulesEngine for StubEngine {
        fn place_stone(&mut self, _: StoneColor, at: Coordinate) -> Result<(), RuleViolation> {
            self.answer(at)
        }
        fn move_stone(
            &mut self,
            _: StoneColor,
            _: Coordinate,
            to: Coordinate,
        ) -> Result<(), RuleViolation> {
            self.answer(to)
        }
        fn take_stone(&mut self, _: StoneColor, at: Coordinate) -> Result<(), RuleViolation> {
            self.answer(at)
        }
        fn next_to_move(&self) -> StoneColor {
            self.to_move
        }
        fn pending_capture(&self) -> bool {
            false
        }
        fn phase_of(&self, _: StoneColor) -> Phase {
            Phase::Placing
        }
        fn snapshot(&self) -> Vec<NodeState> {
            self.board.clone()
        }
    }

    fn channel() -> OutboundSender {
        mpsc::unbounded_channel().0
    }

    fn registry_with(names: &[&str]) -> (Registry<StubEngine>, Vec<IdentityId>) {
        let mut reg = Registry::new();
        let ids = names
            .iter()
            .map(|n| {
                let id = reg.register_identity(n, channel());
                reg.enqueue_waiting(id);
                id
            })
            .collect();
        (reg, ids)
    }

    fn pair(
        reg: &mut Registry<StubEngine>,
        a: IdentityId,
        b: IdentityId,
    ) -> Arc<Game<StubEngine>> {
        assert!(reg.request_pair(a, b, StubEngine::new).is_none());
        reg.request_pair(b, a, StubEngine::new)
            .expect("reciprocal request must create the game")
    }

    #[test]
    fn test_one_sided_request_creates_no_game() {
        let (mut reg, ids) = registry_with(&["alice", "bob"]);

        let game = reg.request_pair(ids[0], ids[1], StubEngine::new);

        assert!(game.is_none());
        assert_eq!(reg.active_count(), 0);
        // Both still listable while the request is pending.
        assert!(reg.is_waiting(ids[0]));
        assert!(reg.is_waiting(ids[1]));
    }

    #[test]
    fn test_reciprocal_request_creates_exactly_one_game() {
        let (mut reg, ids) = registry_with(&["alice", "bob"]);

        let game = pair(&mut reg, ids[0], ids[1]);

        assert_eq!(reg.active_count(), 1);
        assert!(game.has_player(ids[0]));
        assert!(game.has_player(ids[1]));
        // Pending entries are gone: a fresh one-sided request from either
        // side must not instantly create a second game.
        assert!(reg.request_pair(ids[0], ids[1], StubEngine::new).is_none());
    }

    #[test]
    fn test_paired_identities_leave_waiting_pool() {
        // Partition invariant: seated players are never also waiting.
        let (mut reg, ids) = registry_with(&["alice", "bob", "carol"]);

        pair(&mut reg, ids[0], ids[1]);

        assert!(!reg.is_waiting(ids[0]));
        assert!(!reg.is_waiting(ids[1]));
        assert!(reg.is_waiting(ids[2]));
        assert_eq!(reg.list_waiting(ids[2]), Vec::<String>::new());
    }

    #[test]
    fn test_re_request_overwrites_previous_target() {
        let (mut reg, ids) = registry_with(&["alice", "bob", "carol"]);

        // Alice first wants bob, then changes her mind to carol. Bob's
        // later consent to the stale request must not create a game.
        assert!(reg.request_pair(ids[0], ids[1], StubEngine::new).is_none());
        assert!(reg.request_pair(ids[0], ids[2], StubEngine::new).is_none());

        assert!(reg.request_pair(ids[1], ids[0], StubEngine::new).is_none());
        // Carol's consent matches the live request.
        assert!(reg.request_pair(ids[2], ids[0], StubEngine::new).is_some());
    }

    #[test]
    fn test_request_pair_is_idempotent() {
        let (mut reg, ids) = registry_with(&["alice", "bob"]);

        assert!(reg.request_pair(ids[0], ids[1], StubEngine::new).is_none());
        assert!(reg.request_pair(ids[0], ids[1], StubEngine::new).is_none());

        assert!(reg.request_pair(ids[1], ids[0], StubEngine::new).is_some());
        assert_eq!(reg.active_count(), 1);
    }

    #[test]
    fn test_color_assignment_is_roughly_uniform() {
        let mut requester_white = 0u32;
        for _ in 0..1000 {
            let (mut reg, ids) = registry_with(&["alice", "bob"]);
            let game = pair(&mut reg, ids[0], ids[1]);
            let state = game.lock();
            let seat = state.seat_of(ids[0]).unwrap();
            if state.player(seat).color == StoneColor::White {
                requester_white += 1;
            }
        }

        // Binomial(1000, 0.5): outside 400..600 is astronomically unlikely.
        assert!(
            (400..=600).contains(&requester_white),
            "requester drew white {requester_white}/1000 times"
        );
    }

    #[test]
    fn test_colors_are_complementary() {
        let (mut reg, ids) = registry_with(&["alice", "bob"]);
        let game = pair(&mut reg, ids[0], ids[1]);

        let state = game.lock();
        assert_eq!(state.player(0).color, state.player(1).color.opponent());
    }

    #[test]
    fn test_find_game_for_seated_and_unseated() {
        let (mut reg, ids) = registry_with(&["alice", "bob", "carol"]);
        let game = pair(&mut reg, ids[0], ids[1]);

        assert_eq!(reg.find_game_for(ids[0]).unwrap().id(), game.id());
        assert_eq!(reg.find_game_for(ids[1]).unwrap().id(), game.id());
        assert!(reg.find_game_for(ids[2]).is_none());
    }

    #[test]
    fn test_end_game_returns_both_to_waiting() {
        let (mut reg, ids) = registry_with(&["alice", "bob"]);
        let game = pair(&mut reg, ids[0], ids[1]);

        let seats = reg.end_game(game.id()).unwrap();

        assert_eq!(reg.active_count(), 0);
        assert!(reg.is_waiting(ids[0]));
        assert!(reg.is_waiting(ids[1]));
        assert!(seats.iter().any(|(_, h)| h == "alice"));
        assert!(seats.iter().any(|(_, h)| h == "bob"));
    }

    #[test]
    fn test_end_game_unknown_id_is_none() {
        let (mut reg, _) = registry_with(&["alice"]);
        assert!(reg.end_game(GameId(9999)).is_none());
    }

    #[test]
    fn test_cleanup_removes_pending_in_both_directions() {
        let (mut reg, ids) = registry_with(&["alice", "bob", "carol"]);
        assert!(reg.request_pair(ids[0], ids[1], StubEngine::new).is_none());
        assert!(reg.request_pair(ids[2], ids[0], StubEngine::new).is_none());

        reg.cleanup_identity(ids[0]);

        // Neither alice's own request nor carol's request targeting alice
        // survives: bob's consent and a fresh carol->alice consent can't
        // pair against a gone player.
        assert!(reg.request_pair(ids[1], ids[0], StubEngine::new).is_none());
        assert!(!reg.is_waiting(ids[0]));
        assert!(reg.is_waiting(ids[1]));
        assert!(reg.is_waiting(ids[2]));
    }

    #[test]
    fn test_cleanup_leaves_active_game_for_reconnect() {
        let (mut reg, ids) = registry_with(&["alice", "bob"]);
        let game = pair(&mut reg, ids[0], ids[1]);

        reg.cleanup_identity(ids[0]);

        assert_eq!(reg.find_game_for(ids[0]).unwrap().id(), game.id());
    }

    #[test]
    fn test_list_waiting_excludes_caller() {
        let (reg, ids) = registry_with(&["alice", "bob", "carol"]);

        let listed = reg.list_waiting(ids[0]);

        assert_eq!(listed, vec!["bob".to_string(), "carol".to_string()]);
    }

    #[test]
    fn test_enqueue_waiting_deduplicates() {
        let (mut reg, ids) = registry_with(&["alice"]);

        reg.enqueue_waiting(ids[0]);
        reg.enqueue_waiting(ids[0]);

        assert_eq!(reg.list_waiting(IdentityId(0)).len(), 1);
    }

    #[test]
    fn test_rejected_action_leaves_state_untouched() {
        let (mut reg, ids) = registry_with(&["alice", "bob"]);
        assert!(reg
            .request_pair(ids[0], ids[1], || StubEngine::rejecting(
                RuleViolation::IllegalPlayer
            ))
            .is_none());
        let game = reg
            .request_pair(ids[1], ids[0], || {
                StubEngine::rejecting(RuleViolation::IllegalPlayer)
            })
            .unwrap();

        let mut state = game.lock();
        let before = state.compose_update("");
        let seat = state.seat_of(ids[0]).unwrap();
        let result = state.apply(
            seat,
            &morris_protocol::GameMove::Place { at: Coordinate(0) },
        );

        assert_eq!(result, Err(RuleViolation::IllegalPlayer));
        assert_eq!(state.compose_update(""), before);
    }

    #[test]
    fn test_accepted_action_advances_turn() {
        let (mut reg, ids) = registry_with(&["alice", "bob"]);
        let game = pair(&mut reg, ids[0], ids[1]);

        let mut state = game.lock();
        let mover = state.to_move_seat();
        state
            .apply(mover, &morris_protocol::GameMove::Place { at: Coordinate(5) })
            .unwrap();

        assert_eq!(state.to_move_seat(), 1 - mover);
        match state.compose_update("") {
            Response::GameUpdate { board, .. } => {
                assert_ne!(board[5], NodeState::Empty);
            }
            other => panic!("expected GameUpdate, got {other:?}"),
        }
    }

    #[test]
    fn test_channel_of_reaches_lobby_connection() {
        let mut reg: Registry<StubEngine> = Registry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = reg.register_identity("alice", tx);

        reg.channel_of(id)
            .unwrap()
            .send(Response::EndGameNotice { message: "x".into() })
            .unwrap();

        assert!(rx.try_recv().is_ok());
    }
}
