//! Per-connection request dispatch.
//!
//! Each connection task owns one `ConnectionHandler`. The handler binds an
//! identity on the first successful login and routes every subsequent
//! request exhaustively. Locking follows the house rules: the registry
//! lock first, a game lock second when both are needed, and neither held
//! across an await or a channel send that could block (channel sends are
//! unbounded, so they never do).

use std::sync::Arc;

use morris_auth::CredentialGateway;
use morris_protocol::{Codec, GameMove, Request, Response};
use morris_registry::{IdentityId, OutboundSender};

use crate::dispatch::{send_game_update, send_to};
use crate::server::{EngineFactory, ServerState};

/// Collapsed client-facing failure texts. Deliberately vague: a failed
/// login must not reveal whether the password was wrong or the account is
/// already online elsewhere.
const REGISTER_FAILED: &str = "Registration failed, this name is already taken.";
const LOGIN_FAILED: &str = "Login failed, wrong password or user already logged in.";

pub(crate) struct ConnectionHandler<F: EngineFactory, C: CredentialGateway, G: Codec> {
    conn_id: u64,
    /// Bound on the first successful login, cleared on clean session end.
    identity: Option<IdentityId>,
    outbound: OutboundSender,
    state: Arc<ServerState<F, C, G>>,
}

impl<F, C, G> ConnectionHandler<F, C, G>
where
    F: EngineFactory,
    C: CredentialGateway,
    G: Codec,
{
    pub(crate) fn new(
        conn_id: u64,
        outbound: OutboundSender,
        state: Arc<ServerState<F, C, G>>,
    ) -> Self {
        Self {
            conn_id,
            identity: None,
            outbound,
            state,
        }
    }

    /// Dispatches one request. Returns `true` when the connection should
    /// close.
    pub(crate) async fn handle(&mut self, request: Request) -> bool {
        match request {
            Request::RegisterOrLogin {
                name,
                password,
                register,
            } => {
                self.register_or_login(name, password, register).await;
                false
            }
            Request::ListOpponents { player } => {
                self.list_opponents(&player).await;
                false
            }
            Request::ConnectRequest { player, opponent } => {
                self.connect_request(&player, &opponent).await;
                false
            }
            Request::GameAction { player: _, mv } => {
                // The acting seat comes from the bound identity, never
                // from the wire, so a client can't move for its opponent.
                self.game_action(mv).await;
                false
            }
            Request::Reconnect { player } => {
                self.reconnect(&player).await;
                false
            }
            Request::EndGame { player: _ } => {
                self.end_game().await;
                false
            }
            Request::EndSession { player: _ } => self.end_session().await,
        }
    }

    async fn register_or_login(&mut self, name: String, password: String, register: bool) {
        let failed = |message: &str| Response::LoginResult {
            player: name.clone(),
            success: false,
            message: message.to_string(),
        };
        let failure_text = if register { REGISTER_FAILED } else { LOGIN_FAILED };

        if self.identity.is_some() {
            tracing::warn!(conn_id = self.conn_id, "login attempt on a bound connection");
            send_to(&self.outbound, failed("Already logged in."));
            return;
        }

        if register {
            if let Err(e) = self.state.credentials.create_account(&name, &password).await {
                tracing::debug!(conn_id = self.conn_id, %name, error = %e, "registration failed");
                send_to(&self.outbound, failed(failure_text));
                return;
            }
        }
        if let Err(e) = self.state.credentials.acquire_online_lock(&name, &password).await {
            tracing::debug!(conn_id = self.conn_id, %name, error = %e, "login failed");
            send_to(&self.outbound, failed(failure_text));
            return;
        }

        let handle = {
            let mut registry = self.state.registry.lock().await;
            let id = registry.register_identity(&name, self.outbound.clone());
            // A returning account may still be seated in a game it can
            // reconnect into. A seated identity never enters the waiting
            // pool; this login is just a lobby rebind until it reconnects.
            if registry.find_game_for(id).is_none() {
                registry.enqueue_waiting(id);
            }
            self.identity = Some(id);
            registry.handle_of(id).unwrap_or(name)
        };

        tracing::info!(conn_id = self.conn_id, %handle, "player logged in");
        send_to(
            &self.outbound,
            Response::LoginResult {
                player: handle.clone(),
                success: true,
                message: format!("Welcome, {handle}!"),
            },
        );
    }

    async fn list_opponents(&self, player: &str) {
        let opponents = {
            let registry = self.state.registry.lock().await;
            let id = match registry.resolve(player) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(conn_id = self.conn_id, error = %e, "list from unknown player");
                    return;
                }
            };
            if !registry.is_waiting(id) {
                tracing::warn!(conn_id = self.conn_id, player, "list from a non-waiting player");
                return;
            }
            registry.list_waiting(id)
        };

        send_to(&self.outbound, Response::OpponentList { opponents });
    }

    async fn connect_request(&self, player: &str, opponent: &str) {
        let game = {
            let mut registry = self.state.registry.lock().await;
            let (requester, requested) =
                match (registry.resolve(player), registry.resolve(opponent)) {
                    (Ok(a), Ok(b)) => (a, b),
                    (a, b) => {
                        tracing::warn!(
                            conn_id = self.conn_id,
                            player,
                            opponent,
                            "pair request with unknown identity ({a:?}, {b:?})"
                        );
                        return;
                    }
                };
            if registry.find_game_for(requester).is_some()
                || registry.find_game_for(requested).is_some()
            {
                tracing::warn!(conn_id = self.conn_id, player, opponent, "pair request while in a game");
                return;
            }
            registry.request_pair(requester, requested, || self.state.engines.create())
        };

        if let Some(game) = game {
            let starter = {
                let state = game.lock();
                state.player(state.to_move_seat()).handle.clone()
            };
            send_game_update(&game, &format!("{starter} begins!"));
        }
    }

    async fn game_action(&self, mv: GameMove) {
        let Some(id) = self.identity else {
            tracing::warn!(conn_id = self.conn_id, "game action before login");
            return;
        };
        let game = {
            let registry = self.state.registry.lock().await;
            registry.find_game_for(id)
        };
        let Some(game) = game else {
            tracing::warn!(conn_id = self.conn_id, "game action while not in a game");
            return;
        };

        let message = {
            let mut state = game.lock();
            let seat = match state.seat_of(id) {
                Ok(seat) => seat,
                Err(e) => {
                    tracing::warn!(conn_id = self.conn_id, error = %e, "action from a non-player");
                    return;
                }
            };
            match state.apply(seat, &mv) {
                Ok(()) => format!("{} has moved", state.player(seat).handle),
                // A rejected action is a no-op; both players get the same
                // rejection text with the unchanged state.
                Err(violation) => violation.user_message().to_string(),
            }
        };

        send_game_update(&game, &message);
    }

    async fn reconnect(&mut self, player: &str) {
        let (id, game) = {
            let mut registry = self.state.registry.lock().await;
            let id = match registry.resolve(player) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(conn_id = self.conn_id, player, error = %e, "reconnect for unknown identity");
                    return;
                }
            };
            registry.rebind_channel(id, self.outbound.clone());
            (id, registry.find_game_for(id))
        };

        self.identity = Some(id);
        let Some(game) = game else {
            tracing::debug!(conn_id = self.conn_id, player, "reconnected outside a game");
            return;
        };

        {
            let mut state = game.lock();
            match state.seat_of(id) {
                Ok(seat) => state.rebind_channel(seat, self.outbound.clone()),
                Err(e) => {
                    tracing::warn!(conn_id = self.conn_id, error = %e, "reconnect seat lookup failed");
                    return;
                }
            }
        }

        tracing::info!(conn_id = self.conn_id, player, "player reconnected");
        send_game_update(&game, &format!("Player {player} has reconnected."));
    }

    async fn end_game(&self) {
        let Some(id) = self.identity else {
            tracing::warn!(conn_id = self.conn_id, "end game before login");
            return;
        };

        let (opponent_channel, handle) = {
            let mut registry = self.state.registry.lock().await;
            let Some(game) = registry.find_game_for(id) else {
                tracing::warn!(conn_id = self.conn_id, "end game while not in a game");
                return;
            };
            let (seat, channels) = {
                let state = game.lock();
                match state.seat_of(id) {
                    Ok(seat) => (seat, state.channels()),
                    Err(e) => {
                        tracing::warn!(conn_id = self.conn_id, error = %e, "end game from a non-player");
                        return;
                    }
                }
            };
            registry.end_game(game.id());
            let handle = registry.handle_of(id).unwrap_or_default();
            (channels[1 - seat].clone(), handle)
        };

        tracing::info!(conn_id = self.conn_id, %handle, "game ended by player");
        send_to(
            &opponent_channel,
            Response::EndGameNotice {
                message: format!("Player {handle} has ended the game"),
            },
        );
    }

    /// Returns `true`: the connection closes after a clean session end.
    async fn end_session(&mut self) -> bool {
        let Some(id) = self.identity else {
            tracing::debug!(conn_id = self.conn_id, "session end before login");
            return true;
        };

        let name = {
            let mut registry = self.state.registry.lock().await;
            if registry.find_game_for(id).is_some() {
                tracing::warn!(conn_id = self.conn_id, "session end refused while in a game");
                return false;
            }
            registry.cleanup_identity(id);
            registry.name_of(id)
        };

        if let Some(name) = name {
            if let Err(e) = self.state.credentials.release_online_lock(&name).await {
                tracing::debug!(conn_id = self.conn_id, %name, error = %e, "online-lock release failed");
            }
        }

        // Cleared so teardown doesn't release the lock a second time.
        self.identity = None;
        tracing::info!(conn_id = self.conn_id, "session ended");
        true
    }

    /// Runs once when the connection dies for any reason. The opponent of
    /// an in-game player gets exactly one disconnect notice; nothing here
    /// propagates back to the accept loop.
    pub(crate) async fn teardown(&mut self) {
        let Some(id) = self.identity.take() else {
            return;
        };

        let (notice, name) = {
            let mut registry = self.state.registry.lock().await;
            let notice = registry.find_game_for(id).and_then(|game| {
                let handle = registry.handle_of(id)?;
                let state = game.lock();
                let seat = state.seat_of(id).ok()?;
                Some((state.opponent_of(seat).channel(), handle))
            });
            registry.cleanup_identity(id);
            (notice, registry.name_of(id))
        };

        if let Some((opponent_channel, handle)) = notice {
            tracing::info!(conn_id = self.conn_id, %handle, "player disconnected mid-game");
            send_to(
                &opponent_channel,
                Response::DisconnectNotice { player: handle },
            );
        }

        if let Some(name) = name {
            if let Err(e) = self.state.credentials.release_online_lock(&name).await {
                tracing::debug!(conn_id = self.conn_id, %name, error = %e, "online-lock release failed");
            }
        }
    }
}
