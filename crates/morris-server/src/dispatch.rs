//! Response dispatch: fanning state out to both players of a game.
//!
//! Delivery is best-effort. A dead channel means that player's connection
//! is gone; the failure is logged and surfaces as a disconnect on their
//! next interaction, never as an error for whoever triggered the send.

use morris_protocol::Response;
use morris_registry::{Game, OutboundSender, RulesEngine};

/// Pushes the identical game-state payload to both players.
///
/// The game lock is held only to compose the payload and clone the
/// channels; the sends happen after it is released.
pub(crate) fn send_game_update<E: RulesEngine>(game: &Game<E>, message: &str) {
    let (update, channels) = {
        let state = game.lock();
        (state.compose_update(message), state.channels())
    };
    for channel in channels {
        send_to(&channel, update.clone());
    }
}

/// Best-effort single delivery.
pub(crate) fn send_to(channel: &OutboundSender, response: Response) {
    if channel.send(response).is_err() {
        tracing::debug!("response dropped, receiving connection is gone");
    }
}
