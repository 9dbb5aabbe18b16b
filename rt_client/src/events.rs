//! Event callbacks fired as the connection's receive loop processes
//! messages (`spec.md` §4.7, `SPEC_FULL.md` §4.7). Grounded on
//! `rogue_talk.bot.client.BotClient`'s `on_world_state`/`on_player_joined`/
//! `on_player_left` registrations, collapsed from a list-of-callbacks-per-
//! event into a single trait with no-op defaults so callers implement only
//! the events they care about, in the style of `rt_core::world::Broadcaster`.
//!
//! Audio-range enter/leave and speaking-start/stop are bot-specific
//! derived events, not raw wire messages, so they live in `rt_bot`'s own
//! event trait rather than here (`SPEC_FULL.md` §4.8: "adding only
//! pathfinding and the speaking/audio-range event detection").

use rt_core::wire::PlayerRecord;

/// Receives callbacks from a running [`crate::connection::Connection`].
/// All methods default to doing nothing, so implementors only override
/// the events they need.
pub trait ClientEvents: Send {
    /// A fresh `WORLD_STATE` snapshot has been applied.
    fn on_world_state(&mut self, _players: &[PlayerRecord]) {}

    /// The local player's position was confirmed or corrected after a
    /// `POSITION_ACK` (`spec.md` §4.7).
    fn on_position_ack(&mut self, _x: u16, _y: u16, _accepted: bool) {}

    /// The local player moved to a different level via a door or
    /// teleporter.
    fn on_door_transition(&mut self, _level_name: &str, _x: u16, _y: u16) {}

    /// Another player's session started (`PLAYER_JOINED`).
    fn on_player_joined(&mut self, _player_id: u32, _name: &str) {}

    /// Another player's session ended (`PLAYER_LEFT`).
    fn on_player_left(&mut self, _player_id: u32) {}

    /// The connection ended, cleanly or otherwise.
    fn on_disconnect(&mut self, _reason: &str) {}
}

/// A [`ClientEvents`] that does nothing, for callers that only want to
/// poll state rather than react to callbacks.
pub struct NoopEvents;

impl ClientEvents for NoopEvents {}
