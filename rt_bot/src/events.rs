//! Bot-specific event callbacks, grounded on
//! `rogue_talk.bot.client.BotClient`'s `on_player_nearby`/
//! `on_player_left_range`/`on_player_speaks`/`on_player_stops_speaking`
//! decorator registrations, collapsed into one trait with no-op defaults
//! the way `rt_client::events::ClientEvents` is (`spec.md` §4.8).

use rt_core::wire::PlayerRecord;

/// Receives callbacks from a running [`crate::runtime::BotRuntime`]. All
/// methods default to doing nothing.
pub trait BotEvents: Send {
    /// A fresh `WORLD_STATE` snapshot has been applied.
    fn on_world_state(&mut self, _players: &[PlayerRecord]) {}

    /// The bot's position was confirmed or corrected after a
    /// `POSITION_ACK`.
    fn on_position_ack(&mut self, _x: u16, _y: u16, _accepted: bool) {}

    /// The bot moved to a different level via a door or teleporter.
    fn on_door_transition(&mut self, _level_name: &str, _x: u16, _y: u16) {}

    /// `player` entered audio range (Chebyshev distance <= max radius,
    /// same level) of the bot.
    fn on_player_nearby(&mut self, _player: &PlayerRecord) {}

    /// `player` left audio range.
    fn on_player_left_range(&mut self, _player: &PlayerRecord) {}

    /// `player_id` started speaking (detected from SFU media activity fed
    /// in via [`crate::runtime::BotRuntime::on_audio_frame`]).
    fn on_player_speaks(&mut self, _player_id: u32) {}

    /// 500ms of silence elapsed since `player_id`'s last media frame.
    fn on_player_stops_speaking(&mut self, _player_id: u32) {}

    /// The connection ended, cleanly or otherwise.
    fn on_disconnect(&mut self, _reason: &str) {}
}
