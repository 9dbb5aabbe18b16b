//! Ties `rt_client`'s connection/session-mirroring machinery to the
//! bot-specific pieces (`spec.md` §4.8, `SPEC_FULL.md` §4.8): no
//! reimplementation of the handshake, level distribution, or movement
//! prediction — `BotRuntime` drives a `rt_client::connection::Connection`
//! directly and adds pathfinding, proximity tracking, and speaking
//! detection on top via a [`crate::events::ClientEvents`] adapter.

use crate::events::BotEvents;
use crate::pathfinding;
use crate::proximity::ProximityTracker;
use crate::speaking::SpeakingTracker;
use rt_client::connection::{Connection, PollOutcome};
use rt_client::error::ClientError;
use rt_client::events::ClientEvents;
use rt_core::wire::PlayerRecord;
use std::time::{Duration, Instant};

/// Adapts [`ClientEvents`] callbacks into bot-level [`BotEvents`]
/// callbacks, maintaining the proximity tracker across snapshots.
struct Adapter<'a, B: BotEvents> {
    player_id: u32,
    proximity: &'a mut ProximityTracker,
    bot_events: &'a mut B,
}

impl<'a, B: BotEvents> ClientEvents for Adapter<'a, B> {
    fn on_world_state(&mut self, players: &[PlayerRecord]) {
        self.bot_events.on_world_state(players);
        let Some(me) = players.iter().find(|p| p.player_id == self.player_id) else {
            return;
        };
        let (entered, left) = self.proximity.update(self.player_id, &me.level_name, me.x, me.y, players);
        for id in entered {
            if let Some(player) = players.iter().find(|p| p.player_id == id) {
                self.bot_events.on_player_nearby(player);
            }
        }
        for id in left {
            if let Some(player) = players.iter().find(|p| p.player_id == id) {
                self.bot_events.on_player_left_range(player);
            }
        }
    }

    fn on_position_ack(&mut self, x: u16, y: u16, accepted: bool) {
        self.bot_events.on_position_ack(x, y, accepted);
    }

    fn on_door_transition(&mut self, level_name: &str, x: u16, y: u16) {
        self.proximity.clear();
        self.bot_events.on_door_transition(level_name, x, y);
    }

    fn on_disconnect(&mut self, reason: &str) {
        self.bot_events.on_disconnect(reason);
    }
}

/// Drives one bot's connection: handshake and steady-state dispatch
/// through `rt_client::connection::Connection`, plus periodic pathfinding
/// steps and speaking-timeout checks the connection's blocking read loop
/// alone cannot drive.
pub struct BotRuntime {
    connection: Connection,
    speaking: SpeakingTracker,
    proximity: ProximityTracker,
    path: Vec<(i32, i32)>,
}

/// How often [`BotRuntime::run`] wakes up to tick pathfinding/speaking
/// checks when no message has arrived.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

impl BotRuntime {
    pub fn new(connection: Connection) -> Self {
        BotRuntime { connection, speaking: SpeakingTracker::new(), proximity: ProximityTracker::new(), path: Vec::new() }
    }

    /// Sets a path for the bot to walk, one tile per tick, computed by
    /// [`crate::pathfinding::find_path_default`] against the bot's local
    /// level mirror.
    pub fn walk_to(&mut self, goal_x: u16, goal_y: u16) {
        let level = &self.connection.level;
        let start = (self.connection.x as i32, self.connection.y as i32);
        let goal = (goal_x as i32, goal_y as i32);
        self.path = pathfinding::find_path_default(start, goal, |x, y| {
            x >= 0 && y >= 0 && level.is_walkable(x as u16, y as u16)
        })
        .unwrap_or_default();
        if !self.path.is_empty() {
            self.path.remove(0);
        }
    }

    fn step_path(&mut self) -> Result<(), ClientError> {
        if self.path.is_empty() {
            return Ok(());
        }
        let (tx, ty) = self.path[0];
        let dx = tx - self.connection.x as i32;
        let dy = ty - self.connection.y as i32;
        if self.connection.try_move_local(dx, dy)?.is_some() {
            self.path.remove(0);
        } else {
            // Local walkability changed under us (e.g. another player
            // blocked the tile); abandon the stale plan.
            self.path.clear();
        }
        Ok(())
    }

    /// Records a media frame from `player_id`, firing `on_player_speaks`
    /// on the first frame of a new utterance.
    pub fn on_audio_frame(&mut self, player_id: u32, now: Instant, events: &mut impl BotEvents) {
        if self.speaking.on_frame(player_id, now) {
            events.on_player_speaks(player_id);
        }
    }

    /// Runs the bot until disconnection, ticking pathfinding and speaking
    /// timeouts at [`TICK_INTERVAL`] whenever no message arrives within
    /// that window.
    pub fn run(&mut self, events: &mut impl BotEvents) -> Result<(), ClientError> {
        self.connection.set_read_timeout(Some(TICK_INTERVAL))?;
        let player_id = self.connection.player_id;
        loop {
            let mut adapter = Adapter { player_id, proximity: &mut self.proximity, bot_events: events };
            match self.connection.poll(&mut adapter)? {
                PollOutcome::Closed => return Ok(()),
                PollOutcome::Message(_) | PollOutcome::Timeout => {}
            }
            for id in self.speaking.check_timeouts(Instant::now()) {
                events.on_player_stops_speaking(id);
            }
            self.step_path()?;
        }
    }
}
