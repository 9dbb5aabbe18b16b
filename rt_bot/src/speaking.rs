//! Speaking detection, grounded on `rogue_talk.bot.client.BotClient`'s
//! `_speaking_players`/`_check_speaking_timeouts`: any media frame from a
//! peer marks it speaking and refreshes its timestamp; 500ms without a
//! fresh frame ends the utterance (`spec.md` §4.8). The timer is a free
//! function over a caller-supplied instant rather than `Instant::now()`
//! internally, so it is testable without real time
//! (`SPEC_FULL.md` §4.8).

use hashbrown::HashMap;
use std::time::{Duration, Instant};

pub const SPEAKING_TIMEOUT: Duration = Duration::from_millis(500);

/// Tracks which peers are currently speaking, driven by externally
/// observed media activity (the SFU media path itself is out of scope;
/// see `spec.md` §1).
#[derive(Debug, Default)]
pub struct SpeakingTracker {
    last_frame_at: HashMap<u32, Instant>,
}

impl SpeakingTracker {
    pub fn new() -> Self {
        SpeakingTracker::default()
    }

    /// Records a media frame from `player_id` at `now`. Returns `true` if
    /// this is the start of a new utterance (the player was not already
    /// marked speaking).
    pub fn on_frame(&mut self, player_id: u32, now: Instant) -> bool {
        let was_speaking = self.last_frame_at.contains_key(&player_id);
        self.last_frame_at.insert(player_id, now);
        !was_speaking
    }

    /// Evaluates the silence timeout as of `now`, returning the ids of
    /// every peer whose utterance just ended.
    pub fn check_timeouts(&mut self, now: Instant) -> Vec<u32> {
        let expired: Vec<u32> = self
            .last_frame_at
            .iter()
            .filter(|&(_, &last)| now.saturating_duration_since(last) > SPEAKING_TIMEOUT)
            .map(|(&id, _)| id)
            .collect();
        for id in &expired {
            self.last_frame_at.remove(id);
        }
        expired
    }

    pub fn is_speaking(&self, player_id: u32) -> bool {
        self.last_frame_at.contains_key(&player_id)
    }
}
