//! Audio-range enter/leave detection, grounded on
//! `rogue_talk.bot.client.BotClient._check_proximity_changes`: Chebyshev
//! distance against the last `WORLD_STATE` snapshot, same level only
//! (`spec.md` §4.8).

use hashbrown::HashSet;
use rt_client::proximity::MAX_DISTANCE;
use rt_core::wire::PlayerRecord;

/// Tracks which peers are within audio range of the local player across
/// successive `WORLD_STATE` snapshots.
#[derive(Debug, Default)]
pub struct ProximityTracker {
    previously_nearby: HashSet<u32>,
}

impl ProximityTracker {
    pub fn new() -> Self {
        ProximityTracker::default()
    }

    /// Diffs the current snapshot against the last one, returning
    /// `(entered, left)` player ids. Resets cleanly on a level change: the
    /// caller clears this tracker on `on_door_transition`.
    pub fn update(
        &mut self,
        own_player_id: u32,
        own_level: &str,
        own_x: u16,
        own_y: u16,
        players: &[PlayerRecord],
    ) -> (Vec<u32>, Vec<u32>) {
        let max_radius = MAX_DISTANCE.round() as i64;
        let currently_nearby: HashSet<u32> = players
            .iter()
            .filter(|p| p.player_id != own_player_id && p.level_name == own_level)
            .filter(|p| {
                let dx = (p.x as i64 - own_x as i64).abs();
                let dy = (p.y as i64 - own_y as i64).abs();
                dx.max(dy) <= max_radius
            })
            .map(|p| p.player_id)
            .collect();

        let entered: Vec<u32> = currently_nearby.difference(&self.previously_nearby).copied().collect();
        let left: Vec<u32> = self.previously_nearby.difference(&currently_nearby).copied().collect();
        self.previously_nearby = currently_nearby;
        (entered, left)
    }

    pub fn clear(&mut self) {
        self.previously_nearby.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u32, x: u16, y: u16, level: &str) -> PlayerRecord {
        PlayerRecord { player_id: id, x, y, is_muted: false, name: format!("p{id}"), level_name: level.into(), ping_ms: 0 }
    }

    #[test]
    fn nearby_player_on_same_level_is_reported_as_entered() {
        let mut tracker = ProximityTracker::new();
        let players = vec![player(1, 0, 0, "main"), player(2, 3, 3, "main")];
        let (entered, left) = tracker.update(1, "main", 0, 0, &players);
        assert_eq!(entered, vec![2]);
        assert!(left.is_empty());
    }

    #[test]
    fn player_on_a_different_level_is_ignored() {
        let mut tracker = ProximityTracker::new();
        let players = vec![player(1, 0, 0, "main"), player(2, 1, 1, "dungeon")];
        let (entered, _) = tracker.update(1, "main", 0, 0, &players);
        assert!(entered.is_empty());
    }

    #[test]
    fn player_moving_out_of_range_is_reported_as_left() {
        let mut tracker = ProximityTracker::new();
        tracker.update(1, "main", 0, 0, &[player(1, 0, 0, "main"), player(2, 2, 2, "main")]);
        let (entered, left) = tracker.update(1, "main", 0, 0, &[player(1, 0, 0, "main"), player(2, 50, 50, "main")]);
        assert!(entered.is_empty());
        assert_eq!(left, vec![2]);
    }
}
