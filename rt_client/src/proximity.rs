//! Client-side proximity volume (`spec.md` §4.5/§9): "clients compute
//! per-peer volume from the last received `WORLD_STATE` using a
//! precomputed squared-distance table with a piecewise-linear falloff:
//! full volume inside a near radius, linear decay to zero at a maximum
//! radius". Grounded on `rogue_talk.common.audio`'s `_VOLUME_TABLE`/
//! `get_volume`, moved client-side per the SFU-only redesign (`spec.md`
//! §9 Open question) — the server never computes or enforces this.

/// Distance (in tiles) within which a peer is heard at full volume.
pub const FULL_VOLUME_DISTANCE: f64 = 3.0;
/// Distance beyond which a peer is inaudible.
pub const MAX_DISTANCE: f64 = 10.0;

/// A squared-distance -> volume lookup table, precomputed once so the
/// per-frame mix loop never calls `sqrt`.
pub struct VolumeTable {
    max_distance_sq: i64,
    table: Vec<f32>,
}

impl VolumeTable {
    pub fn new(full_volume_distance: f64, max_distance: f64) -> Self {
        let max_distance_sq = (max_distance * max_distance).round() as i64;
        let full_volume_distance_sq = full_volume_distance * full_volume_distance;
        let table = (0..=max_distance_sq)
            .map(|dist_sq| {
                if (dist_sq as f64) <= full_volume_distance_sq {
                    1.0
                } else {
                    let normalized = ((dist_sq as f64).sqrt() - full_volume_distance)
                        / (max_distance - full_volume_distance);
                    (1.0 - normalized).max(0.0) as f32
                }
            })
            .collect();
        VolumeTable { max_distance_sq, table }
    }

    /// Volume multiplier (0.0-1.0) for an integer tile offset.
    pub fn volume_for_offset(&self, dx: i32, dy: i32) -> f32 {
        let dist_sq = (dx as i64) * (dx as i64) + (dy as i64) * (dy as i64);
        if dist_sq > self.max_distance_sq {
            return 0.0;
        }
        self.table[dist_sq as usize]
    }

    /// `true` when `dx, dy` falls within Chebyshev audio range, used for
    /// enter/leave range events (`spec.md` §4.7's "entering/leaving audio
    /// range (Chebyshev distance ≤ max radius on the same level)").
    pub fn in_range(&self, dx: i32, dy: i32) -> bool {
        dx.unsigned_abs().max(dy.unsigned_abs()) as i64 <= (self.max_distance_sq as f64).sqrt() as i64
    }
}

impl Default for VolumeTable {
    fn default() -> Self {
        VolumeTable::new(FULL_VOLUME_DISTANCE, MAX_DISTANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inside_full_volume_radius_is_full_volume() {
        let table = VolumeTable::default();
        assert_eq!(table.volume_for_offset(2, 1), 1.0);
        assert_eq!(table.volume_for_offset(0, 0), 1.0);
    }

    #[test]
    fn beyond_max_distance_is_silent() {
        let table = VolumeTable::default();
        assert_eq!(table.volume_for_offset(9, 9), 0.0);
    }

    #[test]
    fn between_thresholds_decays_linearly() {
        let table = VolumeTable::default();
        let v = table.volume_for_offset(6, 0);
        assert!(v > 0.0 && v < 1.0);
    }
}
