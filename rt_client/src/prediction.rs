//! Client-side prediction and rollback (`spec.md` §4.7, §9 "Client
//! prediction & rollback"). Grounded directly on
//! `GameClient._handle_server_message`'s `POSITION_ACK` branch in
//! `rogue_talk.client.game_client`: pending moves are deltas with expected
//! absolute positions; an ack whose position disagrees with the expected
//! one rolls every pending move back and resnaps, otherwise surviving
//! deltas replay against the local walkability predicate.

use hashbrown::HashMap;

/// A locally predicted move awaiting server acknowledgement: the applied
/// delta and the absolute position it was predicted to land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMove {
    pub dx: i32,
    pub dy: i32,
    pub expected_x: u16,
    pub expected_y: u16,
}

/// Tracks in-flight moves for one connection's local position mirror.
#[derive(Debug, Default)]
pub struct PredictionState {
    pub move_seq: u32,
    pending: HashMap<u32, PendingMove>,
}

/// Outcome of applying a local movement intent (`spec.md` §4.7 step (a)).
pub struct LocalMoveOutcome {
    pub seq: u32,
    pub new_x: u16,
    pub new_y: u16,
}

/// Outcome of applying a `POSITION_ACK` (`spec.md` §4.7 step (b)): the new
/// authoritative local position, and whether `seq`'s predicted move was
/// rejected. The position alone cannot answer that question, since an
/// accepted ack with surviving pending moves replays deltas on top of it.
pub struct AckOutcome {
    pub x: u16,
    pub y: u16,
    pub rejected: bool,
}

impl PredictionState {
    pub fn new() -> Self {
        PredictionState::default()
    }

    /// Applies a local movement intent: checks walkability, and if
    /// walkable, records the predicted move and returns the new position
    /// to render immediately and the `seq` to send as `POSITION_UPDATE`.
    pub fn apply_local_move(
        &mut self,
        x: u16,
        y: u16,
        dx: i32,
        dy: i32,
        is_walkable: impl Fn(u16, u16) -> bool,
    ) -> Option<LocalMoveOutcome> {
        let new_x = (x as i32 + dx).try_into().ok()?;
        let new_y = (y as i32 + dy).try_into().ok()?;
        if !is_walkable(new_x, new_y) {
            return None;
        }
        self.move_seq += 1;
        let seq = self.move_seq;
        self.pending.insert(seq, PendingMove { dx, dy, expected_x: new_x, expected_y: new_y });
        Some(LocalMoveOutcome { seq, new_x, new_y })
    }

    /// Applies a `POSITION_ACK(seq, server_x, server_y)` (`spec.md` §4.7):
    /// clears acknowledged-and-older moves, rolls back and clears
    /// everything on rejection, and replays surviving pending deltas
    /// against the (possibly updated) local walkability predicate.
    ///
    /// Returns the new authoritative local position and whether `seq`'s
    /// move was rejected. Callers must read `rejected` rather than compare
    /// the returned position against `(server_x, server_y)`: an accepted
    /// ack with surviving pending moves replays deltas on top of the
    /// server position, so the two will legitimately differ.
    pub fn apply_ack(
        &mut self,
        server_x: u16,
        server_y: u16,
        seq: u32,
        is_walkable: impl Fn(u16, u16) -> bool,
    ) -> AckOutcome {
        let move_rejected = match self.pending.get(&seq) {
            Some(mv) => mv.expected_x != server_x || mv.expected_y != server_y,
            None => false,
        };

        self.pending.retain(|&s, _| s > seq);
        if move_rejected {
            self.pending.clear();
        }

        let mut x = server_x;
        let mut y = server_y;
        if !move_rejected {
            let mut seqs: Vec<u32> = self.pending.keys().copied().collect();
            seqs.sort_unstable();
            for s in seqs {
                let mv = self.pending[&s];
                let nx = (x as i32 + mv.dx).max(0) as u16;
                let ny = (y as i32 + mv.dy).max(0) as u16;
                if is_walkable(nx, ny) {
                    x = nx;
                    y = ny;
                }
            }
        }
        AckOutcome { x, y, rejected: move_rejected }
    }

    /// Clears all pending moves (`spec.md` §4.7: on `DOOR_TRANSITION`).
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_move_keeps_predicted_position() {
        let mut state = PredictionState::new();
        let outcome = state.apply_local_move(5, 5, 1, 0, |_, _| true).unwrap();
        assert_eq!((outcome.new_x, outcome.new_y), (6, 5));
        let ack = state.apply_ack(6, 5, outcome.seq, |_, _| true);
        assert!(!ack.rejected);
        assert_eq!((ack.x, ack.y), (6, 5));
        assert!(!state.has_pending());
    }

    #[test]
    fn rejected_move_snaps_back_and_clears_all_pending() {
        let mut state = PredictionState::new();
        let first = state.apply_local_move(5, 5, 1, 0, |_, _| true).unwrap();
        let second = state.apply_local_move(6, 5, 1, 0, |_, _| true).unwrap();
        assert_eq!(second.seq, first.seq + 1);

        // Server rejects the first move: acked position differs from
        // what we predicted for seq 1.
        let ack = state.apply_ack(5, 5, first.seq, |_, _| true);
        assert!(ack.rejected);
        assert_eq!((ack.x, ack.y), (5, 5));
        assert!(!state.has_pending());
    }

    #[test]
    fn accepted_ack_replays_surviving_deltas() {
        let mut state = PredictionState::new();
        let first = state.apply_local_move(5, 5, 1, 0, |_, _| true).unwrap();
        let second = state.apply_local_move(6, 5, 0, 1, |_, _| true).unwrap();
        // Ack for the first move only; the second is still pending and
        // should be replayed on top of the authoritative position.
        let ack = state.apply_ack(6, 5, first.seq, |_, _| true);
        assert!(!ack.rejected);
        assert_eq!((ack.x, ack.y), (6, 6));
        assert_eq!(second.new_x, 6);
    }
}
