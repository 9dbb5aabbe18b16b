//! Authoritative world & movement core (`spec.md` §3, §4.3): connected
//! player state, adjacency-validated movement, door transitions, and
//! world-state broadcast.
//!
//! Grounded on `t51core::world`'s idea of a single structure owning all
//! live entities under one lock, generalized from an ECS scheduler down to
//! the much smaller "map of connected players" this spec calls for
//! (`spec.md` §5: "a small number of shared mutable structures ... are
//! protected by a single coarse lock").

use crate::level::LevelStore;
use crate::wire::{Message, PlayerRecord};
use hashbrown::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Delivers a message to one connected player's socket. Implemented by the
/// server binary over its per-connection writer; kept as a trait here so
/// `rt_core` stays transport-agnostic.
///
/// Returns `false` on write failure, per `spec.md` §7 "Peer write failure
/// during broadcast": the failing peer is dropped from this broadcast, and
/// its own session task discovers the broken connection on its next read.
pub trait Broadcaster: Send + Sync {
    fn send(&self, message: &Message) -> bool;
}

/// Session-scoped record for one live player (`spec.md` §3).
pub struct ConnectedPlayer {
    pub player_id: u32,
    pub name: String,
    pub public_key: [u8; 32],
    pub x: u16,
    pub y: u16,
    pub level_name: String,
    pub is_muted: bool,
    pub last_pong_time: Instant,
    pub last_ping_sent_time: Instant,
    pub ping_ms: u32,
    sink: Arc<dyn Broadcaster>,
}

/// Outcome of a single `try_move` call (`spec.md` §4.3): the authoritative
/// ack position, and the door transition to send first, if any.
pub struct MoveOutcome {
    pub ack_x: u16,
    pub ack_y: u16,
    pub door_transition: Option<DoorTransitionOutcome>,
}

pub struct DoorTransitionOutcome {
    pub target_level: String,
    pub target_x: u16,
    pub target_y: u16,
}

struct WorldState {
    players: HashMap<u32, ConnectedPlayer>,
    /// Public keys with a live session, per `spec.md` §3's invariant: at
    /// most one live session per public key.
    live_keys: HashMap<[u8; 32], u32>,
}

/// The authoritative world: every connected player's position, guarded by
/// one lock (`spec.md` §5). Movement validation consults `LevelStore`,
/// which is immutable and requires no locking of its own.
pub struct World {
    levels: Arc<LevelStore>,
    state: Mutex<WorldState>,
    next_player_id: AtomicU32,
}

impl World {
    pub fn new(levels: Arc<LevelStore>) -> Self {
        World {
            levels,
            state: Mutex::new(WorldState { players: HashMap::new(), live_keys: HashMap::new() }),
            next_player_id: AtomicU32::new(1),
        }
    }

    /// Chooses a spawn `(x, y, level)` (`spec.md` §4.3): the saved state if
    /// one exists, else the `main` level's spawn tile.
    pub fn spawn_position(&self, saved: Option<(u16, u16, String)>) -> Option<(u16, u16, String)> {
        if let Some(saved) = saved {
            return Some(saved);
        }
        let main = self.levels.get("main")?;
        main.find_spawn().map(|(x, y)| (x, y, "main".to_owned()))
    }

    /// Atomically checks `spec.md` §3's "at most one live session per
    /// public key" invariant and, if it holds, assigns a fresh,
    /// never-reused `player_id` and registers the connected-player record
    /// (`spec.md` §3, §4.2). Returns `None` if `public_key` already has a
    /// live session — the caller rejects the handshake with
    /// `ALREADY_CONNECTED`.
    pub fn join(
        &self,
        name: String,
        public_key: [u8; 32],
        x: u16,
        y: u16,
        level_name: String,
        sink: Arc<dyn Broadcaster>,
    ) -> Option<u32> {
        let mut state = self.state.lock().unwrap();
        if state.live_keys.contains_key(&public_key) {
            return None;
        }
        let player_id = self.next_player_id.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        let player = ConnectedPlayer {
            player_id,
            name,
            public_key,
            x,
            y,
            level_name,
            is_muted: false,
            last_pong_time: now,
            last_ping_sent_time: now,
            ping_ms: 0,
            sink,
        };
        state.live_keys.insert(public_key, player_id);
        state.players.insert(player_id, player);
        Some(player_id)
    }

    /// Removes the player and returns its last state, for position save and
    /// `PLAYER_LEFT` broadcast (`spec.md` §4.2 CLOSED).
    pub fn leave(&self, player_id: u32) -> Option<(String, u16, u16, String)> {
        let mut state = self.state.lock().unwrap();
        let player = state.players.remove(&player_id)?;
        state.live_keys.remove(&player.public_key);
        Some((player.name, player.x, player.y, player.level_name))
    }

    /// `true` iff `public_key` currently has a live session.
    pub fn has_live_session(&self, public_key: &[u8; 32]) -> bool {
        self.state.lock().unwrap().live_keys.contains_key(public_key)
    }

    /// Validates and applies a move, following through any door at the
    /// landed tile (`spec.md` §4.3). Returns `None` if `player_id` is not
    /// connected (should not happen in practice).
    pub fn try_move(&self, player_id: u32, new_x: u16, new_y: u16) -> Option<MoveOutcome> {
        let mut state = self.state.lock().unwrap();
        let player = state.players.get_mut(&player_id)?;

        let adjacent = adjacency_ok(player.x, player.y, new_x, new_y);
        let level = self.levels.get(&player.level_name)?;
        let walkable = adjacent && level.is_walkable(new_x, new_y);

        if walkable {
            player.x = new_x;
            player.y = new_y;
        }

        if walkable && level.is_door(player.x, player.y) {
            if let Some(door) = level.door_at(player.x, player.y).cloned() {
                let target_level_name = door.target_level.clone().unwrap_or_else(|| player.level_name.clone());
                if self.levels.contains(&target_level_name) {
                    player.level_name = target_level_name.clone();
                    player.x = door.target_x;
                    player.y = door.target_y;
                    let transition = if door.target_level.is_some() {
                        Some(DoorTransitionOutcome {
                            target_level: target_level_name,
                            target_x: door.target_x,
                            target_y: door.target_y,
                        })
                    } else {
                        None
                    };
                    return Some(MoveOutcome { ack_x: player.x, ack_y: player.y, door_transition: transition });
                }
                // Target level does not exist: no-op, ack at the door position.
            }
        }

        Some(MoveOutcome { ack_x: player.x, ack_y: player.y, door_transition: None })
    }

    pub fn set_muted(&self, player_id: u32, muted: bool) {
        if let Some(player) = self.state.lock().unwrap().players.get_mut(&player_id) {
            player.is_muted = muted;
        }
    }

    pub fn record_pong(&self, player_id: u32) {
        let mut state = self.state.lock().unwrap();
        if let Some(player) = state.players.get_mut(&player_id) {
            let now = Instant::now();
            player.ping_ms = now.saturating_duration_since(player.last_ping_sent_time).as_millis() as u32;
            player.last_pong_time = now;
        }
    }

    pub fn record_ping_sent(&self, player_id: u32) {
        let mut state = self.state.lock().unwrap();
        if let Some(player) = state.players.get_mut(&player_id) {
            player.last_ping_sent_time = Instant::now();
        }
    }

    /// Seconds since the last `PONG`, for keep-alive timeout checks
    /// (`spec.md` §4.2: 30 s timeout).
    pub fn seconds_since_pong(&self, player_id: u32) -> Option<f64> {
        let state = self.state.lock().unwrap();
        state.players.get(&player_id).map(|p| p.last_pong_time.elapsed().as_secs_f64())
    }

    /// A point-in-time `WORLD_STATE` snapshot of every live player.
    pub fn snapshot(&self) -> Message {
        let state = self.state.lock().unwrap();
        let mut players: Vec<PlayerRecord> = state
            .players
            .values()
            .map(|p| PlayerRecord {
                player_id: p.player_id,
                x: p.x,
                y: p.y,
                is_muted: p.is_muted,
                name: p.name.clone(),
                level_name: p.level_name.clone(),
                ping_ms: p.ping_ms,
            })
            .collect();
        players.sort_by_key(|p| p.player_id);
        Message::WorldState { players }
    }

    /// Sends `message` to every live session. Failing peers are dropped
    /// from this broadcast only, per `spec.md` §7; their own read loop
    /// will discover the break and tear down normally.
    pub fn broadcast_all(&self, message: &Message) {
        let state = self.state.lock().unwrap();
        for player in state.players.values() {
            player.sink.send(message);
        }
    }

    /// Sends `message` to every live session other than `exclude_player_id`.
    pub fn broadcast_others(&self, exclude_player_id: u32, message: &Message) {
        let state = self.state.lock().unwrap();
        for player in state.players.values() {
            if player.player_id != exclude_player_id {
                player.sink.send(message);
            }
        }
    }

    /// Sends `message` to exactly one connected player, if still present.
    pub fn send_to(&self, player_id: u32, message: &Message) -> bool {
        let state = self.state.lock().unwrap();
        match state.players.get(&player_id) {
            Some(player) => player.sink.send(message),
            None => false,
        }
    }

    pub fn current_position(&self, player_id: u32) -> Option<(u16, u16, String)> {
        let state = self.state.lock().unwrap();
        state.players.get(&player_id).map(|p| (p.x, p.y, p.level_name.clone()))
    }
}

/// Chebyshev adjacency (`spec.md` GLOSSARY): `max(|Δx|, |Δy|) ≤ 1`,
/// including the zero-move and diagonals.
fn adjacency_ok(old_x: u16, old_y: u16, new_x: u16, new_y: u16) -> bool {
    let dx = (old_x as i32 - new_x as i32).abs();
    let dy = (old_y as i32 - new_y as i32).abs();
    dx.max(dy) <= 1
}
