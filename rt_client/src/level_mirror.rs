//! The client's local mirror of one level's walkability, used for movement
//! prediction (`spec.md` §4.7) and pathfinding (`rt_bot`). Built from the
//! grid bytes carried in `SERVER_HELLO`/`DOOR_TRANSITION` plus the level
//! pack's `tiles.json`, once fetched through level distribution
//! (`spec.md` §4.6) — deliberately a smaller, read-only reflection of
//! `rt_core::level::Level` rather than a shared type, since the client only
//! ever needs `is_walkable`, never door/stream tables or hashing.

use hashbrown::HashMap;
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
struct TileWalkable {
    #[serde(default)]
    walkable: bool,
}

#[derive(Debug, Deserialize)]
struct TilesFile {
    tiles: HashMap<String, TileWalkable>,
    #[serde(default)]
    default: TileWalkable,
}

/// A client-side mirror of one level's grid and per-tile walkability.
#[derive(Debug, Clone)]
pub struct ClientLevel {
    pub width: u16,
    pub height: u16,
    pub grid: Vec<u8>,
    walkable: HashMap<u8, bool>,
    default_walkable: bool,
}

impl ClientLevel {
    /// Builds a mirror from the grid bytes the server sent and the raw
    /// `tiles.json` contents (from the level distribution cache). Absent
    /// `tiles.json` (not yet fetched) treats every tile as non-walkable,
    /// so prediction degrades to "wait for the server" rather than letting
    /// the player walk through unknown tiles.
    pub fn new(width: u16, height: u16, grid: Vec<u8>, tiles_json: Option<&[u8]>) -> Self {
        let (walkable, default_walkable) = match tiles_json.and_then(|b| serde_json::from_slice::<TilesFile>(b).ok())
        {
            Some(file) => {
                let map = file
                    .tiles
                    .into_iter()
                    .filter_map(|(ch, def)| ch.bytes().next().map(|b| (b, def.walkable)))
                    .collect();
                (map, file.default.walkable)
            }
            None => (HashMap::new(), false),
        };
        ClientLevel { width, height, grid, walkable, default_walkable }
    }

    pub fn is_walkable(&self, x: u16, y: u16) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let Some(&ch) = self.grid.get(y as usize * self.width as usize + x as usize) else {
            return false;
        };
        self.walkable.get(&ch).copied().unwrap_or(self.default_walkable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walkability_follows_tiles_json() {
        let tiles_json = br#"{"tiles": {"#": {"walkable": false}, ".": {"walkable": true}}, "default": {"walkable": false}}"#;
        let level = ClientLevel::new(4, 1, b"#..#".to_vec(), Some(tiles_json));
        assert!(!level.is_walkable(0, 0));
        assert!(level.is_walkable(1, 0));
        assert!(!level.is_walkable(4, 0));
    }

    #[test]
    fn missing_tiles_json_treats_everything_as_non_walkable() {
        let level = ClientLevel::new(4, 1, b"....".to_vec(), None);
        assert!(!level.is_walkable(0, 0));
    }
}
