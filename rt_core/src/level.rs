//! Level packs: tile grids, door/teleporter tables, and the content-addressed
//! file manifest used by level distribution (`spec.md` §3, §4.6, §6).
//!
//! Grounded on `original_source/rogue_talk/common/tiles.py` for the tile
//! definition fields and `tiles.json` shape, and on the level pack on-disk
//! layout in `spec.md` §6 (`level.txt`/`tiles.json`/`level.json` mandatory,
//! everything else opaque). Hashing follows `spec.md` §3: SHA-256, lower
//! hex, grounded on `sha2`/`hex` as used for content addressing in the
//! `valence` example repo.

use hashbrown::HashMap;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

/// Per-tile-character definition. Only `walkable` and `is_door` are
/// consulted by server logic; the rest pass through to clients untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct TileDef {
    #[serde(default)]
    pub walkable: bool,
    #[serde(default)]
    pub is_door: bool,
    #[serde(default)]
    pub is_spawn: bool,
    #[serde(default)]
    pub blocks_sight: Option<bool>,
    #[serde(default)]
    pub blocks_sound: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TileDef {
    /// `blocks_sight`/`blocks_sound` default to `!walkable` when absent,
    /// mirroring `TileDef.__post_init__` in the Python original.
    fn resolved_blocks_sight(&self) -> bool {
        self.blocks_sight.unwrap_or(!self.walkable)
    }

    fn resolved_blocks_sound(&self) -> bool {
        self.blocks_sound.unwrap_or(!self.walkable)
    }
}

#[derive(Debug, Deserialize)]
struct TilesFile {
    tiles: HashMap<String, TileDef>,
    default: TileDef,
}

/// A door or teleporter destination (`spec.md` §3). `target_level = None`
/// denotes a same-level teleporter.
#[derive(Debug, Clone, Deserialize)]
pub struct DoorInfo {
    pub target_level: Option<String>,
    pub target_x: u16,
    pub target_y: u16,
}

#[derive(Debug, Deserialize)]
struct LevelJson {
    #[serde(default)]
    doors: HashMap<String, DoorInfo>,
    #[serde(default)]
    streams: HashMap<String, serde_json::Value>,
}

fn parse_coord_key(key: &str) -> Option<(u16, u16)> {
    let (x, y) = key.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// One immutable level, loaded once at startup.
#[derive(Debug)]
pub struct Level {
    pub name: String,
    pub width: u16,
    pub height: u16,
    /// Row-major grid of tile characters, one byte per tile (ASCII, per
    /// `spec.md` §6).
    pub grid: Vec<u8>,
    tiles: HashMap<u8, TileDef>,
    default_tile: TileDef,
    doors: HashMap<(u16, u16), DoorInfo>,
    /// Opaque to server movement logic; carried for broadcast only.
    pub streams: HashMap<(u16, u16), serde_json::Value>,
}

impl Level {
    fn tile_char_at(&self, x: u16, y: u16) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.grid.get(y as usize * self.width as usize + x as usize).copied()
    }

    fn tile_def_at(&self, x: u16, y: u16) -> Option<&TileDef> {
        self.tile_char_at(x, y).map(|c| self.tiles.get(&c).unwrap_or(&self.default_tile))
    }

    /// `true` iff `(x, y)` is in bounds and the tile there is walkable
    /// (`spec.md` §4.3).
    pub fn is_walkable(&self, x: u16, y: u16) -> bool {
        self.tile_def_at(x, y).map(|t| t.walkable).unwrap_or(false)
    }

    /// `true` iff the tile at `(x, y)` is marked `is_door`.
    pub fn is_door(&self, x: u16, y: u16) -> bool {
        self.tile_def_at(x, y).map(|t| t.is_door).unwrap_or(false)
    }

    /// The door table entry at `(x, y)`, if any.
    pub fn door_at(&self, x: u16, y: u16) -> Option<&DoorInfo> {
        self.doors.get(&(x, y))
    }

    pub fn blocks_sight(&self, x: u16, y: u16) -> bool {
        self.tile_def_at(x, y).map(|t| t.resolved_blocks_sight()).unwrap_or(true)
    }

    pub fn blocks_sound(&self, x: u16, y: u16) -> bool {
        self.tile_def_at(x, y).map(|t| t.resolved_blocks_sound()).unwrap_or(true)
    }

    /// Chooses a spawn tile (`spec.md` §4.3): the first tile marked
    /// `is_spawn`, falling back to any walkable interior tile.
    pub fn find_spawn(&self) -> Option<(u16, u16)> {
        for y in 0..self.height {
            for x in 0..self.width {
                if self.tile_def_at(x, y).map(|t| t.is_spawn).unwrap_or(false) {
                    return Some((x, y));
                }
            }
        }
        for y in 0..self.height {
            for x in 0..self.width {
                if self.is_walkable(x, y) {
                    return Some((x, y));
                }
            }
        }
        None
    }
}

/// One file's content-address entry: hash and size (`spec.md` §3, §4.6).
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub hash_hex: String,
    pub size: u32,
    pub bytes: Vec<u8>,
}

/// A content-addressed bundle for one level: every file under its
/// directory, hashed, held verbatim.
#[derive(Debug)]
pub struct LevelPack {
    pub level: Level,
    files: HashMap<String, FileRecord>,
}

impl LevelPack {
    /// `filename → (hash, size)` for every file in this level's directory.
    pub fn manifest(&self) -> Vec<(String, String, u32)> {
        self.files
            .iter()
            .map(|(name, rec)| (name.clone(), rec.hash_hex.clone(), rec.size))
            .collect()
    }

    /// The raw bytes for `filename`, if present in this pack.
    pub fn file_bytes(&self, filename: &str) -> Option<&[u8]> {
        self.files.get(filename).map(|rec| rec.bytes.as_slice())
    }
}

/// Errors loading a level pack from disk.
#[derive(Debug, thiserror::Error)]
pub enum LevelLoadError {
    #[error("i/o error loading level pack: {0}")]
    Io(#[from] io::Error),
    #[error("{file}: invalid JSON: {source}")]
    Json { file: String, #[source] source: serde_json::Error },
    #[error("level.txt rows are not all the same width")]
    RaggedGrid,
    #[error("level directory has no level.txt")]
    MissingGrid,
}

/// All loaded levels, keyed by name. Immutable after `load` (`spec.md` §3).
pub struct LevelStore {
    packs: HashMap<String, LevelPack>,
}

impl LevelStore {
    /// Walks `levels_dir`, treating each immediate subdirectory as one
    /// level named after the directory.
    pub fn load(levels_dir: &Path) -> Result<Self, LevelLoadError> {
        let mut packs = HashMap::new();
        for entry in std::fs::read_dir(levels_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let pack = load_level_pack(&name, &entry.path())?;
            packs.insert(name, pack);
        }
        Ok(LevelStore { packs })
    }

    pub fn get(&self, name: &str) -> Option<&Level> {
        self.packs.get(name).map(|p| &p.level)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packs.contains_key(name)
    }

    /// Empty manifest for an unknown level, per `spec.md` §4.6.
    pub fn manifest(&self, name: &str) -> Vec<(String, String, u32)> {
        self.packs.get(name).map(|p| p.manifest()).unwrap_or_default()
    }

    /// Bytes for requested filenames that exist; missing names are simply
    /// omitted (`spec.md` §4.6).
    pub fn files(&self, level_name: &str, filenames: &[String]) -> Vec<(String, Vec<u8>)> {
        let Some(pack) = self.packs.get(level_name) else {
            return Vec::new();
        };
        filenames
            .iter()
            .filter_map(|f| pack.file_bytes(f).map(|bytes| (f.clone(), bytes.to_vec())))
            .collect()
    }
}

fn load_level_pack(name: &str, dir: &Path) -> Result<LevelPack, LevelLoadError> {
    let mut files = HashMap::new();
    collect_files(dir, dir, &mut files)?;

    let grid_path = dir.join("level.txt");
    if !grid_path.exists() {
        return Err(LevelLoadError::MissingGrid);
    }
    let grid_text = std::fs::read_to_string(&grid_path)?;
    let (width, height, grid) = parse_grid(&grid_text)?;

    let tiles_file: TilesFile = match std::fs::read_to_string(dir.join("tiles.json")) {
        Ok(text) => serde_json::from_str(&text)
            .map_err(|source| LevelLoadError::Json { file: "tiles.json".into(), source })?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            TilesFile { tiles: HashMap::new(), default: TileDef::default_walkable() }
        }
        Err(e) => return Err(e.into()),
    };
    let tiles = tiles_file
        .tiles
        .into_iter()
        .filter_map(|(ch, def)| ch.bytes().next().map(|b| (b, def)))
        .collect();

    let level_json: LevelJson = match std::fs::read_to_string(dir.join("level.json")) {
        Ok(text) => serde_json::from_str(&text)
            .map_err(|source| LevelLoadError::Json { file: "level.json".into(), source })?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => LevelJson { doors: HashMap::new(), streams: HashMap::new() },
        Err(e) => return Err(e.into()),
    };
    let doors = level_json
        .doors
        .into_iter()
        .filter_map(|(key, info)| parse_coord_key(&key).map(|coord| (coord, info)))
        .collect();
    let streams = level_json
        .streams
        .into_iter()
        .filter_map(|(key, value)| parse_coord_key(&key).map(|coord| (coord, value)))
        .collect();

    let level = Level {
        name: name.to_owned(),
        width,
        height,
        grid,
        tiles,
        default_tile: tiles_file.default,
        doors,
        streams,
    };
    Ok(LevelPack { level, files })
}

impl TileDef {
    fn default_walkable() -> Self {
        TileDef {
            walkable: true,
            is_door: false,
            is_spawn: false,
            blocks_sight: Some(false),
            blocks_sound: Some(false),
            extra: serde_json::Map::new(),
        }
    }
}

fn parse_grid(text: &str) -> Result<(u16, u16, Vec<u8>), LevelLoadError> {
    let rows: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    if rows.iter().any(|r| r.len() != width) {
        return Err(LevelLoadError::RaggedGrid);
    }
    let mut grid = Vec::with_capacity(width * rows.len());
    for row in &rows {
        grid.extend_from_slice(row.as_bytes());
    }
    Ok((width as u16, rows.len() as u16, grid))
}

fn collect_files(root: &Path, dir: &Path, out: &mut HashMap<String, FileRecord>) -> Result<(), LevelLoadError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, out)?;
            continue;
        }
        let bytes = std::fs::read(&path)?;
        let hash_hex = hex::encode(Sha256::digest(&bytes));
        let relative = relative_slash_path(root, &path);
        out.insert(relative, FileRecord { size: bytes.len() as u32, bytes, hash_hex });
    }
    Ok(())
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    let relative: PathBuf = path.strip_prefix(root).unwrap_or(path).to_owned();
    relative.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect::<Vec<_>>().join("/")
}
