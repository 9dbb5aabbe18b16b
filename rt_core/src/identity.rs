//! Durable player identity registry (`spec.md` §3, §4.4): the bijection
//! `name ↔ public_key`, plus each name's last-known position.
//!
//! Grounded on `authenticator::AuthenticatorConfig`: a `HashMap` loaded
//! wholesale from a JSON file at startup with `serde_json::from_reader`,
//! mutated in memory, and persisted back with an atomic rename so a crash
//! mid-write never leaves a torn file on disk.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A player's last saved position, written back on disconnect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedPosition {
    pub x: u16,
    pub y: u16,
    pub level_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityRecord {
    name: String,
    #[serde(with = "hex_key")]
    public_key: [u8; 32],
    position: Option<SavedPosition>,
}

mod hex_key {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let text = String::deserialize(d)?;
        let bytes = hex::decode(&text).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("public key must be 32 bytes"))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    players: Vec<IdentityRecord>,
}

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("i/o error persisting identity registry: {0}")]
    Io(#[from] io::Error),
    #[error("identity registry is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

struct RegistryState {
    by_name: HashMap<String, usize>,
    by_key: HashMap<[u8; 32], usize>,
    records: Vec<IdentityRecord>,
}

impl RegistryState {
    fn from_file(file: RegistryFile) -> Self {
        let mut by_name = HashMap::new();
        let mut by_key = HashMap::new();
        for (idx, record) in file.players.iter().enumerate() {
            by_name.insert(record.name.clone(), idx);
            by_key.insert(record.public_key, idx);
        }
        RegistryState { by_name, by_key, records: file.players }
    }

    fn to_file(&self) -> RegistryFile {
        RegistryFile { players: self.records.clone() }
    }
}

/// The result of a handshake's registry lookup (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Binding {
    /// Neither name nor key were known: a fresh registration.
    New,
    /// Name and key are already bound to each other: a returning player.
    Known,
    /// Name is bound to a different key.
    NameTaken,
    /// Key is bound to a different name.
    KeyMismatch,
}

/// File-backed identity registry. All mutation happens under one coarse
/// lock (`spec.md` §5, §9 "Durable registry"): handshakes are infrequent
/// relative to steady-state traffic, so contention is not a concern.
pub struct IdentityRegistry {
    path: PathBuf,
    state: Mutex<RegistryState>,
}

impl IdentityRegistry {
    /// Loads the registry from `path`, creating an empty one if the file
    /// does not yet exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, IdentityError> {
        let path = path.into();
        let file = match File::open(&path) {
            Ok(file) => serde_json::from_reader(BufReader::new(file))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => RegistryFile::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(IdentityRegistry { path, state: Mutex::new(RegistryState::from_file(file)) })
    }

    /// Classifies `(name, public_key)` per the handshake acceptance rule in
    /// `spec.md` §4.2, without mutating anything.
    pub fn check(&self, name: &str, public_key: &[u8; 32]) -> Binding {
        let state = self.state.lock().unwrap();
        let by_name = state.by_name.get(name).map(|&i| &state.records[i]);
        match by_name {
            None if !state.by_key.contains_key(public_key) => Binding::New,
            None => Binding::KeyMismatch,
            Some(record) if record.public_key == *public_key => Binding::Known,
            Some(_) => Binding::NameTaken,
        }
    }

    /// Atomically checks and, if `Binding::New`, registers `(name,
    /// public_key)`, persisting the registry. This is the only mutating
    /// entry point: the whole check-then-register sequence happens under
    /// one lock acquisition, so concurrent handshakes for the same name or
    /// key cannot both win.
    pub fn register(&self, name: &str, public_key: &[u8; 32]) -> Result<Binding, IdentityError> {
        let mut state = self.state.lock().unwrap();
        if let Some(&idx) = state.by_name.get(name) {
            return Ok(if state.records[idx].public_key == *public_key {
                Binding::Known
            } else {
                Binding::NameTaken
            });
        }
        if state.by_key.contains_key(public_key) {
            return Ok(Binding::KeyMismatch);
        }
        let idx = state.records.len();
        state.records.push(IdentityRecord { name: name.to_owned(), public_key: *public_key, position: None });
        state.by_name.insert(name.to_owned(), idx);
        state.by_key.insert(*public_key, idx);
        self.persist(&state)?;
        Ok(Binding::New)
    }

    pub fn get_key_by_name(&self, name: &str) -> Option<[u8; 32]> {
        let state = self.state.lock().unwrap();
        state.by_name.get(name).map(|&i| state.records[i].public_key)
    }

    pub fn get_name_by_key(&self, public_key: &[u8; 32]) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.by_key.get(public_key).map(|&i| state.records[i].name.clone())
    }

    /// Saves `(x, y, level_name)` as the name's last-known position.
    pub fn save_position(&self, name: &str, x: u16, y: u16, level_name: &str) -> Result<(), IdentityError> {
        let mut state = self.state.lock().unwrap();
        if let Some(&idx) = state.by_name.get(name) {
            state.records[idx].position =
                Some(SavedPosition { x, y, level_name: level_name.to_owned() });
            self.persist(&state)?;
        }
        Ok(())
    }

    pub fn load_position(&self, name: &str) -> Option<SavedPosition> {
        let state = self.state.lock().unwrap();
        state.by_name.get(name).and_then(|&i| state.records[i].position.clone())
    }

    fn persist(&self, state: &RegistryState) -> Result<(), IdentityError> {
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let tmp_file = File::create(&tmp_path)?;
            serde_json::to_writer_pretty(BufWriter::new(tmp_file), &state.to_file())?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Convenience constructor for tests: a registry backed by a path inside a
/// caller-owned temp directory.
pub fn open_in(dir: &Path, filename: &str) -> Result<IdentityRegistry, IdentityError> {
    IdentityRegistry::open(dir.join(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_registry() -> (tempfile::TempDir, IdentityRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(dir.path(), "identities.json").unwrap();
        (dir, registry)
    }

    #[test]
    fn fresh_name_and_key_register_as_new() {
        let (_dir, registry) = tmp_registry();
        assert_eq!(registry.register("alice", &[1u8; 32]).unwrap(), Binding::New);
        assert_eq!(registry.get_key_by_name("alice"), Some([1u8; 32]));
    }

    #[test]
    fn returning_player_is_known() {
        let (_dir, registry) = tmp_registry();
        registry.register("alice", &[1u8; 32]).unwrap();
        assert_eq!(registry.check("alice", &[1u8; 32]), Binding::Known);
    }

    #[test]
    fn name_bound_to_different_key_is_taken() {
        let (_dir, registry) = tmp_registry();
        registry.register("alice", &[1u8; 32]).unwrap();
        assert_eq!(registry.check("alice", &[2u8; 32]), Binding::NameTaken);
    }

    #[test]
    fn key_bound_to_different_name_is_mismatch() {
        let (_dir, registry) = tmp_registry();
        registry.register("alice", &[1u8; 32]).unwrap();
        assert_eq!(registry.check("bob", &[1u8; 32]), Binding::KeyMismatch);
    }

    #[test]
    fn second_register_for_same_name_is_idempotent_and_does_not_duplicate() {
        let (_dir, registry) = tmp_registry();
        registry.register("alice", &[1u8; 32]).unwrap();
        assert_eq!(registry.register("alice", &[1u8; 32]).unwrap(), Binding::Known);
    }

    #[test]
    fn position_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = open_in(dir.path(), "identities.json").unwrap();
            registry.register("alice", &[1u8; 32]).unwrap();
            registry.save_position("alice", 5, 6, "main").unwrap();
        }
        let reopened = open_in(dir.path(), "identities.json").unwrap();
        assert_eq!(
            reopened.load_position("alice"),
            Some(SavedPosition { x: 5, y: 6, level_name: "main".into() })
        );
    }
}
