//! TOML-backed configuration, one struct per binary, each with a
//! `Default` impl and a `load` function (`spec.md` §6: "Server listen
//! host/port, levels directory, data directory, SFU URL, SFU key/secret").
//!
//! Grounded on `game::core::config::GameConfig`: a nested `*Config` struct
//! loaded with `serdeconv::from_toml_file`, falling back to `Default` when
//! no file is given, generalized from the teacher's single server-only
//! config to one struct per binary (`rt_server`, `rt_client`, `rt_bot`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Port the teacher's own `GameConfig::DEFAULT_PORT` bound; repurposed
/// here as this crate's default listen port.
pub const DEFAULT_PORT: u16 = 28008;

/// Keep-alive cadence (`spec.md` §4.2): a `PING` every 10 s, session closed
/// with `TIMEOUT` after 30 s without a `PONG`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTuning {
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_pong_timeout_secs")]
    pub pong_timeout_secs: u64,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: u32,
}

fn default_ping_interval_secs() -> u64 {
    10
}

fn default_pong_timeout_secs() -> u64 {
    30
}

fn default_max_frame_bytes() -> u32 {
    crate::wire::DEFAULT_MAX_FRAME_BYTES
}

impl Default for SessionTuning {
    fn default() -> Self {
        SessionTuning {
            ping_interval_secs: default_ping_interval_secs(),
            pong_timeout_secs: default_pong_timeout_secs(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// SFU connection details (`spec.md` §6). `api_secret_file` follows the
/// "paths-to-files indirection recommended" guidance rather than embedding
/// the secret in the TOML file directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SfuConfig {
    #[serde(default = "default_sfu_url")]
    pub url: String,
    #[serde(default = "default_sfu_api_key")]
    pub api_key: String,
    #[serde(default = "default_sfu_api_secret_file")]
    pub api_secret_file: PathBuf,
    #[serde(default = "default_room_name")]
    pub room_name: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
}

fn default_sfu_url() -> String {
    "ws://127.0.0.1:7880".to_owned()
}

fn default_sfu_api_key() -> String {
    "devkey".to_owned()
}

fn default_sfu_api_secret_file() -> PathBuf {
    PathBuf::from("sfu_api_secret.key")
}

fn default_room_name() -> String {
    "rogue-talk".to_owned()
}

fn default_token_ttl_secs() -> i64 {
    3600
}

impl Default for SfuConfig {
    fn default() -> Self {
        SfuConfig {
            url: default_sfu_url(),
            api_key: default_sfu_api_key(),
            api_secret_file: default_sfu_api_secret_file(),
            room_name: default_room_name(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerNetConfig {
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    #[serde(default = "default_port")]
    pub listen_port: u16,
}

fn default_listen_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerNetConfig {
    fn default() -> Self {
        ServerNetConfig { listen_host: default_listen_host(), listen_port: default_port() }
    }
}

/// `rt_server`'s configuration (`spec.md` §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerNetConfig,
    #[serde(default = "default_levels_dir")]
    pub levels_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub sfu: SfuConfig,
    #[serde(default)]
    pub session: SessionTuning,
}

fn default_levels_dir() -> PathBuf {
    PathBuf::from("levels")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl ServerConfig {
    /// Loads from `path`, falling back to `Default::default()` if the file
    /// does not exist; a malformed file is still an error.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        load_or_default(path)
    }

    pub fn identities_path(&self) -> PathBuf {
        self.data_dir.join("identities.json")
    }
}

/// `rt_client`'s configuration: server address, disk cache root, identity
/// key file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_port")]
    pub server_port: u16,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_keyfile")]
    pub keyfile: PathBuf,
    #[serde(default)]
    pub session: SessionTuning,
}

fn default_server_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("level_cache")
}

fn default_keyfile() -> PathBuf {
    PathBuf::from("identity.key")
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server_host: default_server_host(),
            server_port: default_port(),
            cache_dir: default_cache_dir(),
            keyfile: default_keyfile(),
            session: SessionTuning::default(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        load_or_default(path)
    }
}

/// `rt_bot`'s configuration: same connection shape as the client, plus a
/// fixed bot name (bots do not prompt for one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_port")]
    pub server_port: u16,
    #[serde(default = "default_bot_name")]
    pub name: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_keyfile")]
    pub keyfile: PathBuf,
    #[serde(default)]
    pub session: SessionTuning,
}

fn default_bot_name() -> String {
    "bot".to_owned()
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            server_host: default_server_host(),
            server_port: default_port(),
            name: default_bot_name(),
            cache_dir: default_cache_dir(),
            keyfile: default_keyfile(),
            session: SessionTuning::default(),
        }
    }
}

impl BotConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        load_or_default(path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("i/o error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML config: {0}")]
    Toml(#[from] serdeconv::Error),
}

fn load_or_default<T: Default + for<'de> Deserialize<'de>>(path: &std::path::Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Ok(T::default());
    }
    serdeconv::from_toml_file(path).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.server.listen_port, DEFAULT_PORT);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "levels_dir = \"my-levels\"\n").unwrap();
        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.levels_dir, PathBuf::from("my-levels"));
        assert_eq!(config.server.listen_port, DEFAULT_PORT);
    }
}
