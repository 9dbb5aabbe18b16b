//! Shared, immutable-after-startup handles threaded into every connection
//! thread: the world, the level packs, the identity registry, and the SFU
//! signing secret.

use rt_core::config::ServerConfig;
use rt_core::identity::IdentityRegistry;
use rt_core::level::LevelStore;
use rt_core::world::World;
use slog::Logger;
use std::sync::Arc;

pub struct ServerContext {
    pub config: ServerConfig,
    pub levels: Arc<LevelStore>,
    pub identity: Arc<IdentityRegistry>,
    pub world: Arc<World>,
    pub sfu_api_secret: Vec<u8>,
    pub log: Logger,
}
