//! Top-level binary error, aggregating the layered `rt_core` error enums
//! plus this binary's own startup failures.
//!
//! Grounded on `Masorubka1-iscsi-client-rs`'s top-level error stack: one
//! `thiserror`-derived enum wrapping each layer with `#[from]`, used for
//! `main`'s `Result` return type. None of the teacher's own ECS-lineage
//! crates model a binary-level aggregating error (`t51server::main` just
//! `unwrap()`s), so this one piece is enriched from elsewhere in the
//! corpus rather than grounded on the teacher.

use rt_core::config::ConfigError;
use rt_core::identity::IdentityError;
use rt_core::level::LevelLoadError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to load level packs: {0}")]
    Levels(#[from] LevelLoadError),
    #[error("failed to open identity registry: {0}")]
    Identity(#[from] IdentityError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
