//! Shared core for the spatial voice server: wire codec, identity
//! registry, level packs, authoritative world/movement, the voice token
//! issuer, and the ambient config/logging/error stacks that `rt_server`,
//! `rt_client`, and `rt_bot` all build on.

pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod level;
pub mod logging;
pub mod voice;
pub mod wire;
pub mod world;
