//! Client-side mirror runtime (`spec.md` §4.7): drives the same session
//! protocol as the server, predicting movement locally and rolling back on
//! rejection, caching level files by content hash, and exposing callbacks a
//! real terminal UI (out of scope here) would hook into.
//!
//! `rt_client` links `rt_core` directly for the wire codec, crypto, and
//! voice token shapes; it adds nothing to the wire format, only a local
//! mirror of the state the server is authoritative over.

pub mod cache;
pub mod connection;
pub mod error;
pub mod events;
pub mod identity;
pub mod level_mirror;
pub mod prediction;
pub mod proximity;
