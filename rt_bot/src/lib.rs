//! Bot runtime (`spec.md` §4.8): links `rt_client`'s connection and
//! session-mirroring machinery directly, adding 8-directional A*
//! pathfinding, audio-range enter/leave detection, and speaking-timeout
//! detection.

pub mod events;
pub mod pathfinding;
pub mod proximity;
pub mod runtime;
pub mod speaking;
