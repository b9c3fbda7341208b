//! Broadcast state shared by all sessions
//!
//! - [`registry`]: the single active broadcaster and its outbound track
//! - [`relay`]: the loop copying the broadcaster's packets to that track

pub mod registry;
pub mod relay;

pub use registry::{BroadcastInfo, BroadcastRegistry};
pub use relay::{run_relay, spawn_relay, RelayStats};
