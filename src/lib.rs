//! broadcast-relay - single-broadcaster WebRTC relay
//!
//! One client publishes a video stream over WebRTC; every other client
//! subscribes to it. Signaling runs over a WebSocket per client, media is
//! forwarded RTP packet by packet through one shared outbound track.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod utils;
pub mod web;
pub mod webrtc;

pub use error::{AppError, Result};
