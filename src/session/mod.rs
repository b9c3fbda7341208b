//! Signaling sessions
//!
//! One [`ClientSession`] per WebSocket. The [`ConnectionDriver`] owns it and
//! feeds decoded messages to the [`SignalingHandler`] one at a time.

pub mod client;
pub mod driver;
pub mod error;
pub mod handler;

pub use client::{ClientSession, Outbound, Outbox, SessionEvent, SessionPhase};
pub use driver::{ConnectionDriver, Frame};
pub use error::{Severity, SignalingError};
pub use handler::SignalingHandler;
