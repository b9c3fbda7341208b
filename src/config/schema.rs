use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use crate::webrtc::config::{TurnServer, VideoCodec, WebRtcConfig};

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server settings
    pub web: WebConfig,
    /// WebRTC transport settings
    pub webrtc: WebRtcConfig,
    /// Signaling channel settings
    pub signaling: SignalingConfig,
}

/// Web server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub bind_address: String,
    /// HTTP port
    pub http_port: u16,
    /// Directory served at `/` (the demo page lives here)
    pub static_dir: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: 8080,
            static_dir: "static".to_string(),
        }
    }
}

/// Upper bound accepted for the heartbeat interval and idle timeout (one day)
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Signaling channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Interval between WebSocket pings
    pub heartbeat_interval_secs: u64,
    /// A client with no inbound frame for this long is disconnected
    ///
    /// Only inbound frames count as activity. Writing a ping does not, so a
    /// client that stops answering pings with pongs times out here even
    /// while the heartbeat writes keep succeeding.
    pub idle_timeout_secs: u64,
    /// Upper bound on candidates buffered before the offer is applied
    pub max_pending_candidates: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 15,
            idle_timeout_secs: 60,
            max_pending_candidates: 64,
        }
    }
}

impl SignalingConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
