//! Configuration
//!
//! Settings come from built-in defaults, optionally overlaid by a JSON file.
//! Command line overrides are applied by the binary afterwards.

mod schema;

pub use schema::*;

use std::path::Path;

use crate::error::{AppError, Result};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "BROADCAST_RELAY_CONFIG";

impl AppConfig {
    /// Load configuration from a JSON file
    ///
    /// Sections and fields missing from the file keep their defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = serde_json::from_str(&text)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `path` if given, otherwise fall back to defaults
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None => Ok(Self::default()),
        }
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.web.http_port == 0 {
            return Err(AppError::Config("http_port must not be 0".to_string()));
        }
        if self.signaling.heartbeat_interval_secs == 0 {
            return Err(AppError::Config(
                "heartbeat_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.signaling.idle_timeout_secs > MAX_TIMEOUT_SECS {
            return Err(AppError::Config(format!(
                "idle_timeout_secs ({}) must not exceed {}",
                self.signaling.idle_timeout_secs, MAX_TIMEOUT_SECS
            )));
        }
        if self.signaling.idle_timeout_secs <= self.signaling.heartbeat_interval_secs {
            return Err(AppError::Config(format!(
                "idle_timeout_secs ({}) must be larger than heartbeat_interval_secs ({})",
                self.signaling.idle_timeout_secs, self.signaling.heartbeat_interval_secs
            )));
        }
        for turn in &self.webrtc.turn_servers {
            if turn.urls.is_empty() {
                return Err(AppError::Config("TURN server without URLs".to_string()));
            }
        }
        Ok(())
    }
}
