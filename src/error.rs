use thiserror::Error;

use crate::webrtc::TransportError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebRTC error: {0}")]
    WebRtc(#[from] TransportError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
