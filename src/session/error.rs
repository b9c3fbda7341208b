use std::time::Duration;
use thiserror::Error;

use crate::webrtc::TransportError;

/// How far an error reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Reply with an error; session state is unchanged
    Recoverable,
    /// Drop the session's media, keep the channel open
    SessionFatal,
    /// Close the channel
    ChannelFatal,
}

/// Signaling session errors
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("{0} is missing")]
    MissingField(&'static str),

    #[error("join before sending {0}")]
    NotJoined(&'static str),

    #[error("already have broadcast")]
    BroadcastActive,

    #[error("broadcast not ready yet")]
    NoBroadcast,

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("no activity for {0:?}")]
    IdleTimeout(Duration),
}

impl SignalingError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingField(_) | Self::NotJoined(_) => Severity::Recoverable,
            Self::BroadcastActive | Self::NoBroadcast | Self::Transport(_) => {
                Severity::SessionFatal
            }
            Self::Malformed(_) | Self::Channel(_) | Self::IdleTimeout(_) => Severity::ChannelFatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, SignalingError>;
