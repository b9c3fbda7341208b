//! Media transport adapter
//!
//! The relay core never talks to the WebRTC stack directly. It drives peer
//! connections and tracks through the traits below; [`super::peer`] implements
//! them on top of webrtc-rs.

use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use webrtc::rtp::packet::Packet;

use super::signaling::{ConnectionState, IceCandidate, SessionDescription};

/// Identity of a peer connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(String);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a local (outbound) track
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of media carried by a remote track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Media transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to create peer connection: {0}")]
    CreatePeer(String),

    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    #[error("Failed to add ICE candidate: {0}")]
    Candidate(String),

    #[error("Failed to attach track: {0}")]
    Track(String),

    /// Remote track ended normally
    #[error("End of stream")]
    EndOfStream,

    /// Write on a local track that currently has no bound receivers
    #[error("No readers attached to track")]
    NoReaders,

    #[error("Media I/O error: {0}")]
    Media(String),

    #[error("Failed to close peer connection: {0}")]
    Close(String),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Called for every locally gathered ICE candidate
pub type OnLocalCandidate = Box<dyn Fn(IceCandidate) + Send + Sync>;
/// Called when the remote side starts sending a track
pub type OnRemoteTrack = Box<dyn Fn(Arc<dyn RemoteTrack>) + Send + Sync>;
/// Called on every peer connection state transition
pub type OnStateChange = Box<dyn Fn(ConnectionState) + Send + Sync>;

/// A single peer connection
///
/// Handlers are invoked synchronously from the transport's own tasks, so they
/// must not block; they hand work off through channels or `tokio::spawn`.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Stable identity, used for registry ownership checks
    fn id(&self) -> &PeerId;

    async fn set_remote_description(&self, desc: SessionDescription) -> TransportResult<()>;

    async fn create_answer(&self) -> TransportResult<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> TransportResult<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> TransportResult<()>;

    /// Attach a shared outbound track for sending
    async fn add_track(&self, track: Arc<dyn LocalTrack>) -> TransportResult<()>;

    fn on_local_candidate(&self, handler: OnLocalCandidate);

    fn on_remote_track(&self, handler: OnRemoteTrack);

    fn on_connection_state_change(&self, handler: OnStateChange);

    async fn close(&self) -> TransportResult<()>;
}

/// Outbound track written by the relay and read by every attached viewer
#[async_trait]
pub trait LocalTrack: Send + Sync {
    fn id(&self) -> &TrackId;

    /// Forward one RTP packet to all bound receivers
    async fn write_packet(&self, packet: &Packet) -> TransportResult<()>;

    /// Access to the concrete type for the transport that created the track
    fn as_any(&self) -> &dyn Any;
}

/// Inbound track received from the broadcaster
#[async_trait]
pub trait RemoteTrack: Send + Sync {
    fn id(&self) -> String;

    fn kind(&self) -> MediaKind;

    /// Wait for the next RTP packet; [`TransportError::EndOfStream`] once the track ends
    async fn read_packet(&self) -> TransportResult<Packet>;
}

/// Factory for peer connections and forwarding tracks
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn create_peer_connection(&self) -> TransportResult<Arc<dyn PeerConnection>>;

    /// Create the outbound track a broadcaster's media is forwarded into
    fn create_forwarding_track(&self) -> TransportResult<Arc<dyn LocalTrack>>;
}
