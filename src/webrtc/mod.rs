//! WebRTC media transport
//!
//! The relay core only sees the adapter traits in [`transport`]. [`peer`] and
//! [`track`] implement them with webrtc-rs:
//!
//! ```text
//! Broadcaster --RTP--> RtcRemoteTrack --relay--> ForwardingTrack
//!                                                   |  |  |
//!                                   viewer peer connections (shared track)
//! ```
//!
//! [`signaling`] holds the JSON messages exchanged over the WebSocket.

pub mod config;
pub mod peer;
pub mod signaling;
pub mod track;
pub mod transport;

#[cfg(test)]
pub mod mock;

pub use config::{IceServer, TurnServer, VideoCodec, WebRtcConfig};
pub use peer::RtcTransport;
pub use signaling::{ConnectionState, IceCandidate, Role, SessionDescription, SignalingMessage};
pub use track::ForwardingTrack;
pub use transport::{
    LocalTrack, MediaKind, MediaTransport, PeerConnection, PeerId, RemoteTrack, TrackId,
    TransportError, TransportResult,
};
