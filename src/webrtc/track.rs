//! WebRTC track implementations for the relay

use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use webrtc::rtp::packet::Packet;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::RTCPFeedback;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocalWriter;
use webrtc::track::track_remote::TrackRemote;

use super::config::VideoCodec;
use super::transport::{LocalTrack, MediaKind, RemoteTrack, TrackId, TransportError, TransportResult};

/// Stream ID shared by every forwarded track
pub const FORWARD_STREAM_ID: &str = "broadcast-relay";

/// Video clock rate for all supported codecs
const VIDEO_CLOCK_RATE: u32 = 90000;

/// RTCP feedback advertised for the forwarded codec
pub fn video_rtcp_feedback() -> Vec<RTCPFeedback> {
    vec![
        RTCPFeedback {
            typ: "goog-remb".to_string(),
            parameter: String::new(),
        },
        RTCPFeedback {
            typ: "ccm".to_string(),
            parameter: "fir".to_string(),
        },
        RTCPFeedback {
            typ: "nack".to_string(),
            parameter: String::new(),
        },
        RTCPFeedback {
            typ: "nack".to_string(),
            parameter: "pli".to_string(),
        },
    ]
}

/// Create RTP codec capability for video
pub fn video_codec_capability(codec: VideoCodec) -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: codec.mime_type().to_string(),
        clock_rate: VIDEO_CLOCK_RATE,
        channels: 0,
        sdp_fmtp_line: codec.sdp_fmtp().to_string(),
        rtcp_feedback: video_rtcp_feedback(),
    }
}

/// Outbound track the broadcaster's packets are copied into
///
/// One instance exists per active broadcast; every viewer peer connection
/// binds the same `TrackLocalStaticRTP`.
pub struct ForwardingTrack {
    id: TrackId,
    codec: VideoCodec,
    track: Arc<TrackLocalStaticRTP>,
}

impl ForwardingTrack {
    pub fn new(codec: VideoCodec) -> Self {
        let id = TrackId::new("video");
        let track = Arc::new(TrackLocalStaticRTP::new(
            video_codec_capability(codec),
            id.as_str().to_string(),
            FORWARD_STREAM_ID.to_string(),
        ));

        Self { id, codec, track }
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /// Get the underlying RTP track
    pub fn rtp_track(&self) -> Arc<TrackLocalStaticRTP> {
        self.track.clone()
    }
}

#[async_trait]
impl LocalTrack for ForwardingTrack {
    fn id(&self) -> &TrackId {
        &self.id
    }

    async fn write_packet(&self, packet: &Packet) -> TransportResult<()> {
        match self.track.write_rtp(packet).await {
            Ok(_) => Ok(()),
            Err(webrtc::Error::ErrClosedPipe) => Err(TransportError::NoReaders),
            Err(e) => Err(TransportError::Media(e.to_string())),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Inbound track from the broadcaster's peer connection
pub struct RtcRemoteTrack {
    track: Arc<TrackRemote>,
}

impl RtcRemoteTrack {
    pub fn new(track: Arc<TrackRemote>) -> Self {
        Self { track }
    }

    pub fn ssrc(&self) -> u32 {
        self.track.ssrc()
    }
}

#[async_trait]
impl RemoteTrack for RtcRemoteTrack {
    fn id(&self) -> String {
        self.track.id()
    }

    fn kind(&self) -> MediaKind {
        match self.track.kind() {
            RTPCodecType::Audio => MediaKind::Audio,
            _ => MediaKind::Video,
        }
    }

    async fn read_packet(&self) -> TransportResult<Packet> {
        match self.track.read_rtp().await {
            Ok((packet, _)) => Ok(packet),
            Err(e) if is_end_of_stream(&e) => Err(TransportError::EndOfStream),
            Err(e) => Err(TransportError::Media(e.to_string())),
        }
    }
}

/// Whether a read error means the remote stream ended rather than failed
fn is_end_of_stream(err: &webrtc::Error) -> bool {
    matches!(
        err,
        webrtc::Error::ErrClosedPipe | webrtc::Error::ErrConnectionClosed
    ) || err.to_string().contains("EOF")
}
