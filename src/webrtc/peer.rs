//! WebRTC peer connection management
//!
//! webrtc-rs implementation of the [`MediaTransport`] adapter.

use async_trait::async_trait;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecParameters, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use super::config::WebRtcConfig;
use super::signaling::{ConnectionState, IceCandidate, SdpType, SessionDescription};
use super::track::{video_codec_capability, ForwardingTrack, RtcRemoteTrack};
use super::transport::{
    LocalTrack, MediaTransport, OnLocalCandidate, OnRemoteTrack, OnStateChange, PeerConnection,
    PeerId, RemoteTrack, TransportError, TransportResult,
};

/// Media transport backed by webrtc-rs
///
/// The media engine only registers the configured video codec, so whatever a
/// broadcaster negotiates always matches the forwarding track's codec.
pub struct RtcTransport {
    config: WebRtcConfig,
    api: API,
}

impl RtcTransport {
    /// Create the transport and its shared WebRTC API
    pub fn new(config: WebRtcConfig) -> TransportResult<Self> {
        let mut media_engine = MediaEngine::default();

        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: video_codec_capability(config.video_codec),
                    payload_type: config.video_codec.payload_type(),
                    ..Default::default()
                },
                RTPCodecType::Video,
            )
            .map_err(|e| TransportError::CreatePeer(format!("Failed to register codec: {}", e)))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).map_err(|e| {
            TransportError::CreatePeer(format!("Failed to register interceptors: {}", e))
        })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        info!(
            "WebRTC transport initialized (codec: {}, {} STUN, {} TURN)",
            config.video_codec,
            config.stun_servers.len(),
            config.turn_servers.len()
        );

        Ok(Self { config, api })
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        let mut ice_servers = vec![];

        for stun_url in &self.config.stun_servers {
            ice_servers.push(RTCIceServer {
                urls: vec![stun_url.clone()],
                ..Default::default()
            });
        }

        for turn in &self.config.turn_servers {
            ice_servers.push(RTCIceServer {
                urls: turn.urls.clone(),
                username: turn.username.clone(),
                credential: turn.credential.clone(),
                ..Default::default()
            });
        }

        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }

    fn pli_interval(&self) -> Option<Duration> {
        match self.config.pli_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

#[async_trait]
impl MediaTransport for RtcTransport {
    async fn create_peer_connection(&self) -> TransportResult<Arc<dyn PeerConnection>> {
        let pc = self
            .api
            .new_peer_connection(self.rtc_configuration())
            .await
            .map_err(|e| TransportError::CreatePeer(e.to_string()))?;

        let peer = RtcPeerConnection {
            id: PeerId::new(),
            pc: Arc::new(pc),
            pli_interval: self.pli_interval(),
        };
        debug!("Peer connection {} created", peer.id);

        Ok(Arc::new(peer))
    }

    fn create_forwarding_track(&self) -> TransportResult<Arc<dyn LocalTrack>> {
        Ok(Arc::new(ForwardingTrack::new(self.config.video_codec)))
    }
}

/// Peer connection wrapper
pub struct RtcPeerConnection {
    id: PeerId,
    pc: Arc<RTCPeerConnection>,
    pli_interval: Option<Duration>,
}

#[async_trait]
impl PeerConnection for RtcPeerConnection {
    fn id(&self) -> &PeerId {
        &self.id
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> TransportResult<()> {
        let desc = to_rtc_description(desc)?;
        self.pc.set_remote_description(desc).await.map_err(|e| {
            TransportError::Negotiation(format!("Failed to set remote description: {}", e))
        })
    }

    async fn create_answer(&self) -> TransportResult<SessionDescription> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| TransportError::Negotiation(format!("Failed to create answer: {}", e)))?;
        from_rtc_description(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> TransportResult<()> {
        let desc = to_rtc_description(desc)?;
        self.pc.set_local_description(desc).await.map_err(|e| {
            TransportError::Negotiation(format!("Failed to set local description: {}", e))
        })
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> TransportResult<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };

        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| TransportError::Candidate(e.to_string()))
    }

    async fn add_track(&self, track: Arc<dyn LocalTrack>) -> TransportResult<()> {
        let forwarding = track
            .as_any()
            .downcast_ref::<ForwardingTrack>()
            .ok_or_else(|| {
                TransportError::Track(format!("Track {} was not created by this transport", track.id()))
            })?;

        let rtp_track: Arc<dyn TrackLocal + Send + Sync> = forwarding.rtp_track();
        let sender = self
            .pc
            .add_track(rtp_track)
            .await
            .map_err(|e| TransportError::Track(e.to_string()))?;

        // Incoming RTCP must be drained for the interceptors (NACK, reports) to run
        let peer_id = self.id.clone();
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while sender.read(&mut rtcp_buf).await.is_ok() {}
            debug!("RTCP reader for peer {} stopped", peer_id);
        });

        Ok(())
    }

    fn on_local_candidate(&self, handler: OnLocalCandidate) {
        let peer_id = self.id.clone();
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                if let Some(c) = candidate {
                    match c.to_json() {
                        Ok(init) => {
                            debug!("Peer {} local ICE candidate: {}", peer_id, init.candidate);
                            handler(IceCandidate {
                                candidate: init.candidate,
                                sdp_mid: init.sdp_mid,
                                sdp_mline_index: init.sdp_mline_index,
                                username_fragment: init.username_fragment,
                            });
                        }
                        Err(e) => warn!("Peer {} failed to encode ICE candidate: {}", peer_id, e),
                    }
                }
                Box::pin(async {})
            }));
    }

    fn on_remote_track(&self, handler: OnRemoteTrack) {
        let peer_id = self.id.clone();
        let pc = Arc::downgrade(&self.pc);
        let pli_interval = self.pli_interval;

        self.pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let remote = RtcRemoteTrack::new(track);
                info!(
                    "Peer {} got remote track: {}, SSRC: {}",
                    peer_id,
                    remote.id(),
                    remote.ssrc()
                );

                if let Some(interval) = pli_interval {
                    spawn_pli_sender(pc.clone(), remote.ssrc(), interval);
                }

                handler(Arc::new(remote));
                Box::pin(async {})
            },
        ));
    }

    fn on_connection_state_change(&self, handler: OnStateChange) {
        let peer_id = self.id.clone();
        self.pc
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let state = match s {
                    RTCPeerConnectionState::New => Some(ConnectionState::New),
                    RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
                    RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
                    RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
                    RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
                    RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
                    _ => None,
                };

                if let Some(state) = state {
                    info!("Peer {} connection state: {}", peer_id, state);
                    handler(state);
                }
                Box::pin(async {})
            }));
    }

    async fn close(&self) -> TransportResult<()> {
        self.pc
            .close()
            .await
            .map_err(|e| TransportError::Close(e.to_string()))
    }
}

/// Periodically ask the broadcaster for a keyframe so new viewers can start decoding
fn spawn_pli_sender(pc: Weak<RTCPeerConnection>, media_ssrc: u32, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let Some(pc) = pc.upgrade() else {
                break;
            };
            let pli = PictureLossIndication {
                sender_ssrc: 0,
                media_ssrc,
            };
            if let Err(e) = pc.write_rtcp(&[Box::new(pli)]).await {
                debug!("PLI sender for SSRC {} stopped: {}", media_ssrc, e);
                break;
            }
        }
    });
}

fn to_rtc_description(desc: SessionDescription) -> TransportResult<RTCSessionDescription> {
    let parsed = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp),
        SdpType::Rollback => {
            return Err(TransportError::Negotiation(
                "Rollback descriptions are not supported".to_string(),
            ))
        }
    };
    parsed.map_err(|e| TransportError::Negotiation(format!("Invalid SDP: {}", e)))
}

fn from_rtc_description(desc: RTCSessionDescription) -> TransportResult<SessionDescription> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        _ => {
            return Err(TransportError::Negotiation(
                "Unspecified SDP type".to_string(),
            ))
        }
    };

    Ok(SessionDescription {
        sdp_type,
        sdp: desc.sdp,
    })
}
