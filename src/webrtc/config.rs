//! WebRTC configuration

use serde::{Deserialize, Serialize};

/// Public STUN server used when nothing else is configured
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// WebRTC configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRtcConfig {
    /// STUN server URLs
    pub stun_servers: Vec<String>,
    /// TURN server configuration
    pub turn_servers: Vec<TurnServer>,
    /// Codec of the forwarded video track; broadcasters must publish this codec
    pub video_codec: VideoCodec,
    /// Keyframe request interval for the broadcaster's inbound track (ms, 0 disables)
    pub pli_interval_ms: u64,
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            turn_servers: vec![],
            video_codec: VideoCodec::VP8,
            pli_interval_ms: 3000,
        }
    }
}

impl WebRtcConfig {
    /// ICE servers as advertised to browser clients
    pub fn ice_servers(&self) -> Vec<IceServer> {
        let mut servers: Vec<IceServer> = self
            .stun_servers
            .iter()
            .map(|url| IceServer {
                urls: vec![url.clone()],
                username: None,
                credential: None,
            })
            .collect();

        for turn in &self.turn_servers {
            servers.push(IceServer {
                urls: turn.urls.clone(),
                username: Some(turn.username.clone()),
                credential: Some(turn.credential.clone()),
            });
        }

        servers
    }
}

/// TURN server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnServer {
    /// TURN server URLs (e.g., ["turn:turn.example.com:3478?transport=udp", "turn:turn.example.com:3478?transport=tcp"])
    pub urls: Vec<String>,
    /// Username for TURN authentication
    pub username: String,
    /// Credential for TURN authentication
    pub credential: String,
}

impl TurnServer {
    pub fn new(url: String, username: String, credential: String) -> Self {
        Self {
            urls: vec![url],
            username,
            credential,
        }
    }
}

/// ICE server entry in the browser `RTCIceServer` shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Video codec of the forwarded track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    #[default]
    VP8,
    VP9,
}

impl VideoCodec {
    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "video/H264",
            VideoCodec::VP8 => "video/VP8",
            VideoCodec::VP9 => "video/VP9",
        }
    }

    pub fn sdp_fmtp(&self) -> &'static str {
        match self {
            VideoCodec::H264 => {
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
            }
            VideoCodec::VP8 => "",
            VideoCodec::VP9 => "profile-id=0",
        }
    }

    /// Dynamic RTP payload type registered for this codec
    pub fn payload_type(&self) -> u8 {
        match self {
            VideoCodec::VP8 => 96,
            VideoCodec::VP9 => 98,
            VideoCodec::H264 => 102,
        }
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoCodec::H264 => write!(f, "H.264"),
            VideoCodec::VP8 => write!(f, "VP8"),
            VideoCodec::VP9 => write!(f, "VP9"),
        }
    }
}
