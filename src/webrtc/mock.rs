//! In-memory media transport for tests
//!
//! Records every adapter call and lets tests fire the transport callbacks by hand.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::rtp::header::Header;
use webrtc::rtp::packet::Packet;

use super::signaling::{ConnectionState, IceCandidate, SdpType, SessionDescription};
use super::transport::{
    LocalTrack, MediaKind, MediaTransport, OnLocalCandidate, OnRemoteTrack, OnStateChange,
    PeerConnection, PeerId, RemoteTrack, TrackId, TransportError, TransportResult,
};

/// Build an RTP packet with the given sequence number and payload
pub fn packet(seq: u16, payload: &[u8]) -> Packet {
    Packet {
        header: Header {
            sequence_number: seq,
            ..Default::default()
        },
        payload: Bytes::copy_from_slice(payload),
    }
}

/// Adapter call recorded by [`MockPeer`]
#[derive(Debug, Clone, PartialEq)]
pub enum PeerCall {
    SetRemote(SdpType),
    CreateAnswer,
    SetLocal(SdpType),
    AddCandidate(String),
    AddTrack(TrackId),
    Close,
}

#[derive(Default)]
pub struct MockTransport {
    pub fail_create: AtomicBool,
    pub fail_remote_description: AtomicBool,
    pub fail_local_description: AtomicBool,
    pub fail_candidates: AtomicBool,
    peers: Mutex<Vec<Arc<MockPeer>>>,
    tracks: Mutex<Vec<Arc<MockLocalTrack>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn peers(&self) -> Vec<Arc<MockPeer>> {
        self.peers.lock().clone()
    }

    pub fn tracks(&self) -> Vec<Arc<MockLocalTrack>> {
        self.tracks.lock().clone()
    }
}

#[async_trait]
impl MediaTransport for MockTransport {
    async fn create_peer_connection(&self) -> TransportResult<Arc<dyn PeerConnection>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(TransportError::CreatePeer("mock failure".to_string()));
        }

        let peer = Arc::new(MockPeer {
            id: PeerId::new(),
            calls: Mutex::new(Vec::new()),
            fail_remote_description: self.fail_remote_description.load(Ordering::SeqCst),
            fail_local_description: self.fail_local_description.load(Ordering::SeqCst),
            fail_candidates: self.fail_candidates.load(Ordering::SeqCst),
            on_candidate: Mutex::new(None),
            on_track: Mutex::new(None),
            on_state: Mutex::new(None),
            closes: AtomicUsize::new(0),
        });
        self.peers.lock().push(peer.clone());
        Ok(peer)
    }

    fn create_forwarding_track(&self) -> TransportResult<Arc<dyn LocalTrack>> {
        let track = Arc::new(MockLocalTrack::new());
        self.tracks.lock().push(track.clone());
        Ok(track)
    }
}

pub struct MockPeer {
    id: PeerId,
    calls: Mutex<Vec<PeerCall>>,
    fail_remote_description: bool,
    fail_local_description: bool,
    fail_candidates: bool,
    on_candidate: Mutex<Option<OnLocalCandidate>>,
    on_track: Mutex<Option<OnRemoteTrack>>,
    on_state: Mutex<Option<OnStateChange>>,
    closes: AtomicUsize,
}

impl MockPeer {
    pub fn calls(&self) -> Vec<PeerCall> {
        self.calls.lock().clone()
    }

    /// Candidates applied to this peer, in order
    pub fn candidates(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                PeerCall::AddCandidate(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn emit_local_candidate(&self, candidate: IceCandidate) {
        if let Some(handler) = self.on_candidate.lock().as_ref() {
            handler(candidate);
        }
    }

    pub fn emit_remote_track(&self, track: Arc<dyn RemoteTrack>) {
        if let Some(handler) = self.on_track.lock().as_ref() {
            handler(track);
        }
    }

    pub fn emit_state(&self, state: ConnectionState) {
        if let Some(handler) = self.on_state.lock().as_ref() {
            handler(state);
        }
    }

    fn record(&self, call: PeerCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    fn id(&self) -> &PeerId {
        &self.id
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> TransportResult<()> {
        self.record(PeerCall::SetRemote(desc.sdp_type));
        if self.fail_remote_description {
            return Err(TransportError::Negotiation("mock failure".to_string()));
        }
        Ok(())
    }

    async fn create_answer(&self) -> TransportResult<SessionDescription> {
        self.record(PeerCall::CreateAnswer);
        Ok(SessionDescription::answer(format!("answer-{}", self.id)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> TransportResult<()> {
        self.record(PeerCall::SetLocal(desc.sdp_type));
        if self.fail_local_description {
            return Err(TransportError::Negotiation("mock failure".to_string()));
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> TransportResult<()> {
        if self.fail_candidates {
            return Err(TransportError::Candidate("mock failure".to_string()));
        }
        self.record(PeerCall::AddCandidate(candidate.candidate));
        Ok(())
    }

    async fn add_track(&self, track: Arc<dyn LocalTrack>) -> TransportResult<()> {
        self.record(PeerCall::AddTrack(track.id().clone()));
        Ok(())
    }

    fn on_local_candidate(&self, handler: OnLocalCandidate) {
        *self.on_candidate.lock() = Some(handler);
    }

    fn on_remote_track(&self, handler: OnRemoteTrack) {
        *self.on_track.lock() = Some(handler);
    }

    fn on_connection_state_change(&self, handler: OnStateChange) {
        *self.on_state.lock() = Some(handler);
    }

    async fn close(&self) -> TransportResult<()> {
        self.record(PeerCall::Close);
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockLocalTrack {
    id: TrackId,
    written: Mutex<Vec<Packet>>,
    pub no_readers: AtomicBool,
    pub fail: AtomicBool,
}

impl MockLocalTrack {
    pub fn new() -> Self {
        Self {
            id: TrackId::new("mock"),
            written: Mutex::new(Vec::new()),
            no_readers: AtomicBool::new(false),
            fail: AtomicBool::new(false),
        }
    }

    pub fn written(&self) -> Vec<Packet> {
        self.written.lock().clone()
    }
}

#[async_trait]
impl LocalTrack for MockLocalTrack {
    fn id(&self) -> &TrackId {
        &self.id
    }

    async fn write_packet(&self, packet: &Packet) -> TransportResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Media("mock write failure".to_string()));
        }
        if self.no_readers.load(Ordering::SeqCst) {
            return Err(TransportError::NoReaders);
        }
        self.written.lock().push(packet.clone());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Remote track fed through a channel; dropping the sender ends the stream
pub struct MockRemoteTrack {
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<TransportResult<Packet>>>,
}

impl MockRemoteTrack {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<TransportResult<Packet>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let track = Arc::new(Self {
            rx: tokio::sync::Mutex::new(rx),
        });
        (track, tx)
    }
}

#[async_trait]
impl RemoteTrack for MockRemoteTrack {
    fn id(&self) -> String {
        "mock-remote".to_string()
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    async fn read_packet(&self) -> TransportResult<Packet> {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .unwrap_or(Err(TransportError::EndOfStream))
    }
}
