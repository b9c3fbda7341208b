//! Per-connection session state

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::webrtc::{ConnectionState, IceCandidate, PeerConnection, PeerId, Role, SignalingMessage};

/// Frame queued for the connection's writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Signal(SignalingMessage),
    /// Heartbeat probe
    Ping,
}

/// Sending half of a connection's outbound queue
///
/// Cloned into transport callbacks so they can reply without touching the session.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a message; returns `false` once the writer is gone
    pub fn send(&self, msg: SignalingMessage) -> bool {
        self.tx.send(Outbound::Signal(msg)).is_ok()
    }

    pub fn ping(&self) -> bool {
        self.tx.send(Outbound::Ping).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Event posted to the driver from transport callbacks
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PeerState { peer: PeerId, state: ConnectionState },
}

/// Negotiation progress of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, no role yet
    Unassigned,
    /// Role set, no offer yet (or media torn down)
    Joined,
    /// Offer received, negotiation in progress
    Establishing,
    AnswerSent,
    /// Media flowing
    Connected,
    Closed,
}

/// State of one signaling connection
///
/// Owned by the connection driver and only mutated from its loop.
pub struct ClientSession {
    pub(super) id: String,
    pub(super) address: String,
    pub(super) role: Option<Role>,
    pub(super) phase: SessionPhase,
    pub(super) peer: Option<Arc<dyn PeerConnection>>,
    pub(super) pending_candidates: VecDeque<IceCandidate>,
    pub(super) remote_description_set: bool,
    pub(super) last_activity: Instant,
    pub(super) outbox: Outbox,
    pub(super) events: mpsc::UnboundedSender<SessionEvent>,
}

impl ClientSession {
    pub fn new(
        address: impl Into<String>,
        outbox: Outbox,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            address: address.into(),
            role: None,
            phase: SessionPhase::Unassigned,
            peer: None,
            pending_candidates: VecDeque::new(),
            remote_description_set: false,
            last_activity: Instant::now(),
            outbox,
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn peer_id(&self) -> Option<&PeerId> {
        self.peer.as_ref().map(|peer| peer.id())
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    /// Record inbound activity
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Instant at which the session counts as idle
    ///
    /// A timeout too large to represent never expires.
    pub fn idle_deadline(&self, timeout: Duration) -> Instant {
        self.last_activity
            .checked_add(timeout)
            .unwrap_or_else(far_future)
    }

    /// Queue a reply for the client
    pub fn reply(&self, msg: SignalingMessage) {
        if !self.outbox.send(msg) {
            tracing::debug!("Session {} writer gone, reply dropped", self.id);
        }
    }
}

/// An instant roughly 30 years from now, used in place of "never"
pub(super) fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("role", &self.role)
            .field("phase", &self.phase)
            .field("peer", &self.peer_id())
            .field("pending_candidates", &self.pending_candidates.len())
            .field("remote_description_set", &self.remote_description_set)
            .finish()
    }
}
