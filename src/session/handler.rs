//! Signaling state machine
//!
//! Maps each decoded [`SignalingMessage`] onto the session, the broadcast
//! registry and the media transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::client::{ClientSession, SessionEvent, SessionPhase};
use super::error::{Result, Severity, SignalingError};
use crate::broadcast::{spawn_relay, BroadcastRegistry};
use crate::webrtc::{
    ConnectionState, IceCandidate, LocalTrack, MediaTransport, PeerConnection, RemoteTrack, Role,
    SessionDescription, SignalingMessage,
};

/// Applies signaling messages to client sessions
pub struct SignalingHandler {
    transport: Arc<dyn MediaTransport>,
    registry: Arc<BroadcastRegistry>,
    max_pending_candidates: usize,
}

impl SignalingHandler {
    pub fn new(
        transport: Arc<dyn MediaTransport>,
        registry: Arc<BroadcastRegistry>,
        max_pending_candidates: usize,
    ) -> Self {
        Self {
            transport,
            registry,
            max_pending_candidates,
        }
    }

    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    /// Handle one client message
    ///
    /// Recoverable and session-fatal errors are answered with an `error`
    /// message and swallowed. Only channel-fatal errors are returned.
    pub async fn handle_message(
        &self,
        session: &mut ClientSession,
        msg: SignalingMessage,
    ) -> Result<()> {
        debug!("Session {} received {}", session.id, msg.kind());

        let result = match msg {
            SignalingMessage::Join { role } => self.on_join(session, role).await,
            SignalingMessage::Offer { sdp } => self.on_offer(session, sdp).await,
            SignalingMessage::Candidate { candidate } => {
                self.on_candidate(session, candidate).await
            }
            other => {
                debug!("Session {} ignoring {} message", session.id, other.kind());
                Ok(())
            }
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) => self.recover(session, e).await,
        }
    }

    /// Handle an event posted by a transport callback
    pub async fn handle_event(&self, session: &mut ClientSession, event: SessionEvent) {
        match event {
            SessionEvent::PeerState { peer, state } => {
                if session.peer_id() != Some(&peer) {
                    debug!(
                        "Session {} ignoring {} from stale peer {}",
                        session.id, state, peer
                    );
                    return;
                }

                if state.is_terminal() {
                    info!("Session {} peer connection {}", session.id, state);
                    self.teardown_media(session).await;
                } else if state == ConnectionState::Connected {
                    info!("Session {} media connected", session.id);
                    session.phase = SessionPhase::Connected;
                }
            }
        }
    }

    /// Close the session's peer connection and give up the broadcaster slot it holds
    ///
    /// The session keeps its role and may send a new offer.
    pub async fn teardown_media(&self, session: &mut ClientSession) {
        session.pending_candidates.clear();
        session.remote_description_set = false;
        if session.phase != SessionPhase::Closed && session.role.is_some() {
            session.phase = SessionPhase::Joined;
        }

        let Some(peer) = session.peer.take() else {
            return;
        };

        if self.registry.release(peer.id()) {
            info!("Session {} gave up the broadcast", session.id);
        }
        if let Err(e) = peer.close().await {
            warn!("Session {} failed to close peer {}: {}", session.id, peer.id(), e);
        }
    }

    /// Final teardown when the channel goes away; safe to call more than once
    pub async fn close(&self, session: &mut ClientSession) {
        self.teardown_media(session).await;
        session.phase = SessionPhase::Closed;
    }

    async fn recover(&self, session: &mut ClientSession, err: SignalingError) -> Result<()> {
        match err.severity() {
            Severity::Recoverable => {
                warn!("Session {}: {}", session.id, err);
                session.reply(SignalingMessage::error(err.to_string()));
                Ok(())
            }
            Severity::SessionFatal => {
                warn!("Session {} negotiation aborted: {}", session.id, err);
                self.teardown_media(session).await;
                session.reply(SignalingMessage::error(err.to_string()));
                Ok(())
            }
            Severity::ChannelFatal => Err(err),
        }
    }

    async fn on_join(&self, session: &mut ClientSession, role: Option<Role>) -> Result<()> {
        let role = role.ok_or(SignalingError::MissingField("role"))?;
        if session.peer.is_some() {
            self.teardown_media(session).await;
        }

        session.role = Some(role);
        session.phase = SessionPhase::Joined;
        info!("Session {} from {} joined as {}", session.id, session.address, role);

        // Advisory only, the claim at offer time decides
        if role == Role::Broadcaster && self.registry.has_active_broadcast() {
            session.reply(SignalingMessage::error(
                SignalingError::BroadcastActive.to_string(),
            ));
        }
        Ok(())
    }

    async fn on_offer(
        &self,
        session: &mut ClientSession,
        sdp: Option<SessionDescription>,
    ) -> Result<()> {
        let role = session.role.ok_or(SignalingError::NotJoined("offer"))?;
        let offer = sdp.ok_or(SignalingError::MissingField("sdp"))?;

        if session.peer.is_some() {
            debug!("Session {} renegotiating, dropping previous media", session.id);
            self.teardown_media(session).await;
        }
        session.phase = SessionPhase::Establishing;

        let peer = self.transport.create_peer_connection().await?;
        self.register_callbacks(session, &peer);
        session.peer = Some(peer.clone());

        match role {
            Role::Broadcaster => self.claim_broadcast(session, &peer)?,
            Role::Viewer => self.attach_viewer(&peer).await?,
        }

        peer.set_remote_description(offer).await?;
        let answer = peer.create_answer().await?;
        peer.set_local_description(answer.clone()).await?;

        self.flush_candidates(session, peer.as_ref()).await;
        session.remote_description_set = true;

        session.reply(SignalingMessage::answer(answer));
        session.phase = SessionPhase::AnswerSent;
        info!("Session {} answered {} offer", session.id, role);
        Ok(())
    }

    async fn on_candidate(
        &self,
        session: &mut ClientSession,
        candidate: Option<IceCandidate>,
    ) -> Result<()> {
        if session.role.is_none() {
            return Err(SignalingError::NotJoined("candidate"));
        }
        let candidate = candidate.ok_or(SignalingError::MissingField("candidate"))?;

        match session.peer.clone() {
            Some(peer) if session.remote_description_set => {
                apply_candidate(&session.id, peer.as_ref(), candidate).await;
            }
            _ => {
                if session.pending_candidates.len() >= self.max_pending_candidates {
                    warn!(
                        "Session {} pending candidate queue full ({}), dropping candidate",
                        session.id, self.max_pending_candidates
                    );
                } else {
                    session.pending_candidates.push_back(candidate);
                }
            }
        }
        Ok(())
    }

    fn register_callbacks(&self, session: &ClientSession, peer: &Arc<dyn PeerConnection>) {
        let outbox = session.outbox.clone();
        peer.on_local_candidate(Box::new(move |candidate| {
            outbox.send(SignalingMessage::candidate(candidate));
        }));

        let events = session.events.clone();
        let peer_id = peer.id().clone();
        peer.on_connection_state_change(Box::new(move |state| {
            let _ = events.send(SessionEvent::PeerState {
                peer: peer_id.clone(),
                state,
            });
        }));
    }

    /// Claim the registry for this peer and relay its first inbound track
    fn claim_broadcast(
        &self,
        session: &ClientSession,
        peer: &Arc<dyn PeerConnection>,
    ) -> Result<()> {
        let track = self.transport.create_forwarding_track()?;
        if !self.registry.try_claim(peer.clone(), track.clone()) {
            return Err(SignalingError::BroadcastActive);
        }

        let registry = self.registry.clone();
        let session_id = session.id.clone();
        let relaying = AtomicBool::new(false);
        peer.on_remote_track(Box::new(move |remote: Arc<dyn RemoteTrack>| {
            if relaying.swap(true, Ordering::SeqCst) {
                info!(
                    "Session {} ignoring extra remote track {} ({:?})",
                    session_id,
                    remote.id(),
                    remote.kind()
                );
                return;
            }
            let outbound: Arc<dyn LocalTrack> = track.clone();
            spawn_relay(remote, outbound, registry.clone());
        }));

        Ok(())
    }

    async fn attach_viewer(&self, peer: &Arc<dyn PeerConnection>) -> Result<()> {
        let track = self
            .registry
            .broadcast_track()
            .ok_or(SignalingError::NoBroadcast)?;
        peer.add_track(track).await?;
        Ok(())
    }

    async fn flush_candidates(&self, session: &mut ClientSession, peer: &dyn PeerConnection) {
        if !session.pending_candidates.is_empty() {
            debug!(
                "Session {} applying {} queued candidates",
                session.id,
                session.pending_candidates.len()
            );
        }
        while let Some(candidate) = session.pending_candidates.pop_front() {
            apply_candidate(&session.id, peer, candidate).await;
        }
    }
}

async fn apply_candidate(session_id: &str, peer: &dyn PeerConnection, candidate: IceCandidate) {
    if let Err(e) = peer.add_ice_candidate(candidate).await {
        warn!("Session {} cannot add ICE candidate: {}", session_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::client::{Outbound, Outbox};
    use crate::webrtc::mock::{packet, MockPeer, MockRemoteTrack, MockTransport, PeerCall};
    use crate::webrtc::signaling::SdpType;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Harness {
        transport: Arc<MockTransport>,
        registry: Arc<BroadcastRegistry>,
        handler: SignalingHandler,
    }

    impl Harness {
        fn new() -> Self {
            let transport = MockTransport::new();
            let registry = Arc::new(BroadcastRegistry::new());
            let handler = SignalingHandler::new(transport.clone(), registry.clone(), 4);
            Self {
                transport,
                registry,
                handler,
            }
        }

        async fn send(&self, client: &mut Client, msg: SignalingMessage) {
            self.handler
                .handle_message(&mut client.session, msg)
                .await
                .unwrap();
        }

        async fn join(&self, client: &mut Client, role: Role) {
            self.send(client, SignalingMessage::join(role)).await;
        }

        async fn offer(&self, client: &mut Client) {
            self.send(
                client,
                SignalingMessage::Offer {
                    sdp: Some(SessionDescription::offer("v=0")),
                },
            )
            .await;
        }
    }

    struct Client {
        session: ClientSession,
        outbound: mpsc::UnboundedReceiver<Outbound>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    }

    impl Client {
        fn new() -> Self {
            let (outbox, outbound) = Outbox::channel();
            let (events_tx, events) = mpsc::unbounded_channel();
            Self {
                session: ClientSession::new("127.0.0.1:40000", outbox, events_tx),
                outbound,
                events,
            }
        }

        fn replies(&mut self) -> Vec<SignalingMessage> {
            let mut out = Vec::new();
            while let Ok(Outbound::Signal(msg)) = self.outbound.try_recv() {
                out.push(msg);
            }
            out
        }
    }

    fn candidate(n: u32) -> SignalingMessage {
        SignalingMessage::candidate(IceCandidate::new(format!("candidate:{}", n)))
    }

    fn is_error(msg: &SignalingMessage) -> bool {
        matches!(msg, SignalingMessage::Error { .. })
    }

    fn peer(h: &Harness, index: usize) -> Arc<MockPeer> {
        h.transport.peers()[index].clone()
    }

    #[tokio::test]
    async fn test_join_sets_role() {
        let h = Harness::new();
        let mut c = Client::new();
        h.join(&mut c, Role::Viewer).await;

        assert_eq!(c.session.role(), Some(Role::Viewer));
        assert_eq!(c.session.phase(), SessionPhase::Joined);
        assert!(c.replies().is_empty());
    }

    #[tokio::test]
    async fn test_join_without_role_keeps_session() {
        let h = Harness::new();
        let mut c = Client::new();
        h.send(&mut c, SignalingMessage::Join { role: None }).await;
        assert_eq!(c.replies(), vec![SignalingMessage::error("role is missing")]);
        assert_eq!(c.session.phase(), SessionPhase::Unassigned);

        h.join(&mut c, Role::Broadcaster).await;
        h.offer(&mut c).await;
        c.replies();

        // A later role-less join leaves the running broadcast alone
        h.send(&mut c, SignalingMessage::Join { role: None }).await;
        assert_eq!(c.replies(), vec![SignalingMessage::error("role is missing")]);
        assert!(!peer(&h, 0).is_closed());
        assert!(h.registry.has_active_broadcast());
        assert_eq!(c.session.role(), Some(Role::Broadcaster));
        assert_eq!(c.session.phase(), SessionPhase::AnswerSent);
    }

    #[tokio::test]
    async fn test_broadcaster_offer_claims_and_answers() {
        let h = Harness::new();
        let mut c = Client::new();
        h.join(&mut c, Role::Broadcaster).await;
        h.offer(&mut c).await;

        let replies = c.replies();
        assert_eq!(replies.len(), 1);
        let p = peer(&h, 0);
        match &replies[0] {
            SignalingMessage::Answer { sdp: Some(sdp) } => {
                assert_eq!(sdp.sdp_type, SdpType::Answer);
                assert_eq!(sdp.sdp, format!("answer-{}", p.id()));
            }
            other => panic!("expected answer, got {:?}", other),
        }
        assert_eq!(
            p.calls(),
            vec![
                PeerCall::SetRemote(SdpType::Offer),
                PeerCall::CreateAnswer,
                PeerCall::SetLocal(SdpType::Answer),
            ]
        );
        assert_eq!(h.registry.snapshot().unwrap().broadcaster_id, p.id().to_string());
        assert_eq!(c.session.phase(), SessionPhase::AnswerSent);
        assert!(c.session.remote_description_set());
    }

    #[tokio::test]
    async fn test_join_as_second_broadcaster_is_advised_off() {
        let h = Harness::new();
        let mut first = Client::new();
        h.join(&mut first, Role::Broadcaster).await;
        h.offer(&mut first).await;

        let mut second = Client::new();
        h.join(&mut second, Role::Broadcaster).await;
        let replies = second.replies();
        assert_eq!(replies, vec![SignalingMessage::error("already have broadcast")]);
        assert_eq!(second.session.role(), Some(Role::Broadcaster));
    }

    #[tokio::test]
    async fn test_losing_claim_closes_peer() {
        let h = Harness::new();
        let mut first = Client::new();
        let mut second = Client::new();
        h.join(&mut first, Role::Broadcaster).await;
        h.join(&mut second, Role::Broadcaster).await;
        h.offer(&mut first).await;
        h.offer(&mut second).await;

        let replies = second.replies();
        assert_eq!(replies.len(), 1);
        assert!(is_error(&replies[0]));

        let loser = peer(&h, 1);
        assert!(loser.is_closed());
        assert!(!loser.calls().contains(&PeerCall::CreateAnswer));
        assert_eq!(
            h.registry.snapshot().unwrap().broadcaster_id,
            peer(&h, 0).id().to_string()
        );
        assert!(second.session.peer_id().is_none());
        assert_eq!(second.session.phase(), SessionPhase::Joined);
    }

    #[tokio::test]
    async fn test_viewer_without_broadcast_is_rejected() {
        let h = Harness::new();
        let mut c = Client::new();
        h.join(&mut c, Role::Viewer).await;
        h.offer(&mut c).await;

        assert_eq!(c.replies(), vec![SignalingMessage::error("broadcast not ready yet")]);
        assert!(peer(&h, 0).is_closed());
        assert!(!h.registry.has_active_broadcast());
        assert!(c.session.peer_id().is_none());
    }

    #[tokio::test]
    async fn test_viewer_attaches_broadcast_track() {
        let h = Harness::new();
        let mut broadcaster = Client::new();
        h.join(&mut broadcaster, Role::Broadcaster).await;
        h.offer(&mut broadcaster).await;

        let mut viewer = Client::new();
        h.join(&mut viewer, Role::Viewer).await;
        h.offer(&mut viewer).await;

        let track_id = h.transport.tracks()[0].id().clone();
        let v = peer(&h, 1);
        assert_eq!(v.calls()[0], PeerCall::AddTrack(track_id));
        assert!(matches!(
            viewer.replies().as_slice(),
            [SignalingMessage::Answer { .. }]
        ));
    }

    #[tokio::test]
    async fn test_offer_before_join() {
        let h = Harness::new();
        let mut c = Client::new();
        h.offer(&mut c).await;

        assert_eq!(c.replies(), vec![SignalingMessage::error("join before sending offer")]);
        assert!(h.transport.peers().is_empty());
    }

    #[tokio::test]
    async fn test_offer_without_description() {
        let h = Harness::new();
        let mut c = Client::new();
        h.join(&mut c, Role::Broadcaster).await;
        h.send(&mut c, SignalingMessage::Offer { sdp: None }).await;

        assert_eq!(c.replies(), vec![SignalingMessage::error("sdp is missing")]);
        assert!(h.transport.peers().is_empty());
        assert_eq!(c.session.phase(), SessionPhase::Joined);
    }

    #[tokio::test]
    async fn test_early_candidates_flushed_in_order() {
        let h = Harness::new();
        let mut c = Client::new();
        h.join(&mut c, Role::Broadcaster).await;
        for n in 1..=3 {
            h.send(&mut c, candidate(n)).await;
        }
        assert_eq!(c.session.pending_candidates(), 3);

        h.offer(&mut c).await;
        h.send(&mut c, candidate(4)).await;

        let p = peer(&h, 0);
        assert_eq!(
            p.candidates(),
            vec!["candidate:1", "candidate:2", "candidate:3", "candidate:4"]
        );
        assert_eq!(c.session.pending_candidates(), 0);

        // Queued candidates are applied after the local description, before the answer is sent
        let calls = p.calls();
        let set_local = calls
            .iter()
            .position(|call| *call == PeerCall::SetLocal(SdpType::Answer))
            .unwrap();
        let first_candidate = calls
            .iter()
            .position(|call| matches!(call, PeerCall::AddCandidate(_)))
            .unwrap();
        assert!(set_local < first_candidate);
    }

    #[tokio::test]
    async fn test_pending_queue_is_bounded() {
        let h = Harness::new();
        let mut c = Client::new();
        h.join(&mut c, Role::Viewer).await;
        for n in 1..=6 {
            h.send(&mut c, candidate(n)).await;
        }
        assert_eq!(c.session.pending_candidates(), 4);
        assert!(c.replies().is_empty());
    }

    #[tokio::test]
    async fn test_candidate_validation() {
        let h = Harness::new();
        let mut c = Client::new();
        h.send(&mut c, candidate(1)).await;
        assert_eq!(
            c.replies(),
            vec![SignalingMessage::error("join before sending candidate")]
        );

        h.join(&mut c, Role::Viewer).await;
        h.send(&mut c, SignalingMessage::Candidate { candidate: None }).await;
        assert_eq!(c.replies(), vec![SignalingMessage::error("candidate is missing")]);
        assert_eq!(c.session.pending_candidates(), 0);
    }

    #[tokio::test]
    async fn test_candidate_failures_are_ignored() {
        let h = Harness::new();
        h.transport.fail_candidates.store(true, Ordering::SeqCst);
        let mut c = Client::new();
        h.join(&mut c, Role::Broadcaster).await;
        h.send(&mut c, candidate(1)).await;
        h.offer(&mut c).await;
        h.send(&mut c, candidate(2)).await;

        assert!(matches!(c.replies().as_slice(), [SignalingMessage::Answer { .. }]));
        assert!(h.registry.has_active_broadcast());
    }

    #[tokio::test]
    async fn test_negotiation_failure_releases_claim() {
        let h = Harness::new();
        h.transport
            .fail_remote_description
            .store(true, Ordering::SeqCst);
        let mut c = Client::new();
        h.join(&mut c, Role::Broadcaster).await;
        h.offer(&mut c).await;

        let replies = c.replies();
        assert_eq!(replies.len(), 1);
        assert!(is_error(&replies[0]));
        assert!(peer(&h, 0).is_closed());
        assert!(!h.registry.has_active_broadcast());
        assert!(!c.session.remote_description_set());
    }

    #[tokio::test]
    async fn test_local_description_failure_sends_no_answer() {
        let h = Harness::new();
        h.transport
            .fail_local_description
            .store(true, Ordering::SeqCst);
        let mut c = Client::new();
        h.join(&mut c, Role::Broadcaster).await;
        h.send(&mut c, candidate(1)).await;
        h.offer(&mut c).await;

        let replies = c.replies();
        assert_eq!(replies.len(), 1);
        assert!(is_error(&replies[0]));

        let p = peer(&h, 0);
        assert!(p.is_closed());
        assert!(p.candidates().is_empty());
        assert!(!h.registry.has_active_broadcast());
        assert!(!c.session.remote_description_set());
        assert_eq!(c.session.pending_candidates(), 0);
        assert_eq!(c.session.phase(), SessionPhase::Joined);

        // The freed slot can be claimed by the next offer
        h.transport
            .fail_local_description
            .store(false, Ordering::SeqCst);
        h.offer(&mut c).await;
        assert!(matches!(c.replies().as_slice(), [SignalingMessage::Answer { .. }]));
        assert!(h.registry.has_active_broadcast());
    }

    #[tokio::test]
    async fn test_peer_creation_failure() {
        let h = Harness::new();
        h.transport.fail_create.store(true, Ordering::SeqCst);
        let mut c = Client::new();
        h.join(&mut c, Role::Viewer).await;
        h.offer(&mut c).await;

        let replies = c.replies();
        assert_eq!(replies.len(), 1);
        assert!(is_error(&replies[0]));
        assert_eq!(c.session.phase(), SessionPhase::Joined);
    }

    #[tokio::test]
    async fn test_second_offer_replaces_media() {
        let h = Harness::new();
        let mut c = Client::new();
        h.join(&mut c, Role::Broadcaster).await;
        h.offer(&mut c).await;
        h.offer(&mut c).await;

        assert!(peer(&h, 0).is_closed());
        assert!(!peer(&h, 1).is_closed());
        assert_eq!(
            h.registry.snapshot().unwrap().broadcaster_id,
            peer(&h, 1).id().to_string()
        );
        assert_eq!(c.replies().len(), 2);
    }

    #[tokio::test]
    async fn test_local_candidates_are_forwarded() {
        let h = Harness::new();
        let mut c = Client::new();
        h.join(&mut c, Role::Broadcaster).await;
        h.offer(&mut c).await;
        c.replies();

        let local = IceCandidate::new("candidate:local").with_mid("0", 0);
        peer(&h, 0).emit_local_candidate(local.clone());
        assert_eq!(c.replies(), vec![SignalingMessage::candidate(local)]);
    }

    #[tokio::test]
    async fn test_terminal_state_tears_down() {
        let h = Harness::new();
        let mut c = Client::new();
        h.join(&mut c, Role::Broadcaster).await;
        h.offer(&mut c).await;

        let p = peer(&h, 0);
        p.emit_state(ConnectionState::Connected);
        let event = c.events.recv().await.unwrap();
        h.handler.handle_event(&mut c.session, event).await;
        assert_eq!(c.session.phase(), SessionPhase::Connected);

        p.emit_state(ConnectionState::Failed);
        let event = c.events.recv().await.unwrap();
        h.handler.handle_event(&mut c.session, event).await;

        assert!(p.is_closed());
        assert!(!h.registry.has_active_broadcast());
        assert_eq!(c.session.role(), Some(Role::Broadcaster));
        assert_eq!(c.session.phase(), SessionPhase::Joined);
    }

    #[tokio::test]
    async fn test_stale_state_event_is_ignored() {
        let h = Harness::new();
        let mut c = Client::new();
        h.join(&mut c, Role::Broadcaster).await;
        h.offer(&mut c).await;
        h.offer(&mut c).await;

        peer(&h, 0).emit_state(ConnectionState::Closed);
        let event = c.events.recv().await.unwrap();
        h.handler.handle_event(&mut c.session, event).await;

        assert!(!peer(&h, 1).is_closed());
        assert!(h.registry.has_active_broadcast());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let h = Harness::new();
        let mut c = Client::new();
        h.join(&mut c, Role::Broadcaster).await;
        h.offer(&mut c).await;

        h.handler.close(&mut c.session).await;
        h.handler.close(&mut c.session).await;

        assert_eq!(peer(&h, 0).close_count(), 1);
        assert!(!h.registry.has_active_broadcast());
        assert_eq!(c.session.phase(), SessionPhase::Closed);
    }

    #[tokio::test]
    async fn test_remote_track_starts_relay() {
        let h = Harness::new();
        let mut c = Client::new();
        h.join(&mut c, Role::Broadcaster).await;
        h.offer(&mut c).await;

        let (remote, tx) = MockRemoteTrack::new();
        let (extra, _extra_tx) = MockRemoteTrack::new();
        peer(&h, 0).emit_remote_track(remote);
        peer(&h, 0).emit_remote_track(extra);

        tx.send(Ok(packet(7, b"frame"))).unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(5), async {
            while h.registry.has_active_broadcast() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let written = h.transport.tracks()[0].written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].header.sequence_number, 7);
    }

    #[tokio::test]
    async fn test_unknown_and_client_answers_are_ignored() {
        let h = Harness::new();
        let mut c = Client::new();
        h.send(&mut c, SignalingMessage::Unknown).await;
        h.send(&mut c, SignalingMessage::answer(SessionDescription::answer("v=0")))
            .await;
        assert!(c.replies().is_empty());
        assert_eq!(c.session.phase(), SessionPhase::Unassigned);
    }
}
