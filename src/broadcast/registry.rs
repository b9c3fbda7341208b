//! Single-broadcaster registry
//!
//! Holds the active broadcaster's peer connection together with the outbound
//! track every viewer attaches. Both are stored as one slot so they are always
//! set and cleared together.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::webrtc::{LocalTrack, PeerConnection, PeerId, TrackId};

struct BroadcastSlot {
    peer: Arc<dyn PeerConnection>,
    track: Arc<dyn LocalTrack>,
}

/// Current broadcast, as reported by the status API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastInfo {
    pub broadcaster_id: String,
    pub track_id: String,
}

/// Registry of the one active broadcast
///
/// The lock is synchronous and never held across an `.await`; claim and
/// release are plain in-memory swaps.
#[derive(Default)]
pub struct BroadcastRegistry {
    slot: RwLock<Option<BroadcastSlot>>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `peer` as the broadcaster if nobody else is
    ///
    /// The emptiness check and the store happen under one write lock, so of
    /// any number of concurrent claims exactly one returns `true`.
    pub fn try_claim(&self, peer: Arc<dyn PeerConnection>, track: Arc<dyn LocalTrack>) -> bool {
        let mut slot = self.slot.write();
        if slot.is_some() {
            return false;
        }

        info!("Broadcaster {} registered with track {}", peer.id(), track.id());
        *slot = Some(BroadcastSlot { peer, track });
        true
    }

    pub fn has_active_broadcast(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Outbound track of the active broadcast
    pub fn broadcast_track(&self) -> Option<Arc<dyn LocalTrack>> {
        self.slot.read().as_ref().map(|slot| slot.track.clone())
    }

    /// Clear the slot if `peer` is the registered broadcaster
    pub fn release(&self, peer: &PeerId) -> bool {
        self.release_if(|slot| slot.peer.id() == peer)
    }

    /// Clear the slot if `track` is the registered outbound track
    pub fn release_track(&self, track: &TrackId) -> bool {
        self.release_if(|slot| slot.track.id() == track)
    }

    pub fn snapshot(&self) -> Option<BroadcastInfo> {
        self.slot.read().as_ref().map(|slot| BroadcastInfo {
            broadcaster_id: slot.peer.id().to_string(),
            track_id: slot.track.id().to_string(),
        })
    }

    fn release_if(&self, owns: impl Fn(&BroadcastSlot) -> bool) -> bool {
        let mut slot = self.slot.write();
        match slot.as_ref() {
            Some(current) if owns(current) => {
                info!("Broadcaster {} released", current.peer.id());
                *slot = None;
                true
            }
            _ => false,
        }
    }
}
