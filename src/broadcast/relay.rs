//! Media relay loop
//!
//! Copies RTP packets from the broadcaster's inbound track into the shared
//! outbound track, unmodified.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::registry::BroadcastRegistry;
use crate::utils::LogThrottler;
use crate::warn_throttled;
use crate::webrtc::{LocalTrack, RemoteTrack, TransportError};

/// Counters reported when a relay loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Packets written to the outbound track
    pub packets: u64,
    /// Payload bytes written
    pub bytes: u64,
    /// Packets read while no viewer was attached
    pub dropped: u64,
}

/// Start the relay task for one broadcaster track
pub fn spawn_relay(
    remote: Arc<dyn RemoteTrack>,
    outbound: Arc<dyn LocalTrack>,
    registry: Arc<BroadcastRegistry>,
) -> JoinHandle<RelayStats> {
    tokio::spawn(run_relay(remote, outbound, registry))
}

/// Forward packets until the inbound track ends or the outbound track fails
///
/// On exit the registry is cleared only if `outbound` is still the registered
/// track, so a broadcaster that took over in the meantime is left alone.
pub async fn run_relay(
    remote: Arc<dyn RemoteTrack>,
    outbound: Arc<dyn LocalTrack>,
    registry: Arc<BroadcastRegistry>,
) -> RelayStats {
    let throttler = LogThrottler::default();
    let mut stats = RelayStats::default();

    info!("Relay started: {} -> {}", remote.id(), outbound.id());

    loop {
        let packet = match remote.read_packet().await {
            Ok(packet) => packet,
            Err(TransportError::EndOfStream) => {
                debug!("Remote track {} ended", remote.id());
                break;
            }
            Err(e) => {
                warn!("Relay read from {} failed: {}", remote.id(), e);
                break;
            }
        };

        match outbound.write_packet(&packet).await {
            Ok(()) => {
                stats.packets += 1;
                stats.bytes += packet.payload.len() as u64;
            }
            Err(TransportError::NoReaders) => {
                stats.dropped += 1;
                warn_throttled!(
                    throttler,
                    "no_readers",
                    "Track {} has no readers, dropping packets ({} dropped so far)",
                    outbound.id(),
                    stats.dropped
                );
            }
            Err(e) => {
                warn!("Relay write to {} failed: {}", outbound.id(), e);
                break;
            }
        }
    }

    if registry.release_track(outbound.id()) {
        info!("Broadcast on track {} ended", outbound.id());
    }

    info!(
        "Relay stopped: {} packets, {} bytes forwarded, {} dropped",
        stats.packets, stats.bytes, stats.dropped
    );
    stats
}
