use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::broadcast::BroadcastRegistry;
use crate::config::AppConfig;
use crate::session::{ConnectionDriver, SignalingHandler};
use crate::webrtc::MediaTransport;

/// Application-wide state shared across handlers
pub struct AppState {
    /// Configuration, fixed at startup
    pub config: AppConfig,
    /// The single-broadcaster registry
    pub registry: Arc<BroadcastRegistry>,
    /// Drives every signaling WebSocket
    pub driver: Arc<ConnectionDriver>,
    clients: AtomicUsize,
}

impl AppState {
    /// Create new application state
    pub fn new(config: AppConfig, transport: Arc<dyn MediaTransport>) -> Arc<Self> {
        let registry = Arc::new(BroadcastRegistry::new());
        let handler = Arc::new(SignalingHandler::new(
            transport,
            registry.clone(),
            config.signaling.max_pending_candidates,
        ));
        let driver = Arc::new(ConnectionDriver::new(handler, config.signaling.clone()));

        Arc::new(Self {
            config,
            registry,
            driver,
            clients: AtomicUsize::new(0),
        })
    }

    /// Number of open signaling connections
    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::Relaxed)
    }

    /// Count a connection for as long as the returned guard lives
    pub fn register_client(self: &Arc<Self>) -> ClientGuard {
        self.clients.fetch_add(1, Ordering::Relaxed);
        ClientGuard {
            state: self.clone(),
        }
    }
}

/// Decrements the client count on drop
pub struct ClientGuard {
    state: Arc<AppState>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.state.clients.fetch_sub(1, Ordering::Relaxed);
    }
}
