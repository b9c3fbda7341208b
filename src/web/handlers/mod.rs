use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;
use crate::webrtc::IceServer;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Relay status
#[derive(Serialize)]
pub struct StatusResponse {
    pub broadcasting: bool,
    pub broadcaster_id: Option<String>,
    pub track_id: Option<String>,
    /// Open signaling connections
    pub clients: usize,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let broadcast = state.registry.snapshot();

    Json(StatusResponse {
        broadcasting: broadcast.is_some(),
        broadcaster_id: broadcast.as_ref().map(|b| b.broadcaster_id.clone()),
        track_id: broadcast.map(|b| b.track_id),
        clients: state.client_count(),
    })
}

#[derive(Serialize)]
pub struct IceServersResponse {
    pub ice_servers: Vec<IceServer>,
}

/// ICE servers browser clients should use
pub async fn ice_servers(State(state): State<Arc<AppState>>) -> Json<IceServersResponse> {
    Json(IceServersResponse {
        ice_servers: state.config.webrtc.ice_servers(),
    })
}
