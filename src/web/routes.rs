use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::handlers;
use super::ws::ws_handler;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::status))
        .route("/ice-servers", get(handlers::ice_servers));

    // Demo client and any other static assets
    let static_files =
        ServeDir::new(&state.config.web.static_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ws", get(ws_handler))
        .nest("/api", api_routes)
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
