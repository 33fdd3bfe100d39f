//! HTTP and WebSocket surfaces of the drone server.

pub mod control;
pub mod directory;

use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Router for the WebSocket control endpoint.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// peer address is part of each session's identity.
pub fn control_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(control::control_handler))
}

/// Router for the read-only fleet directory.
pub fn directory_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drones", get(directory::list_drones))
        .route("/locks", get(directory::list_locks))
        .route("/health", get(|| async { "OK" }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
