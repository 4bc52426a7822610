//! REST and WebSocket interface of the COP server.
//!
//! ## Endpoints
//!
//! - `POST /api/ingest` - Ingest one event envelope
//! - `GET  /api/state` - Full snapshot (agents, tracks, threats, paused)
//! - `GET  /api/tracks` - Current track list
//! - `GET  /api/threats` - Current threat list
//! - `GET  /api/agents` - Known agents and their metadata
//! - `GET  /api/events_tail` - Bounded debug tail of recent events
//! - `POST /api/pause` - Open or close the pause gate
//! - `POST /api/reset` - Wipe all state
//! - `GET  /api/health` - Liveness and counters
//! - `WS   /ws` - Push stream: snapshot first, then every state change

pub mod dto;
pub mod error;
pub mod handlers;
pub mod websocket;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::cop::CopService;

pub use dto::*;
pub use error::{ApiError, ApiResult};

/// Shared handler state.
pub type AppState = Arc<CopService>;

/// Build the full COP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ingest", post(handlers::ingest))
        .route("/api/state", get(handlers::state))
        .route("/api/tracks", get(handlers::tracks))
        .route("/api/threats", get(handlers::threats))
        .route("/api/agents", get(handlers::agents))
        .route("/api/events_tail", get(handlers::events_tail))
        .route("/api/pause", post(handlers::pause))
        .route("/api/reset", post(handlers::reset))
        .route("/api/health", get(handlers::health))
        .route("/ws", get(websocket::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
