//! REST handlers. Each one is a thin translation layer over
//! [`crate::cop::CopService`]; no business logic lives here.

use axum::{extract::State, Json};
use serde_json::Value;

use super::dto::{
    AgentListResponse, EventsTailResponse, HealthResponse, IngestResponse, PauseRequest,
    PauseResponse, ResetResponse, ThreatListResponse, TrackListResponse,
};
use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::domain::{EventEnvelope, SnapshotPayload};

/// `POST /api/ingest` - apply or buffer one envelope.
#[tracing::instrument(skip(state, body))]
pub async fn ingest(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<IngestResponse>> {
    let envelope: EventEnvelope = serde_json::from_value(body)
        .map_err(|err| ApiError::validation(err.to_string(), None))?;
    let outcome = state.ingest(envelope)?;
    Ok(Json(IngestResponse {
        ok: true,
        buffered: outcome.buffered(),
    }))
}

/// `GET /api/state` - full snapshot.
#[tracing::instrument(skip(state))]
pub async fn state(State(state): State<AppState>) -> Json<SnapshotPayload> {
    Json(state.snapshot())
}

/// `GET /api/tracks` - current track list.
#[tracing::instrument(skip(state))]
pub async fn tracks(State(state): State<AppState>) -> Json<TrackListResponse> {
    let tracks = state.tracks();
    Json(TrackListResponse {
        count: tracks.len(),
        tracks,
    })
}

/// `GET /api/threats` - current threat list.
#[tracing::instrument(skip(state))]
pub async fn threats(State(state): State<AppState>) -> Json<ThreatListResponse> {
    let threats = state.threats();
    Json(ThreatListResponse {
        count: threats.len(),
        threats,
    })
}

/// `GET /api/agents` - known agents and their metadata.
#[tracing::instrument(skip(state))]
pub async fn agents(State(state): State<AppState>) -> Json<AgentListResponse> {
    let agents = state.agents();
    Json(AgentListResponse {
        count: agents.len(),
        agents,
    })
}

/// `GET /api/events_tail` - recent events, oldest first.
#[tracing::instrument(skip(state))]
pub async fn events_tail(State(state): State<AppState>) -> Json<EventsTailResponse> {
    let events = state.events_tail();
    Json(EventsTailResponse {
        count: events.len(),
        events,
    })
}

/// `POST /api/pause` - open or close the pause gate.
#[tracing::instrument(skip(state))]
pub async fn pause(
    State(state): State<AppState>,
    Json(body): Json<PauseRequest>,
) -> Json<PauseResponse> {
    let status = state.set_paused(body.paused);
    Json(PauseResponse {
        ok: true,
        paused: status.paused,
        buffer_depth: status.buffer_depth,
    })
}

/// `POST /api/reset` - wipe all state and broadcast an empty snapshot.
#[tracing::instrument(skip(state))]
pub async fn reset(State(state): State<AppState>) -> Json<ResetResponse> {
    state.reset();
    Json(ResetResponse { ok: true })
}

/// `GET /api/health` - liveness and counters.
#[tracing::instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        paused: state.paused(),
        tracks: state.tracks().len(),
        subscribers: state.subscriber_count(),
    })
}
