// Stitch session HTTP routes
//
// POST /v1/stitch validates synchronously and returns 202 with a polling
// endpoint; all further progress is read from the session record.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use stitcher_core::{Session, SessionStats, SessionStatus, SessionStore, StitchRequest};
use stitcher_worker::StitchRunner;

use crate::common::{ErrorResponse, ListResponse};

/// Response for an accepted stitch request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StitchAccepted {
    pub session_id: Uuid,
    pub status: SessionStatus,
    /// Polling endpoint for this session's progress.
    #[schema(example = "/v1/sessions/018f2a3b-0c4d-7e5f-8a9b-0c1d2e3f4a5b")]
    pub status_endpoint: String,
}

/// Query parameters for session listing
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    /// Maximum number of sessions to return (newest first).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// App state for session routes
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub runner: StitchRunner,
}

impl AppState {
    pub fn new(store: Arc<dyn SessionStore>, runner: StitchRunner) -> Self {
        Self { store, runner }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/stitch", post(create_stitch))
        .route("/v1/sessions", get(list_sessions))
        .route("/v1/sessions/stats", get(session_stats))
        .route(
            "/v1/sessions/:session_id",
            get(get_session).delete(delete_session),
        )
        .with_state(state)
}

/// POST /v1/stitch - Accept a stitch request and start processing
#[utoipa::path(
    post,
    path = "/v1/stitch",
    request_body = StitchRequest,
    responses(
        (status = 202, description = "Request accepted for processing", body = StitchAccepted),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "stitch"
)]
pub async fn create_stitch(
    State(state): State<AppState>,
    Json(req): Json<StitchRequest>,
) -> Result<(StatusCode, Json<StitchAccepted>), (StatusCode, Json<ErrorResponse>)> {
    if let Err(e) = req.validate() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(e.to_string())),
        ));
    }

    let session = Session::new(req);
    let accepted = StitchAccepted {
        session_id: session.id,
        status: session.status,
        status_endpoint: format!("/v1/sessions/{}", session.id),
    };

    state.store.create(&session).await.map_err(|e| {
        tracing::error!("Failed to persist session: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("failed to persist session")),
        )
    })?;

    tracing::info!(session_id = %session.id, videos = session.request.videos.len(), "Stitch request accepted");
    state.runner.spawn(session);

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// GET /v1/sessions - List recent sessions
#[utoipa::path(
    get,
    path = "/v1/sessions",
    params(
        ("limit" = Option<usize>, Query, description = "Maximum number of sessions to return")
    ),
    responses(
        (status = 200, description = "Recent sessions, newest first", body = ListResponse<Session>),
        (status = 500, description = "Internal server error")
    ),
    tag = "sessions"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<Session>>, StatusCode> {
    let sessions = state.store.list(params.limit).await.map_err(|e| {
        tracing::error!("Failed to list sessions: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(ListResponse::new(sessions)))
}

/// GET /v1/sessions/stats - Session counts by status
#[utoipa::path(
    get,
    path = "/v1/sessions/stats",
    responses(
        (status = 200, description = "Session counts by status", body = SessionStats),
        (status = 500, description = "Internal server error")
    ),
    tag = "sessions"
)]
pub async fn session_stats(
    State(state): State<AppState>,
) -> Result<Json<SessionStats>, StatusCode> {
    let stats = state.store.stats().await.map_err(|e| {
        tracing::error!("Failed to compute session stats: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(stats))
}

/// GET /v1/sessions/{session_id} - Poll session progress
#[utoipa::path(
    get,
    path = "/v1/sessions/{session_id}",
    params(
        ("session_id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session snapshot", body = Session),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Session>, StatusCode> {
    let session = state
        .store
        .get(session_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get session: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(session))
}

/// DELETE /v1/sessions/{session_id} - Delete a session record
#[utoipa::path(
    delete,
    path = "/v1/sessions/{session_id}",
    params(
        ("session_id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 204, description = "Session deleted successfully"),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "sessions"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let deleted = state.store.delete(session_id).await.map_err(|e| {
        tracing::error!("Failed to delete session: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
