// Background music catalog routes

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;

use stitcher_core::BgmLibrary;

use crate::common::ListResponse;

/// App state for BGM routes
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<dyn BgmLibrary>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/bgm/categories", get(list_categories))
        .with_state(state)
}

/// GET /v1/bgm/categories - List available BGM categories
#[utoipa::path(
    get,
    path = "/v1/bgm/categories",
    responses(
        (status = 200, description = "Available BGM categories", body = ListResponse<String>),
        (status = 500, description = "Internal server error")
    ),
    tag = "bgm"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<String>>, StatusCode> {
    let categories = state.library.categories().await.map_err(|e| {
        tracing::error!("Failed to list BGM categories: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(ListResponse::new(categories)))
}
