// Stitcher API server
//
// Accepts stitch requests, persists session records, and hands execution to
// the in-process worker runner. Callers poll session snapshots; nothing in
// the HTTP surface blocks on media work.

mod bgm;
mod common;
mod object_store;
mod sessions;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use stitcher_core::{
    BgmLibrary, Mode, ObjectStore, PipelineConfig, Session, SessionError, SessionStats,
    SessionStatus, SessionStore, StitchRequest, VideoItem,
};
use stitcher_storage::{Database, DbSessionStore};
use stitcher_worker::{FfmpegEngine, FsBgmLibrary, HttpFetcher, StitchPipeline, StitchRunner};

use crate::common::{ErrorResponse, ListResponse};
use crate::object_store::HttpObjectStore;
use crate::sessions::StitchAccepted;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    active_sessions: usize,
}

/// State for health endpoint
#[derive(Clone)]
struct HealthState {
    runner: StitchRunner,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.runner.active_sessions(),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        sessions::create_stitch,
        sessions::list_sessions,
        sessions::session_stats,
        sessions::get_session,
        sessions::delete_session,
        bgm::list_categories,
    ),
    components(
        schemas(
            Session, SessionStatus, SessionError,
            StitchRequest, VideoItem, Mode,
            SessionStats, StitchAccepted, ErrorResponse,
            ListResponse<Session>,
            ListResponse<String>,
        )
    ),
    tags(
        (name = "stitch", description = "Stitch request submission"),
        (name = "sessions", description = "Session polling and management"),
        (name = "bgm", description = "Background music catalog")
    ),
    info(
        title = "Stitcher API",
        version = "0.2.0",
        description = "Asynchronous video stitching service",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stitcher_api=debug,stitcher_worker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("stitcher-api starting...");

    let config = Arc::new(PipelineConfig::from_env());

    // Initialize database
    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;
    let db = Database::from_url(&database_url)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;
    tracing::info!("Connected to database");

    let store: Arc<dyn SessionStore> = Arc::new(DbSessionStore::new(db));

    // BGM catalog, scanned once at startup
    let bgm_dir = std::env::var("STITCHER_BGM_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./bgm"));
    let bgm_library = FsBgmLibrary::scan(&bgm_dir)
        .await
        .context("Failed to scan BGM library")?;
    tracing::info!(dir = %bgm_dir.display(), tracks = bgm_library.track_count(), "BGM library loaded");
    let bgm_library: Arc<dyn BgmLibrary> = Arc::new(bgm_library);

    // Artifact store
    let objects: Arc<dyn ObjectStore> = Arc::new(
        HttpObjectStore::from_env(config.upload_timeout).context("Failed to configure artifact store")?,
    );

    // Pipeline and runner
    let fetcher = HttpFetcher::new(config.download_timeout).context("Failed to build fetcher")?;
    let pipeline = Arc::new(StitchPipeline::new(
        store.clone(),
        Arc::new(fetcher),
        Arc::new(FfmpegEngine::new()),
        bgm_library.clone(),
        objects,
        config,
    ));
    let runner = StitchRunner::new(pipeline);
    runner.recover().await;
    runner.spawn_retention_sweep();

    // Create module-specific states
    let sessions_state = sessions::AppState::new(store, runner.clone());
    let bgm_state = bgm::AppState {
        library: bgm_library,
    };
    let health_state = HealthState { runner };

    // Load CORS allowed origins from environment (optional)
    let cors_origins: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| s.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();

    if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
    }

    // Build main router
    let app = Router::new()
        .route("/health", get(health).with_state(health_state))
        .merge(sessions::routes(sessions_state))
        .merge(bgm::routes(bgm_state));

    // Add Swagger UI
    let app =
        app.merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    // Add CORS layer only if origins are configured
    let app = if !cors_origins.is_empty() {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN]),
        )
    } else {
        app
    };

    // Add tracing
    let app = app.layer(TraceLayer::new_for_http());

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
