//! HTTP server setup and configuration.
//!
//! This module provides the router and application state used by both
//! the production server and integration tests.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;

use crate::api;
use crate::error::ApiError;
use crate::models::AppConfig;
use crate::services::{Compositor, RenderWarning};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ticketd API",
        description = "Ticket and label template rendering",
        version = "0.1.0",
        license(name = "MIT")
    ),
    paths(api::handle_canvas_img),
    components(schemas(
        api::CanvasRequest,
        api::CanvasResponse,
        api::ErrorResponse,
        RenderWarning,
    )),
    tags(
        (name = "Render", description = "Template rendering")
    )
)]
pub struct ApiDoc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub compositor: Arc<Compositor>,
    pub config: Arc<AppConfig>,
}

/// Create application state from configuration.
pub fn create_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let compositor = Compositor::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create compositor: {e}"))?;

    tracing::info!(
        assets = %config.assets_dir.display(),
        work = %config.work_dir.display(),
        quality = config.jpeg_quality,
        "Compositor ready"
    );

    Ok(AppState {
        compositor: Arc::new(compositor),
        config: Arc::new(config),
    })
}

/// Build the router with all endpoints and middleware.
///
/// When `static_dir` is configured the editor client is served for every
/// path not matched by an API route.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    let body_limit = DefaultBodyLimit::max(state.config.max_body_bytes);
    let static_dir = state.config.static_dir.clone();

    let router = Router::new()
        .route("/canvas-img", post(handle_canvas_img))
        .route("/api-docs/openapi.json", get(openapi_json))
        // Health check
        .route("/health", get(|| async { "OK" }))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    };

    router
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("x-requested-with")])
        .allow_credentials(true)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

// Wrapper handler to extract the compositor for the underlying API handler

async fn handle_canvas_img(
    State(state): State<AppState>,
    request: api::CanvasRequest,
) -> Result<Json<api::CanvasResponse>, ApiError> {
    api::handle_canvas_img(State(state.compositor), request).await
}
