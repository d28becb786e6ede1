//! Docchat API - REST server
//!
//! HTTP surface over the chat pipeline: chat (plain and SSE streaming),
//! document ingestion and lifecycle, health probes, and the OpenAPI
//! document.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{routing::get, Json, Router};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::chat::chat_handler,
        handlers::chat::chat_stream_handler,
        handlers::documents::upload_document,
        handlers::documents::list_documents,
        handlers::documents::get_document,
        handlers::documents::delete_document,
        handlers::health::health_check,
        handlers::health::readiness_check,
    ),
    components(schemas(
        handlers::chat::ChatApiRequest,
        handlers::chat::ChatApiResponse,
        handlers::documents::UploadRequest,
        handlers::documents::UploadResponse,
        handlers::documents::DocumentSummary,
        handlers::documents::DocumentDetail,
        error::ApiError,
    )),
    tags(
        (name = "chat", description = "Conversation endpoints"),
        (name = "documents", description = "Document ingestion and lifecycle"),
        (name = "health", description = "Service probes")
    )
)]
pub struct ApiDoc;

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = if state.config.server.cors_enabled {
        // explicit origins when configured, otherwise permissive
        if state.config.server.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = state
                .config
                .server
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics))
        .route("/api-docs/openapi.json", get(serve_openapi))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Router over a default, uninitialized state (integration test probes)
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(AppState::default()))
}
