//! Document handlers
//!
//! Upload runs the full ingestion pipeline: decode, detect, extract,
//! register, chunk, index. The registry entry and the chunk group are
//! created or destroyed together; a failure on the index side rolls the
//! registry back so neither outlives the other.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use base64::Engine;
use chrono::{DateTime, Utc};
use docchat_core::DocumentKind;
use docchat_ingest::{detect_kind, extract_text};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Document upload request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadRequest {
    /// File name, extension decides the document kind
    #[schema(example = "alpha-manual.pdf")]
    pub name: String,

    /// Base64-encoded file content
    pub content: String,
}

/// Document upload response
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String)]
    pub kind: DocumentKind,
    /// Number of chunks indexed
    pub chunks: usize,
}

/// Document summary for listings
#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String)]
    pub kind: DocumentKind,
    pub created_at: DateTime<Utc>,
}

/// Full document detail
#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentDetail {
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String)]
    pub kind: DocumentKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Upload and index a document
#[utoipa::path(
    post,
    path = "/api/v1/documents",
    tag = "documents",
    request_body = UploadRequest,
    responses(
        (status = 201, description = "Document ingested", body = UploadResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 415, description = "Unsupported document kind", body = crate::error::ApiError),
        (status = 422, description = "Extraction failed", body = crate::error::ApiError)
    )
)]
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UploadRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.increment_requests();

    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }

    let index = state
        .get_index()
        .await
        .ok_or_else(|| AppError::Internal("index not initialized".to_string()))?;

    let data = base64::engine::general_purpose::STANDARD
        .decode(&req.content)
        .map_err(|e| AppError::Validation(format!("content is not valid base64: {e}")))?;

    let kind = detect_kind(&req.name)?;
    let text = extract_text(&data, kind)?;

    let chunker = state.chunker()?;
    let chunks = chunker.split(&text);

    let record = state.registry.create(&req.name, kind, text);

    let indexed = match index.add(record.index_id, &record.name, &chunks).await {
        Ok(count) => count,
        Err(e) => {
            // no registry entry without its chunk group
            let _ = state.registry.delete(record.id);
            tracing::error!(name = %record.name, "indexing failed, registry entry rolled back: {e}");
            return Err(e.into());
        }
    };

    tracing::info!(id = %record.id, name = %record.name, chunks = indexed, "document ingested");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: record.id,
            name: record.name,
            kind: record.kind,
            chunks: indexed,
        }),
    ))
}

/// List all documents, newest first
#[utoipa::path(
    get,
    path = "/api/v1/documents",
    tag = "documents",
    responses(
        (status = 200, description = "Document listing", body = [DocumentSummary])
    )
)]
pub async fn list_documents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.increment_requests();

    let documents: Vec<DocumentSummary> = state
        .registry
        .list()
        .into_iter()
        .map(|d| DocumentSummary {
            id: d.id,
            name: d.name,
            kind: d.kind,
            created_at: d.created_at,
        })
        .collect();

    Json(documents)
}

/// Fetch one document with its extracted text
#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document detail", body = DocumentDetail),
        (status = 404, description = "Unknown document", body = crate::error::ApiError)
    )
)]
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.increment_requests();

    let record = state.registry.get(id)?;

    Ok(Json(DocumentDetail {
        id: record.id,
        name: record.name,
        kind: record.kind,
        content: record.content,
        created_at: record.created_at,
    }))
}

/// Delete a document and purge its chunk group
#[utoipa::path(
    delete,
    path = "/api/v1/documents/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Unknown document", body = crate::error::ApiError)
    )
)]
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.increment_requests();

    let index = state
        .get_index()
        .await
        .ok_or_else(|| AppError::Internal("index not initialized".to_string()))?;

    let record = state.registry.get(id)?;

    // index first: a failed purge keeps the registry entry visible
    let removed = index.delete(record.index_id).await?;
    tracing::info!(id = %id, removed, "purged document chunks");

    if state.registry.delete(id).is_err() {
        // a concurrent delete got the registry entry after the index purge
        tracing::warn!(id = %id, "registry entry missing after index purge");
    }

    Ok(StatusCode::NO_CONTENT)
}
