//! Chat handlers

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    Json,
};
use docchat_core::{ChatRequest, Turn};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

/// Chat request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatApiRequest {
    /// User's question
    #[schema(example = "How fast does the alpha system boot?")]
    pub query: String,

    /// Conversation id; a fresh one is assigned when absent
    #[serde(default)]
    pub conversation_id: Option<String>,

    /// Authoritative replacement history for the conversation
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub history: Option<Vec<Turn>>,

    /// Per-request model override
    #[serde(default)]
    pub model: Option<String>,

    /// Skip the relevance classifier and force the decision
    #[serde(default)]
    pub force_context: Option<bool>,
}

impl ChatApiRequest {
    fn into_core(self) -> ChatRequest {
        ChatRequest {
            query: self.query,
            conversation_id: self
                .conversation_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            history: self.history,
            model: self.model,
            force_context: self.force_context,
        }
    }
}

/// Chat response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatApiResponse {
    /// Generated answer
    pub response: String,

    /// Conversation id to continue with
    pub conversation_id: String,

    /// Whether document context backed the answer
    pub grounded: bool,

    /// Document names that contributed context
    pub sources: Vec<String>,

    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Handle chat requests
#[utoipa::path(
    post,
    path = "/api/v1/chat",
    tag = "chat",
    request_body = ChatApiRequest,
    responses(
        (status = 200, description = "Chat turn completed", body = ChatApiResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 500, description = "Internal error", body = crate::error::ApiError)
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatApiRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.increment_requests();

    let orchestrator = state
        .get_orchestrator()
        .await
        .ok_or_else(|| AppError::Internal("chat pipeline not initialized".to_string()))?;

    let request = req.into_core();
    let outcome = orchestrator.chat(&request).await?;

    Ok((
        StatusCode::OK,
        Json(ChatApiResponse {
            response: outcome.answer,
            conversation_id: request.conversation_id,
            grounded: outcome.grounded,
            sources: outcome.sources,
            processing_time_ms: outcome.processing_time_ms,
        }),
    ))
}

/// Handle streaming chat requests
#[utoipa::path(
    post,
    path = "/api/v1/chat/stream",
    tag = "chat",
    request_body = ChatApiRequest,
    responses(
        (status = 200, description = "Streaming response started"),
        (status = 400, description = "Invalid request", body = crate::error::ApiError)
    )
)]
pub async fn chat_stream_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatApiRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    state.increment_requests();

    let orchestrator = state
        .get_orchestrator()
        .await
        .ok_or_else(|| AppError::Internal("chat pipeline not initialized".to_string()))?;

    let request = req.into_core();
    let conversation_id = request.conversation_id.clone();
    let rx = orchestrator.chat_stream(&request).await?;

    let fragments = rx.map(|item| {
        Ok(match item {
            Ok(fragment) => Event::default().event("message").data(fragment),
            Err(e) => Event::default().event("error").data(e.to_string()),
        })
    });
    let done = stream::once(async move {
        Ok(Event::default().event("done").data(conversation_id))
    });

    Ok(Sse::new(fragments.chain(done)).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
