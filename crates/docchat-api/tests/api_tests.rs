//! API integration tests
//!
//! The full router is exercised with in-memory backends: a deterministic
//! embedding stub, the brute-force memory index, and a canned LLM.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::Engine;
use docchat_api::{create_router, create_router_for_testing, state::AppState};
use docchat_chat::LexicalClassifier;
use docchat_core::config::AppConfig;
use docchat_core::{EmbeddingClient, LlmClient, Result as ChatResult};
use docchat_vector::MemoryIndex;
use futures::stream::BoxStream;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// =============================================================================
// Stub backends
// =============================================================================

struct StubEmbedding;

#[async_trait]
impl EmbeddingClient for StubEmbedding {
    async fn embed(&self, text: &str) -> ChatResult<Vec<f32>> {
        let mut v = [0.0f32; 3];
        for word in text.to_lowercase().split_whitespace() {
            let h = word
                .bytes()
                .fold(7u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
            v[(h % 3) as usize] += 1.0;
        }
        Ok(v.to_vec())
    }

    async fn embed_batch(&self, texts: &[String]) -> ChatResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        3
    }
}

struct StubLlm;

#[async_trait]
impl LlmClient for StubLlm {
    async fn generate(&self, _prompt: &str, _model: Option<&str>) -> ChatResult<String> {
        Ok("stub answer".to_string())
    }

    async fn generate_stream(
        &self,
        _prompt: &str,
        _model: Option<&str>,
    ) -> ChatResult<BoxStream<'static, ChatResult<String>>> {
        let parts: Vec<ChatResult<String>> =
            vec![Ok("stub ".to_string()), Ok("answer".to_string())];
        Ok(Box::pin(futures::stream::iter(parts)))
    }
}

async fn test_app() -> Router {
    let state = Arc::new(AppState::new(AppConfig::default()));
    let embedder: Arc<dyn EmbeddingClient> = Arc::new(StubEmbedding);
    let index = Arc::new(MemoryIndex::new(embedder, state.config.index.clone()));
    state
        .install(index, Arc::new(StubLlm), Arc::new(LexicalClassifier::new()))
        .await;
    create_router(state)
}

fn json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn upload_body(name: &str, text: &str) -> Value {
    json!({
        "name": name,
        "content": base64::engine::general_purpose::STANDARD.encode(text),
    })
}

// =============================================================================
// Health tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;

    let response = app
        .oneshot(json_request("GET", "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_reflects_initialization() {
    // uninitialized state is not ready
    let bare = create_router_for_testing();
    let response = bare
        .oneshot(json_request("GET", "/ready", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // wired state is
    let app = test_app().await;
    let response = app
        .oneshot(json_request("GET", "/ready", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = test_app().await;

    let response = app
        .oneshot(json_request("GET", "/metrics", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["uptime_seconds"].is_number());
    assert!(json["total_requests"].is_number());
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = test_app().await;

    let response = app
        .oneshot(json_request("GET", "/api-docs/openapi.json", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/api/v1/chat"].is_object());
}

// =============================================================================
// Document tests
// =============================================================================

#[tokio::test]
async fn test_document_lifecycle() {
    let app = test_app().await;

    // upload
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/documents",
            Some(upload_body(
                "alpha-manual.txt",
                "The alpha system boots in 3 seconds. It requires 4GB memory.",
            )),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let uploaded = body_json(response).await;
    assert_eq!(uploaded["name"], "alpha-manual.txt");
    assert_eq!(uploaded["kind"], "plaintext");
    assert!(uploaded["chunks"].as_u64().unwrap() >= 1);
    let id = uploaded["id"].as_str().unwrap().to_string();

    // list
    let response = app
        .clone()
        .oneshot(json_request("GET", "/api/v1/documents", None))
        .await
        .unwrap();
    let listing = body_json(response).await;
    assert_eq!(listing.as_array().unwrap().len(), 1);

    // detail includes the extracted text
    let response = app
        .clone()
        .oneshot(json_request("GET", &format!("/api/v1/documents/{id}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await;
    assert!(detail["content"].as_str().unwrap().contains("boots"));

    // delete, then the document is gone
    let response = app
        .clone()
        .oneshot(json_request(
            "DELETE",
            &format!("/api/v1/documents/{id}"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(json_request("GET", &format!("/api/v1/documents/{id}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_unsupported_extension() {
    let app = test_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/documents",
            Some(upload_body("slides.pptx", "irrelevant")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNSUPPORTED_KIND");
}

#[tokio::test]
async fn test_upload_rejects_bad_base64() {
    let app = test_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/documents",
            Some(json!({"name": "notes.txt", "content": "%%% not base64 %%%"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_delete_unknown_document() {
    let app = test_app().await;

    let response = app
        .oneshot(json_request(
            "DELETE",
            "/api/v1/documents/00000000-0000-0000-0000-000000000000",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Chat tests
// =============================================================================

#[tokio::test]
async fn test_chat_rejects_empty_query() {
    let app = test_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/chat",
            Some(json!({"query": "   "})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_chat_general_question_is_ungrounded() {
    let app = test_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/chat",
            Some(json!({"query": "What is 2+2?"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["response"], "stub answer");
    assert_eq!(json["grounded"], false);
    assert!(json["conversation_id"].is_string());
}

#[tokio::test]
async fn test_chat_about_uploaded_document_is_grounded() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/documents",
            Some(upload_body(
                "alpha-manual.txt",
                "The alpha system boots in 3 seconds.",
            )),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/chat",
            Some(json!({
                "query": "How fast does the alpha system boot?",
                "conversation_id": "c1",
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["grounded"], true);
    assert_eq!(json["sources"][0], "alpha-manual.txt");
    assert_eq!(json["conversation_id"], "c1");
}

#[tokio::test]
async fn test_chat_stream_emits_events() {
    let app = test_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/chat/stream",
            Some(json!({"query": "hello there", "conversation_id": "c-stream"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("event: message"));
    assert!(text.contains("event: done"));
    assert!(text.contains("c-stream"));
}
