//! Docchat Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the docchat
//! system:
//! - Document and conversation models
//! - Common error types
//! - Shared traits for embedding and generative backends
//! - Configuration management
//! - In-memory document registry

pub mod config;
pub mod registry;

pub use config::{
    AppConfig, ChatConfig, ClassifierKind, ConfigError, EmptyRetrievalPolicy, IndexConfig,
    IndexProvider, LlmConfig, LlmProvider, LoggingConfig, ServerConfig,
};
pub use registry::DocumentRegistry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for docchat operations
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported document kind: {0}")]
    UnsupportedKind(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;

// ============================================================================
// Document Models
// ============================================================================

/// Recognized document kinds
///
/// The set is closed: anything else is rejected at ingestion with
/// [`ChatError::UnsupportedKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Markdown,
    PlainText,
}

impl DocumentKind {
    /// Detect kind from a file extension (without the dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Detect kind from a file name
    pub fn from_name(name: &str) -> Option<Self> {
        name.rsplit_once('.')
            .and_then(|(_, ext)| Self::from_extension(ext))
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Markdown => write!(f, "markdown"),
            Self::PlainText => write!(f, "text"),
        }
    }
}

/// A document held in the registry
///
/// `id` is the storage identity handed back to API callers. `index_id` is
/// the key space the vector index groups chunks under. The two are distinct
/// so the index can be rebuilt or swapped without changing storage ids;
/// deletion must purge by `index_id`, never by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Storage identity
    pub id: Uuid,

    /// Vector-index identity (chunk group key)
    pub index_id: Uuid,

    /// Display name (usually the uploaded file name)
    pub name: String,

    /// Detected document kind
    pub kind: DocumentKind,

    /// Full extracted text
    pub content: String,

    /// Ingestion timestamp
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Create a new record with fresh storage and index identities
    pub fn new(name: impl Into<String>, kind: DocumentKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            index_id: Uuid::new_v4(),
            name: name.into(),
            kind,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Conversation Models
// ============================================================================

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Human,
    Assistant,
}

impl Role {
    /// Normalize a caller-supplied role label
    ///
    /// Callers use varying spellings ("ai" for assistant, "user" for human).
    /// Unknown labels are treated as human turns rather than rejected, so a
    /// sloppy history never fails a request.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "assistant" | "ai" => Self::Assistant,
            "human" | "user" => Self::Human,
            other => {
                tracing::warn!(role = other, "unknown role label, treating as human");
                Self::Human
            }
        }
    }

    /// Transcript prefix for this role
    pub fn label(&self) -> &'static str {
        match self {
            Self::Human => "Human",
            Self::Assistant => "Assistant",
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let s = match self {
            Self::Human => "human",
            Self::Assistant => "assistant",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Role::from_label(&s))
    }
}

/// One (role, content) pair in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Retrieval Types
// ============================================================================

/// A chunk returned from the vector index for one query
///
/// Transient: built per query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedFragment {
    /// Chunk text
    pub content: String,

    /// Display name of the source document
    pub source_name: String,

    /// Relevance score (higher is better)
    pub score: f32,

    /// Chunk sequence position within its parent document
    pub seq: u32,
}

// ============================================================================
// Chat Request / Outcome
// ============================================================================

/// A single chat turn request
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// User's question
    pub query: String,

    /// Caller-supplied conversation id
    pub conversation_id: String,

    /// Optional full history; when present it replaces the stored
    /// conversation before this turn is appended
    #[serde(default)]
    pub history: Option<Vec<Turn>>,

    /// Optional model override for this turn
    #[serde(default)]
    pub model: Option<String>,

    /// Explicit context override: `Some(true)` forces retrieval,
    /// `Some(false)` skips it, `None` defers to the classifier
    #[serde(default)]
    pub force_context: Option<bool>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            conversation_id: conversation_id.into(),
            history: None,
            model: None,
            force_context: None,
        }
    }
}

/// Completed chat turn
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    /// Generated answer
    pub answer: String,

    /// Whether document context grounded the answer
    pub grounded: bool,

    /// Names of documents whose fragments were used
    pub sources: Vec<String>,

    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for embedding backends
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embedding dimension
    fn dimension(&self) -> usize;
}

/// Trait for generative backends
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a full response; `model` overrides the configured default
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String>;

    /// Generate a streaming response of partial text fragments
    async fn generate_stream(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<futures::stream::BoxStream<'static, Result<String>>>;
}

// ============================================================================
// Tests
// ============================================================================
