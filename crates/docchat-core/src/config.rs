//! Docchat Configuration Management
//!
//! Handles configuration from environment variables and config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Vector index configuration
    pub index: IndexConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Chat pipeline configuration
    pub chat: ChatConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "API_PORT".to_string(),
                value: port,
            })?;
        }

        // CORS origins (comma-separated)
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Vector index
        if let Ok(provider) = std::env::var("INDEX_PROVIDER") {
            config.index.provider = provider.parse()?;
        }
        if let Ok(url) = std::env::var("QDRANT_URL") {
            config.index.qdrant_url = url;
        }
        if let Ok(collection) = std::env::var("QDRANT_COLLECTION") {
            config.index.qdrant_collection = collection;
        }

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.openai_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.llm.ollama_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }

        // Chat pipeline
        if let Ok(kind) = std::env::var("CLASSIFIER") {
            config.chat.classifier = kind.parse()?;
        }
        if let Ok(policy) = std::env::var("EMPTY_RETRIEVAL_POLICY") {
            config.chat.empty_retrieval = policy.parse()?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 300,
            max_body_size: 10 * 1024 * 1024, // 10MB
            cors_enabled: true,
            // Empty by default - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index provider to use
    pub provider: IndexProvider,

    /// Qdrant gRPC URL
    pub qdrant_url: String,

    /// Qdrant collection name
    pub qdrant_collection: String,

    /// Vector dimension (must match embedding model)
    pub vector_dimension: usize,

    /// Chunk batch size for embedding calls during ingestion
    pub embed_batch_size: usize,

    /// Retry attempts for a failed embedding batch
    pub max_retries: u32,

    /// Base backoff between retries, in milliseconds (doubled per attempt)
    pub retry_backoff_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: IndexProvider::Memory,
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_collection: "docchat_chunks".to_string(),
            vector_dimension: 768, // nomic-embed-text
            embed_batch_size: 16,
            max_retries: 3,
            retry_backoff_ms: 250,
        }
    }
}

/// Supported vector index providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexProvider {
    #[default]
    Memory,
    Qdrant,
}

impl std::str::FromStr for IndexProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "qdrant" => Ok(Self::Qdrant),
            _ => Err(ConfigError::InvalidValue {
                key: "INDEX_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for Azure or compatible APIs)
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            max_tokens: 2048,
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    #[default]
    Ollama,
    Azure,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "azure" => Ok(Self::Azure),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Chat pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Number of fragments requested from the vector index
    pub top_k: usize,

    /// Minimum relevance score for an assembled fragment
    pub min_relevance: f32,

    /// Re-rank retrieval results by query keyword overlap
    pub rerank: bool,

    /// Maximum assembled context size (characters)
    pub max_context_chars: usize,

    /// Chunk size for document ingestion (characters)
    pub chunk_size: usize,

    /// Overlap carried between consecutive chunks (characters)
    pub chunk_overlap: usize,

    /// Relevance classifier strategy
    pub classifier: ClassifierKind,

    /// Behavior when context is needed but retrieval comes back empty
    pub empty_retrieval: EmptyRetrievalPolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_relevance: 0.1,
            rerank: true,
            max_context_chars: 8000,
            chunk_size: 1000,
            chunk_overlap: 200,
            classifier: ClassifierKind::Lexical,
            empty_retrieval: EmptyRetrievalPolicy::GeneralKnowledge,
        }
    }
}

/// Relevance classifier strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// Keyword overlap against known document names
    #[default]
    Lexical,
    /// Ask the generative backend for a YES/NO decision
    Model,
}

impl std::str::FromStr for ClassifierKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lexical" => Ok(Self::Lexical),
            "model" => Ok(Self::Model),
            _ => Err(ConfigError::InvalidValue {
                key: "CLASSIFIER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Policy when the classifier wants context but nothing relevant is found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyRetrievalPolicy {
    /// Fall back to an unconditioned general-knowledge answer
    #[default]
    GeneralKnowledge,
    /// Skip generation and return a fixed insufficient-context answer
    ReportInsufficient,
}

impl std::str::FromStr for EmptyRetrievalPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general-knowledge" | "general_knowledge" => Ok(Self::GeneralKnowledge),
            "report-insufficient" | "report_insufficient" => Ok(Self::ReportInsufficient),
            _ => Err(ConfigError::InvalidValue {
                key: "EMPTY_RETRIEVAL_POLICY".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
