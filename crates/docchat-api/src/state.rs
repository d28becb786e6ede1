//! Application state management

use docchat_chat::{create_classifier, create_llm_client, ChatOrchestrator, RelevanceClassifier};
use docchat_core::config::AppConfig;
use docchat_core::{DocumentRegistry, EmbeddingClient, LlmClient, Result};
use docchat_ingest::TextChunker;
use docchat_vector::{create_embedding_client, create_index, CachedEmbedding, VectorIndex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Document registry
    pub registry: Arc<DocumentRegistry>,
    /// Vector index (None until initialized)
    index: RwLock<Option<Arc<dyn VectorIndex>>>,
    /// Chat orchestrator (None until initialized)
    orchestrator: RwLock<Option<Arc<ChatOrchestrator>>>,
}

impl AppState {
    /// Create new application state with config
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            registry: Arc::new(DocumentRegistry::new()),
            index: RwLock::new(None),
            orchestrator: RwLock::new(None),
        }
    }

    /// Wire up the pipeline from configuration
    ///
    /// Embedding client (cached) feeds the vector index; the LLM client
    /// backs both the classifier and generation.
    pub async fn initialize(&self) -> Result<()> {
        let embedder: Arc<dyn EmbeddingClient> =
            Arc::from(create_embedding_client(&self.config.llm)?);
        let embedder: Arc<dyn EmbeddingClient> = Arc::new(CachedEmbedding::new(embedder, 4096));

        let index = create_index(&self.config.index, embedder).await?;
        let llm: Arc<dyn LlmClient> = Arc::from(create_llm_client(&self.config.llm)?);
        let classifier = create_classifier(&self.config.chat.classifier, Arc::clone(&llm));

        self.install(index, llm, classifier).await;
        Ok(())
    }

    /// Install pre-built components (tests use this with in-memory backends)
    pub async fn install(
        &self,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
        classifier: Arc<dyn RelevanceClassifier>,
    ) {
        let orchestrator = ChatOrchestrator::new(
            Arc::clone(&index),
            llm,
            classifier,
            Arc::clone(&self.registry),
            self.config.chat.clone(),
        );

        *self.index.write().await = Some(index);
        *self.orchestrator.write().await = Some(Arc::new(orchestrator));
    }

    pub async fn get_index(&self) -> Option<Arc<dyn VectorIndex>> {
        self.index.read().await.clone()
    }

    pub async fn get_orchestrator(&self) -> Option<Arc<ChatOrchestrator>> {
        self.orchestrator.read().await.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.orchestrator.read().await.is_some()
    }

    /// Chunker built from the configured chunk geometry
    pub fn chunker(&self) -> Result<TextChunker> {
        TextChunker::new(self.config.chat.chunk_size, self.config.chat.chunk_overlap)
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
