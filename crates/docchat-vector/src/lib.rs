//! Docchat Vector - Vector index abstraction
//!
//! Provides the [`VectorIndex`] trait over chunk embeddings plus two
//! implementations: an in-memory brute-force index and a Qdrant-backed
//! index. Embedding clients for OpenAI and Ollama live in `embedding`,
//! with an optional caching wrapper in `cache`.

use async_trait::async_trait;
use docchat_core::{
    ChatError, EmbeddingClient, IndexConfig, IndexProvider, Result, RetrievedFragment,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub mod cache;
pub mod embedding;
pub mod memory;
pub mod qdrant;

pub use cache::CachedEmbedding;
pub use embedding::{create_embedding_client, OllamaEmbedding, OpenAiEmbedding};
pub use memory::MemoryIndex;
pub use qdrant::QdrantIndex;

/// Trait for vector index operations
///
/// Chunks are grouped by the owning document's index identity. `add` is
/// atomic per call: either the whole chunk group lands in the index or
/// none of it does.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embed and store all chunks under `index_id`, tagged with the source
    /// document name and their sequence position. Returns the number of
    /// chunks indexed.
    async fn add(&self, index_id: Uuid, document_name: &str, chunks: &[String]) -> Result<usize>;

    /// Top-k chunks by similarity to the query, score descending, ties
    /// broken by earlier sequence position. An empty index yields an empty
    /// result, not an error.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedFragment>>;

    /// Remove every chunk stored under `index_id`; zero matches is a
    /// logged no-op. Returns the number of chunks removed where the
    /// backend reports it.
    async fn delete(&self, index_id: Uuid) -> Result<u64>;
}

/// Create a vector index from configuration
pub async fn create_index(
    config: &IndexConfig,
    embedder: Arc<dyn EmbeddingClient>,
) -> Result<Arc<dyn VectorIndex>> {
    match config.provider {
        IndexProvider::Memory => Ok(Arc::new(MemoryIndex::new(embedder, config.clone()))),
        IndexProvider::Qdrant => {
            let index = QdrantIndex::connect(config, embedder).await?;
            index.init_collection().await?;
            Ok(Arc::new(index))
        }
    }
}

/// Embed a batch with bounded retries and exponential backoff
///
/// Embedding-backend unavailability is transient; a group of chunks must
/// not be half-indexed because one batch hiccuped. Exhausting retries
/// surfaces a hard [`ChatError::Retrieval`] to the caller.
pub(crate) async fn embed_batch_with_retry(
    embedder: &dyn EmbeddingClient,
    texts: &[String],
    max_retries: u32,
    backoff_ms: u64,
) -> Result<Vec<Vec<f32>>> {
    let mut attempt = 0u32;
    loop {
        match embedder.embed_batch(texts).await {
            Ok(vectors) => return Ok(vectors),
            Err(e) => {
                attempt += 1;
                if attempt > max_retries {
                    return Err(ChatError::Retrieval(format!(
                        "embedding failed after {max_retries} retries: {e}"
                    )));
                }
                let delay = backoff_ms.saturating_mul(1 << (attempt - 1));
                tracing::warn!(attempt, delay_ms = delay, "embedding batch failed: {e}");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }
    }
}

/// Cosine similarity between two vectors of equal dimension
pub(crate) fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Embedder that maps each text to a deterministic 3-dim vector and can
    /// be primed to fail its first N calls.
    pub struct StubEmbedding {
        pub fail_first: AtomicU32,
        pub calls: AtomicU32,
    }

    impl StubEmbedding {
        pub fn new() -> Self {
            Self {
                fail_first: AtomicU32::new(0),
                calls: AtomicU32::new(0),
            }
        }

        pub fn failing(times: u32) -> Self {
            Self {
                fail_first: AtomicU32::new(times),
                calls: AtomicU32::new(0),
            }
        }

        pub fn vector_for(text: &str) -> Vec<f32> {
            // token-hash projection: identical texts embed identically,
            // overlapping texts land near each other
            let mut v = [0.0f32; 3];
            for word in text.to_lowercase().split_whitespace() {
                let h = word.bytes().fold(7u32, |acc, b| {
                    acc.wrapping_mul(31).wrapping_add(b as u32)
                });
                v[(h % 3) as usize] += 1.0;
            }
            v.to_vec()
        }
    }

    #[async_trait]
    impl EmbeddingClient for StubEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let batch = self.embed_batch(&[text.to_string()]).await?;
            Ok(batch.into_iter().next().unwrap())
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(ChatError::Retrieval("embedding backend down".to_string()));
            }
            Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
        }

        fn dimension(&self) -> usize {
            3
        }
    }
}
