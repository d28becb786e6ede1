//! Caching wrapper for embedding clients
//!
//! Chunk re-ingestion and repeated queries hit the embedding backend with
//! identical texts; a bounded `moka` cache keyed by the text short-circuits
//! those calls. The wrapper is transparent: it implements
//! [`EmbeddingClient`] and can front any inner client.

use async_trait::async_trait;
use docchat_core::{EmbeddingClient, Result};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Embedding client with an in-process cache in front
pub struct CachedEmbedding {
    inner: Arc<dyn EmbeddingClient>,
    cache: Cache<String, Vec<f32>>,
}

impl CachedEmbedding {
    /// Wrap `inner` with a cache of `capacity` entries and a 1 hour TTL
    pub fn new(inner: Arc<dyn EmbeddingClient>, capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(Duration::from_secs(3600))
                .build(),
        }
    }

    /// Number of cached embeddings (diagnostics)
    pub fn cached_entries(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl EmbeddingClient for CachedEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.get(text).await {
            return Ok(hit);
        }
        let vector = self.inner.embed(text).await?;
        self.cache.insert(text.to_string(), vector.clone()).await;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<(usize, String)> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            match self.cache.get(text).await {
                Some(hit) => results.push(Some(hit)),
                None => {
                    results.push(None);
                    misses.push((i, text.clone()));
                }
            }
        }

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|(_, t)| t.clone()).collect();
            let vectors = self.inner.embed_batch(&miss_texts).await?;
            for ((i, text), vector) in misses.into_iter().zip(vectors) {
                self.cache.insert(text, vector.clone()).await;
                results[i] = Some(vector);
            }
        }

        // every slot is filled by now
        Ok(results.into_iter().flatten().collect())
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}
