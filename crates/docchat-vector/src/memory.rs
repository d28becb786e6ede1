//! In-memory vector index
//!
//! Brute-force cosine similarity over all stored vectors behind a
//! `std::sync::RwLock`. The default provider for development, the CLI,
//! and tests; concurrent searches share the read lock while add/delete
//! take the write lock, so readers never observe a half-written chunk
//! group.

use crate::{cosine_sim, embed_batch_with_retry, VectorIndex};
use async_trait::async_trait;
use docchat_core::{EmbeddingClient, IndexConfig, Result, RetrievedFragment};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

struct Entry {
    index_id: Uuid,
    name: String,
    seq: u32,
    content: String,
    vector: Vec<f32>,
}

/// In-memory brute-force index
pub struct MemoryIndex {
    embedder: Arc<dyn EmbeddingClient>,
    config: IndexConfig,
    entries: RwLock<Vec<Entry>>,
}

impl MemoryIndex {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, config: IndexConfig) -> Self {
        Self {
            embedder,
            config,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored chunks (diagnostics)
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn add(&self, index_id: Uuid, document_name: &str, chunks: &[String]) -> Result<usize> {
        if chunks.is_empty() {
            tracing::debug!(%index_id, "no chunks to index");
            return Ok(0);
        }

        // Stage everything first so a failed batch leaves no partial group.
        let mut staged = Vec::with_capacity(chunks.len());
        for (batch_start, batch) in chunks
            .chunks(self.config.embed_batch_size.max(1))
            .enumerate()
            .map(|(i, b)| (i * self.config.embed_batch_size.max(1), b))
        {
            let vectors = embed_batch_with_retry(
                self.embedder.as_ref(),
                batch,
                self.config.max_retries,
                self.config.retry_backoff_ms,
            )
            .await?;

            for (offset, (content, vector)) in batch.iter().zip(vectors).enumerate() {
                staged.push(Entry {
                    index_id,
                    name: document_name.to_string(),
                    seq: (batch_start + offset) as u32,
                    content: content.clone(),
                    vector,
                });
            }
        }

        let count = staged.len();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.extend(staged);
        tracing::debug!(%index_id, count, "indexed chunk group");
        Ok(count)
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedFragment>> {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if entries.is_empty() {
                return Ok(Vec::new());
            }
        }

        let query_vector = self.embedder.embed(query).await?;

        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut results: Vec<RetrievedFragment> = entries
            .iter()
            .map(|entry| RetrievedFragment {
                content: entry.content.clone(),
                source_name: entry.name.clone(),
                score: cosine_sim(&query_vector, &entry.vector),
                seq: entry.seq,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.seq.cmp(&b.seq))
        });
        results.truncate(k);
        Ok(results)
    }

    async fn delete(&self, index_id: Uuid) -> Result<u64> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|entry| entry.index_id != index_id);
        let removed = (before - entries.len()) as u64;

        if removed == 0 {
            tracing::info!(%index_id, "delete matched no chunks");
        } else {
            tracing::debug!(%index_id, removed, "purged chunk group");
        }
        Ok(removed)
    }
}
