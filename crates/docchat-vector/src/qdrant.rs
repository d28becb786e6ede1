//! Qdrant implementation of the vector index
//!
//! Chunk groups are keyed by the owning document's index identity, stored
//! in the point payload so deletion can purge a whole group with a single
//! filter. Atomicity of `add` is best-effort: on a failed batch the group
//! is rolled back by that same filter before the error surfaces.

use crate::{embed_batch_with_retry, VectorIndex};
use async_trait::async_trait;
use docchat_core::{ChatError, EmbeddingClient, IndexConfig, Result, RetrievedFragment};
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::sync::Arc;
use uuid::Uuid;

/// Qdrant-backed vector index
pub struct QdrantIndex {
    client: Qdrant,
    embedder: Arc<dyn EmbeddingClient>,
    collection: String,
    config: IndexConfig,
}

impl QdrantIndex {
    /// Connect to a Qdrant instance
    pub async fn connect(config: &IndexConfig, embedder: Arc<dyn EmbeddingClient>) -> Result<Self> {
        let client = Qdrant::from_url(&config.qdrant_url)
            .build()
            .map_err(|e| ChatError::Retrieval(format!("Qdrant connection failed: {e}")))?;

        Ok(Self {
            client,
            embedder,
            collection: config.qdrant_collection.clone(),
            config: config.clone(),
        })
    }

    /// Initialize collection (run once on setup)
    pub async fn init_collection(&self) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| ChatError::Retrieval(format!("failed to list collections: {e}")))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(
                            self.config.vector_dimension as u64,
                            Distance::Cosine,
                        ),
                    ),
                )
                .await
                .map_err(|e| ChatError::Retrieval(format!("failed to create collection: {e}")))?;
        }

        Ok(())
    }

    fn group_filter(index_id: Uuid) -> Filter {
        Filter::must([Condition::matches("index_id", index_id.to_string())])
    }

    async fn rollback_group(&self, index_id: Uuid) {
        let result = self
            .client
            .delete_points(
                DeletePointsBuilder::new(&self.collection).points(Self::group_filter(index_id)),
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(%index_id, "rollback of partial chunk group failed: {e}");
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn add(&self, index_id: Uuid, document_name: &str, chunks: &[String]) -> Result<usize> {
        if chunks.is_empty() {
            tracing::debug!(%index_id, "no chunks to index");
            return Ok(0);
        }

        let batch_size = self.config.embed_batch_size.max(1);
        let mut seq = 0u32;

        for batch in chunks.chunks(batch_size) {
            let vectors = match embed_batch_with_retry(
                self.embedder.as_ref(),
                batch,
                self.config.max_retries,
                self.config.retry_backoff_ms,
            )
            .await
            {
                Ok(v) => v,
                Err(e) => {
                    self.rollback_group(index_id).await;
                    return Err(e);
                }
            };

            let points: Vec<PointStruct> = batch
                .iter()
                .zip(vectors)
                .map(|(content, vector)| {
                    let payload: std::collections::HashMap<String, qdrant_client::qdrant::Value> =
                        [
                            ("index_id".to_string(), index_id.to_string().into()),
                            ("name".to_string(), document_name.to_string().into()),
                            ("seq".to_string(), (seq as i64).into()),
                            ("content".to_string(), content.clone().into()),
                        ]
                        .into_iter()
                        .collect();
                    seq += 1;
                    PointStruct::new(Uuid::new_v4().to_string(), vector, payload)
                })
                .collect();

            let upsert = self
                .client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
                .await;

            if let Err(e) = upsert {
                self.rollback_group(index_id).await;
                return Err(ChatError::Retrieval(format!("failed to upsert vectors: {e}")));
            }
        }

        tracing::debug!(%index_id, count = chunks.len(), "indexed chunk group");
        Ok(chunks.len())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedFragment>> {
        let query_vector = self.embedder.embed(query).await?;

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query_vector, k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| ChatError::Retrieval(format!("vector search failed: {e}")))?;

        let mut fragments: Vec<RetrievedFragment> = results
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let content = payload
                    .get("content")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                let source_name = payload
                    .get("name")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                let seq = payload
                    .get("seq")
                    .and_then(|v| v.as_integer())
                    .unwrap_or(0) as u32;

                RetrievedFragment {
                    content,
                    source_name,
                    score: point.score,
                    seq,
                }
            })
            .collect();

        fragments.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.seq.cmp(&b.seq))
        });

        Ok(fragments)
    }

    async fn delete(&self, index_id: Uuid) -> Result<u64> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection).points(Self::group_filter(index_id)),
            )
            .await
            .map_err(|e| ChatError::Retrieval(format!("failed to delete vectors: {e}")))?;

        // Qdrant's delete response does not carry a removed count
        tracing::debug!(%index_id, "purged chunk group");
        Ok(0)
    }
}
