//! The single named vector index
//!
//! Owns every persisted entry. The index is rebuilt wholesale when the
//! document changes; there is no incremental update path.

use crate::codec::encode_vector;
use crate::store::{DistanceMetric, IndexEntry, IndexSchema, KnnQuery, QueryResult, VectorStore};
use docqa_common::config::RedisConfig;
use docqa_common::errors::{Outcome, Result, Stage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// An embedded chunk ready for indexing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Names used inside the storage engine
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub index_name: String,
    pub key_prefix: String,
    pub text_field: String,
    pub vector_field: String,
    /// Alias the KNN distance is returned under
    pub score_field: String,
}

impl IndexSettings {
    pub fn new(index_name: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            key_prefix: key_prefix.into(),
            text_field: "text".to_string(),
            vector_field: "vector".to_string(),
            score_field: "vector_score".to_string(),
        }
    }
}

impl From<&RedisConfig> for IndexSettings {
    fn from(config: &RedisConfig) -> Self {
        Self::new(&config.index_name, &config.key_prefix)
    }
}

/// Vector index of one dimension over a `VectorStore`
#[derive(Clone)]
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    settings: IndexSettings,
    dimension: usize,
}

impl VectorIndex {
    pub fn new(store: Arc<dyn VectorStore>, settings: IndexSettings, dimension: usize) -> Self {
        Self {
            store,
            settings,
            dimension,
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.index_name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn schema(&self, capacity: usize) -> IndexSchema {
        IndexSchema {
            prefix: self.settings.key_prefix.clone(),
            text_field: self.settings.text_field.clone(),
            vector_field: self.settings.vector_field.clone(),
            dimension: self.dimension,
            distance: DistanceMetric::Cosine,
            initial_capacity: capacity,
        }
    }

    fn key(&self, id: usize) -> String {
        format!("{}:{}", self.settings.key_prefix, id)
    }

    /// Remove the index and its entries; absent is not an error
    pub async fn drop(&self) -> Result<()> {
        let existed = self.store.drop_index(self.name()).await?;
        debug!(index = %self.name(), existed, "Dropped index");
        Ok(())
    }

    /// Create the index if it does not exist.
    ///
    /// An existing index is left alone even if its schema differs.
    pub async fn ensure_schema(&self, capacity: usize) -> Result<()> {
        if self.store.index_exists(self.name()).await? {
            debug!(index = %self.name(), "Index already exists");
            return Ok(());
        }

        self.store
            .create_index(self.name(), &self.schema(capacity))
            .await?;
        info!(
            index = %self.name(),
            dimension = self.dimension,
            capacity,
            "Created vector index"
        );
        Ok(())
    }

    /// Write chunks under `prefix:id`, overwriting existing keys
    pub async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        let entries = chunks
            .iter()
            .map(|chunk| {
                Ok(IndexEntry {
                    key: self.key(chunk.id),
                    id: chunk.id,
                    text: chunk.text.clone(),
                    vector: encode_vector(&chunk.vector, self.dimension)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.store.put(&self.schema(chunks.len()), &entries).await?;
        debug!(index = %self.name(), count = entries.len(), "Upserted entries");
        Ok(())
    }

    /// KNN over every entry, at most `k` hits by ascending distance
    pub async fn try_search(&self, vector: &[f32], k: usize) -> Result<Vec<QueryResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = KnnQuery {
            vector_field: self.settings.vector_field.clone(),
            vector: encode_vector(vector, self.dimension)?,
            k,
            score_field: self.settings.score_field.clone(),
            text_field: self.settings.text_field.clone(),
        };

        let mut results = self.store.knn(self.name(), &query).await?;
        results.sort_by(|a, b| a.score.total_cmp(&b.score));
        results.truncate(k);

        for (rank, result) in results.iter().enumerate() {
            debug!(rank, similarity = result.similarity(), "Search hit");
        }
        Ok(results)
    }

    /// Fail-soft search: a query failure yields no results
    pub async fn search(&self, vector: &[f32], k: usize) -> Outcome<Vec<QueryResult>> {
        Outcome::from_result(Stage::Retrieve, self.try_search(vector, k).await)
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryVectorStore;

    fn index(store: Arc<MemoryVectorStore>) -> VectorIndex {
        VectorIndex::new(store, IndexSettings::new("embeddings-index", "doc"), 3)
    }

    fn chunk(id: usize, text: &str, vector: [f32; 3]) -> Chunk {
        Chunk {
            id,
            text: text.to_string(),
            vector: vector.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_drop_absent_index_is_noop() {
        let index = index(Arc::new(MemoryVectorStore::new()));
        assert!(index.drop().await.is_ok());
        assert!(index.drop().await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let store = Arc::new(MemoryVectorStore::new());
        let index = index(store.clone());

        index.ensure_schema(2).await.unwrap();
        index.ensure_schema(2).await.unwrap();
        assert!(store.index_exists("embeddings-index").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_orders_and_truncates() {
        let store = Arc::new(MemoryVectorStore::new());
        let index = index(store);
        index.ensure_schema(4).await.unwrap();
        index
            .upsert(&[
                chunk(0, "syllabus", [1.0, 0.0, 0.0]),
                chunk(1, "grading", [0.0, 1.0, 0.0]),
                chunk(2, "midterm", [0.0, 0.0, 1.0]),
                chunk(3, "final exam", [0.0, 0.7, 0.7]),
            ])
            .await
            .unwrap();

        let results = index.try_search(&[0.0, 0.1, 1.0], 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].text, "midterm");
        assert_eq!(results[1].text, "final exam");
        assert!(results.windows(2).all(|w| w[0].score <= w[1].score));

        assert_eq!(index.try_search(&[1.0, 0.0, 0.0], 10).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_key() {
        let store = Arc::new(MemoryVectorStore::new());
        let index = index(store.clone());
        index.ensure_schema(1).await.unwrap();

        index.upsert(&[chunk(0, "old", [1.0, 0.0, 0.0])]).await.unwrap();
        index.upsert(&[chunk(0, "new", [1.0, 0.0, 0.0])]).await.unwrap();

        assert_eq!(store.len().await, 1);
        let results = index.try_search(&[1.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(results[0].text, "new");
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let index = index(Arc::new(MemoryVectorStore::new()));
        index.ensure_schema(1).await.unwrap();

        let bad = Chunk {
            id: 0,
            text: "short".to_string(),
            vector: vec![1.0, 0.0],
        };
        assert!(index.upsert(&[bad]).await.is_err());
    }

    #[tokio::test]
    async fn test_search_failure_degrades_to_empty() {
        // No index created, so the query fails
        let index = index(Arc::new(MemoryVectorStore::new()));

        let outcome = index.search(&[1.0, 0.0, 0.0], 5).await;
        assert!(outcome.is_degraded());
        assert!(outcome.value().is_empty());
        assert_eq!(outcome.failure().map(|f| f.stage), Some(Stage::Retrieve));
    }

    #[tokio::test]
    async fn test_drop_then_rebuild_leaves_no_stale_entries() {
        let store = Arc::new(MemoryVectorStore::new());
        let index = index(store.clone());
        index.ensure_schema(3).await.unwrap();
        index
            .upsert(&[
                chunk(0, "a", [1.0, 0.0, 0.0]),
                chunk(1, "b", [0.0, 1.0, 0.0]),
                chunk(2, "c", [0.0, 0.0, 1.0]),
            ])
            .await
            .unwrap();

        index.drop().await.unwrap();
        index.ensure_schema(1).await.unwrap();
        index.upsert(&[chunk(0, "z", [1.0, 0.0, 0.0])]).await.unwrap();

        let results = index.try_search(&[0.0, 0.0, 1.0], 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "z");
    }
}
