//! Vector-storage capability
//!
//! The index layer talks to the storage engine only through `VectorStore`:
//! named index create/drop/info, hash-style upsert of entries, and a
//! match-everything KNN query ranked by vector distance.

mod memory;
mod redisearch;

pub use self::memory::MemoryVectorStore;
pub use self::redisearch::RedisVectorStore;

use async_trait::async_trait;
use docqa_common::errors::Result;
use serde::{Deserialize, Serialize};

/// Distance metric of the vector field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Cosine,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "COSINE",
        }
    }
}

/// Schema of the single named index: one text field and one vector field
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSchema {
    /// Entries whose key starts with `{prefix}:` belong to the index
    pub prefix: String,
    pub text_field: String,
    pub vector_field: String,
    pub dimension: usize,
    pub distance: DistanceMetric,
    /// Capacity hint for the engine's vector storage
    pub initial_capacity: usize,
}

/// Persisted form of a chunk
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// `prefix:id`
    pub key: String,
    pub id: usize,
    pub text: String,
    /// Fixed-width float32 encoding of the vector
    pub vector: Vec<u8>,
}

/// A KNN query over every entry in the index
#[derive(Debug, Clone)]
pub struct KnnQuery {
    pub vector_field: String,
    /// Encoded query vector
    pub vector: Vec<u8>,
    pub k: usize,
    /// Alias the engine reports the distance under
    pub score_field: String,
    pub text_field: String,
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub text: String,
    /// Cosine distance to the query; lower is closer
    pub score: f32,
}

impl QueryResult {
    pub fn similarity(&self) -> f32 {
        1.0 - self.score
    }
}

/// Storage engine capability
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Remove the index and its entries. Returns whether it existed.
    async fn drop_index(&self, index: &str) -> Result<bool>;

    async fn index_exists(&self, index: &str) -> Result<bool>;

    async fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<()>;

    /// Write entries under the schema's field names, overwriting existing keys
    async fn put(&self, schema: &IndexSchema, entries: &[IndexEntry]) -> Result<()>;

    /// Up to `k` hits ordered by ascending distance
    async fn knn(&self, index: &str, query: &KnnQuery) -> Result<Vec<QueryResult>>;

    /// Connectivity check
    async fn ping(&self) -> Result<()>;
}
