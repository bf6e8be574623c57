//! In-process vector store with exact KNN
//!
//! Mirrors the RediSearch semantics the index relies on: entries live under
//! keys independent of the index, an index covers every key with its prefix,
//! dropping an index deletes those keys, and KNN ranks by cosine distance.

use super::{IndexEntry, IndexSchema, KnnQuery, QueryResult, VectorStore};
use crate::codec::decode_vector;
use async_trait::async_trait;
use docqa_common::errors::{AppError, Result};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredHash {
    text: String,
    vector: Vec<u8>,
}

#[derive(Default)]
struct State {
    indexes: HashMap<String, IndexSchema>,
    hashes: BTreeMap<String, StoredHash>,
}

#[derive(Default)]
pub struct MemoryVectorStore {
    state: RwLock<State>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, indexed or not
    pub async fn len(&self) -> usize {
        self.state.read().await.hashes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine distance in [0, 2]; zero vectors are treated as orthogonal
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let (ma, mb) = (magnitude(a), magnitude(b));
    if ma == 0.0 || mb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (ma * mb)
}

fn unknown_index(index: &str) -> AppError {
    AppError::IndexService {
        message: format!("{}: no such index", index),
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn drop_index(&self, index: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(schema) = state.indexes.remove(index) else {
            return Ok(false);
        };

        let prefix = format!("{}:", schema.prefix);
        state.hashes.retain(|key, _| !key.starts_with(&prefix));
        Ok(true)
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.state.read().await.indexes.contains_key(index))
    }

    async fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<()> {
        let mut state = self.state.write().await;
        if state.indexes.contains_key(index) {
            return Err(AppError::IndexService {
                message: "Index already exists".to_string(),
            });
        }
        state.indexes.insert(index.to_string(), schema.clone());
        Ok(())
    }

    async fn put(&self, _schema: &IndexSchema, entries: &[IndexEntry]) -> Result<()> {
        let mut state = self.state.write().await;
        for entry in entries {
            state.hashes.insert(
                entry.key.clone(),
                StoredHash {
                    text: entry.text.clone(),
                    vector: entry.vector.clone(),
                },
            );
        }
        Ok(())
    }

    async fn knn(&self, index: &str, query: &KnnQuery) -> Result<Vec<QueryResult>> {
        let state = self.state.read().await;
        let schema = state.indexes.get(index).ok_or_else(|| unknown_index(index))?;
        let query_vector = decode_vector(&query.vector, schema.dimension)?;
        let prefix = format!("{}:", schema.prefix);

        let mut results: Vec<QueryResult> = state
            .hashes
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            // Hashes whose vector does not fit the schema are not indexed
            .filter_map(|(_, hash)| {
                let vector = decode_vector(&hash.vector, schema.dimension).ok()?;
                Some(QueryResult {
                    text: hash.text.clone(),
                    score: cosine_distance(&query_vector, &vector),
                })
            })
            .collect();

        results.sort_by(|a, b| a.score.total_cmp(&b.score));
        results.truncate(query.k);
        Ok(results)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
