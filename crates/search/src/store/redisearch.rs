//! RediSearch-backed vector store
//!
//! Entries are Redis hashes keyed `prefix:id`; the index is an `FT` index
//! over that prefix with a FLAT float32 vector field.

use super::{IndexEntry, IndexSchema, KnnQuery, QueryResult, VectorStore};
use async_trait::async_trait;
use docqa_common::errors::{AppError, Result};
use redis::{aio::MultiplexedConnection, Client, Cmd, RedisError, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Redis client with the search module loaded
pub struct RedisVectorStore {
    connection: RwLock<MultiplexedConnection>,
}

impl RedisVectorStore {
    /// Connect to the server at `url`
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::IndexService {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::IndexService {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        info!(url, "Connected to Redis");
        Ok(Self {
            connection: RwLock::new(connection),
        })
    }
}

/// RediSearch reports a missing index with one of these messages depending on version
fn is_unknown_index(err: &RedisError) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("unknown index") || message.contains("no such index")
}

/// `FT.CREATE` for the schema
fn create_index_cmd(index: &str, schema: &IndexSchema) -> Cmd {
    let mut cmd = redis::cmd("FT.CREATE");
    cmd.arg(index)
        .arg("ON")
        .arg("HASH")
        .arg("PREFIX")
        .arg(1)
        .arg(format!("{}:", schema.prefix))
        .arg("SCHEMA")
        .arg(&schema.text_field)
        .arg("TEXT")
        .arg(&schema.vector_field)
        .arg("VECTOR")
        .arg("FLAT")
        .arg(8)
        .arg("TYPE")
        .arg("FLOAT32")
        .arg("DIM")
        .arg(schema.dimension)
        .arg("DISTANCE_METRIC")
        .arg(schema.distance.as_str())
        .arg("INITIAL_CAP")
        .arg(schema.initial_capacity.max(1));
    cmd
}

/// Match-everything KNN query string
fn knn_query_string(query: &KnnQuery) -> String {
    format!(
        "(*)=>[KNN {} @{} $vector AS {}]",
        query.k, query.vector_field, query.score_field
    )
}

/// `FT.SEARCH` for a KNN query, sorted by distance
fn search_cmd(index: &str, query: &KnnQuery) -> Cmd {
    let mut cmd = redis::cmd("FT.SEARCH");
    cmd.arg(index)
        .arg(knn_query_string(query))
        .arg("PARAMS")
        .arg(2)
        .arg("vector")
        .arg(query.vector.as_slice())
        .arg("SORTBY")
        .arg(&query.score_field)
        .arg("ASC")
        .arg("RETURN")
        .arg(2)
        .arg(&query.text_field)
        .arg(&query.score_field)
        .arg("LIMIT")
        .arg(0)
        .arg(query.k)
        .arg("DIALECT")
        .arg(2);
    cmd
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::SimpleString(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Double(d) => Some(d.to_string()),
        _ => None,
    }
}

/// Parse the RESP2 reply `[total, key, [field, value, ...], key, [...], ...]`
fn parse_search_reply(reply: Value, query: &KnnQuery) -> Result<Vec<QueryResult>> {
    let items = match reply {
        Value::Array(items) => items,
        other => {
            return Err(AppError::IndexService {
                message: format!("Unexpected FT.SEARCH reply: {:?}", other),
            })
        }
    };

    let mut results = Vec::new();
    // Skip the total count; documents follow as (key, fields) pairs
    for pair in items.get(1..).unwrap_or_default().chunks(2) {
        let fields = match pair.get(1) {
            Some(Value::Array(fields)) => fields,
            _ => continue,
        };

        let mut text = None;
        let mut score = None;
        for field in fields.chunks(2) {
            let (Some(name), Some(value)) = (field.first(), field.get(1)) else {
                continue;
            };
            match value_to_string(name).as_deref() {
                Some(n) if n == query.text_field => text = value_to_string(value),
                Some(n) if n == query.score_field => {
                    score = value_to_string(value).and_then(|s| s.parse::<f32>().ok())
                }
                _ => {}
            }
        }

        if let (Some(text), Some(score)) = (text, score) {
            results.push(QueryResult { text, score });
        }
    }

    Ok(results)
}

#[async_trait]
impl VectorStore for RedisVectorStore {
    async fn drop_index(&self, index: &str) -> Result<bool> {
        let mut conn = self.connection.write().await;

        // DD removes the indexed hashes along with the index
        let result = redis::cmd("FT.DROPINDEX")
            .arg(index)
            .arg("DD")
            .query_async::<()>(&mut *conn)
            .await;

        match result {
            Ok(()) => Ok(true),
            Err(e) if is_unknown_index(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let mut conn = self.connection.write().await;

        match redis::cmd("FT.INFO")
            .arg(index)
            .query_async::<Value>(&mut *conn)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_unknown_index(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<()> {
        let mut conn = self.connection.write().await;
        create_index_cmd(index, schema)
            .query_async::<()>(&mut *conn)
            .await?;

        debug!(index, dimension = schema.dimension, "Created search index");
        Ok(())
    }

    async fn put(&self, schema: &IndexSchema, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for entry in entries {
            pipe.cmd("HSET")
                .arg(&entry.key)
                .arg("id")
                .arg(entry.id)
                .arg(&schema.text_field)
                .arg(&entry.text)
                .arg(&schema.vector_field)
                .arg(entry.vector.as_slice())
                .ignore();
        }

        let mut conn = self.connection.write().await;
        pipe.query_async::<()>(&mut *conn).await?;
        Ok(())
    }

    async fn knn(&self, index: &str, query: &KnnQuery) -> Result<Vec<QueryResult>> {
        let mut conn = self.connection.write().await;
        let reply = search_cmd(index, query)
            .query_async::<Value>(&mut *conn)
            .await?;

        parse_search_reply(reply, query)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| AppError::IndexService {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}
