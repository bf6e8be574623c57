//! docqa Search
//!
//! Vector storage and k-nearest-neighbour retrieval:
//! - Byte codec for float32 vectors
//! - Storage capability over RediSearch, with an in-memory engine
//! - The named vector index the pipeline loads and queries

pub mod codec;
pub mod index;
pub mod store;

pub use codec::{decode_vector, encode_vector, CodecError};
pub use index::{Chunk, IndexSettings, VectorIndex};
pub use store::{MemoryVectorStore, QueryResult, RedisVectorStore, VectorStore};
