//! docqa Common Library
//!
//! Shared code for the docqa crates including:
//! - Configuration management
//! - Error types and the fail-soft `Outcome`
//! - Embedding capability and gateway
//! - Completion capability, intent extraction and answer synthesis
//! - Metrics and observability

pub mod completion;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod errors;
pub mod metrics;

// Re-export commonly used types
pub use completion::CompletionModel;
pub use config::AppConfig;
pub use embeddings::{Embedder, EmbeddingGateway};
pub use errors::{AppError, Outcome, Result, Stage, StageFailure};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Default embedding dimension (text-embedding-ada-002)
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Default chat completion model
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo";
