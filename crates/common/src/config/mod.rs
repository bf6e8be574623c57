//! Configuration management for docqa
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Vector index configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Completion service configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Retrieval pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds. Covers a full reindex, so it is generous.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Which vector-storage engine backs the index
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// Redis URL (must point at a server with the search module loaded)
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Name of the single vector index
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Key prefix for index entries (`prefix:id`)
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default = "default_index_backend")]
    pub backend: IndexBackend,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// Completion provider: openai, mock
    #[serde(default = "default_completion_provider")]
    pub provider: String,

    pub api_key: Option<String>,

    /// Chat completions endpoint
    #[serde(default = "default_completion_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,

    /// Language the intent keywords are normalized to
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_length")]
    pub chunk_length: usize,

    /// Number of facts retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Embed the raw question when intent extraction comes back empty
    #[serde(default = "default_intent_fallback")]
    pub intent_fallback_to_question: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 120 }
fn default_redis_url() -> String { "redis://localhost:6380".to_string() }
fn default_index_name() -> String { "embeddings-index".to_string() }
fn default_key_prefix() -> String { "doc".to_string() }
fn default_index_backend() -> IndexBackend { IndexBackend::Redis }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_batch_size() -> usize { 100 }
fn default_completion_provider() -> String { "openai".to_string() }
fn default_completion_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_completion_model() -> String { crate::DEFAULT_COMPLETION_MODEL.to_string() }
fn default_completion_timeout() -> u64 { 60 }
fn default_target_language() -> String { "Korean".to_string() }
fn default_chunk_length() -> usize { 1000 }
fn default_top_k() -> usize { 5 }
fn default_intent_fallback() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "docqa".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            index_name: default_index_name(),
            key_prefix: default_key_prefix(),
            backend: default_index_backend(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            api_key: None,
            endpoint: default_completion_endpoint(),
            model: default_completion_model(),
            timeout_secs: default_completion_timeout(),
            target_language: default_target_language(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_length: default_chunk_length(),
            top_k: default_top_k(),
            intent_fallback_to_question: default_intent_fallback(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            redis: RedisConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
            pipeline: PipelineConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__REDIS__URL=redis://cache:6379
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let config: Self = config.try_deserialize()?;
        Ok(config.with_openai_key_fallback(std::env::var("OPENAI_API_KEY").ok()))
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        Ok(config.with_openai_key_fallback(std::env::var("OPENAI_API_KEY").ok()))
    }

    /// Fill unset API keys from the conventional OpenAI variable
    fn with_openai_key_fallback(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            if self.embedding.api_key.is_none() {
                self.embedding.api_key = Some(key.clone());
            }
            if self.completion.api_key.is_none() {
                self.completion.api_key = Some(key);
            }
        }
        self
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}
