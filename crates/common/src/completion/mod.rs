//! Chat completion capability
//!
//! One user-role message in, one text completion out. The intent extractor
//! and the answer synthesizer are both built on this.

use crate::config::CompletionConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Trait for text completion
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Send a single user message and return the raw completion text
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completions client
pub struct OpenAIChat {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAIChat {
    pub fn new(api_key: String, config: &CompletionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAIChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::CompletionService {
                message: format!("LLM API request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::CompletionService {
                message: format!("LLM API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| AppError::CompletionService {
                message: format!("Failed to parse LLM response: {}", e),
            })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::CompletionService {
                message: "Empty response from LLM".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock completion model for development and tests.
///
/// Replies with the last line of the prompt, so callers get a stable,
/// non-empty completion without a network call.
pub struct MockCompletion;

#[async_trait]
impl CompletionModel for MockCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let last_line = prompt.lines().last().unwrap_or_default();
        Ok(format!(" {} \n[Mock response - LLM API key not configured]", last_line.trim()))
    }

    fn model_name(&self) -> &str {
        "mock-completion"
    }
}

/// Create a completion model based on configuration
pub fn create_completion_model(config: &CompletionConfig) -> Result<Arc<dyn CompletionModel>> {
    match config.provider.as_str() {
        "openai" => {
            let key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "OpenAI API key required for completion provider 'openai'".to_string(),
            })?;
            Ok(Arc::new(OpenAIChat::new(key, config)?))
        }
        "mock" => Ok(Arc::new(MockCompletion)),
        other => Err(AppError::Configuration {
            message: format!("Unknown completion provider: {}", other),
        }),
    }
}
