pub mod claude;
pub mod decode;
pub mod openai;
pub mod prompt;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{AppConfig, LlmProvider};
use crate::error::{AppError, Result};

/// A single-turn prompt: system instructions plus one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}

/// Text-in, text-out language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Retry behaviour for rate-limited and transient API failures.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RateLimitConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            enabled: config.llm.rate_limit_retry,
            max_retries: config.llm.rate_limit_max_retries,
            initial_backoff: Duration::from_secs(config.llm.rate_limit_backoff_secs),
        }
    }
}

/// Build the configured model client.
pub fn build_model(config: &AppConfig) -> Result<Arc<dyn LanguageModel>> {
    let api_key = config.llm_api_key()?;
    let rate_limit = RateLimitConfig::from_config(config);
    let llm = &config.llm;

    let model: Arc<dyn LanguageModel> = match llm.provider {
        LlmProvider::Anthropic => Arc::new(claude::ClaudeClient::new(
            api_key,
            llm.model_name(),
            llm.max_tokens,
            llm.temperature,
            llm.base_url.as_deref(),
            rate_limit,
        )),
        LlmProvider::OpenAi => Arc::new(openai::OpenAiClient::new(
            api_key,
            llm.model_name(),
            llm.max_tokens,
            llm.temperature,
            llm.base_url.as_deref(),
            rate_limit,
        )),
    };

    tracing::info!(provider = ?llm.provider, model = model.model(), "Language model configured");
    Ok(model)
}

/// Map a non-success HTTP status from a model API to an error.
pub(crate) fn status_error(status: reqwest::StatusCode, body: &str) -> AppError {
    let message = format!("API returned {status}: {body}");
    match status.as_u16() {
        429 => AppError::LlmRateLimited(message),
        500 | 502 | 503 | 504 | 529 => AppError::LlmTransient(message),
        _ => AppError::LlmApi(message),
    }
}

/// Run `attempt`, retrying rate-limited and transient failures with exponential backoff.
pub(crate) async fn with_backoff<F, Fut, T>(config: &RateLimitConfig, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = config.initial_backoff;
    let mut retries = 0u32;

    loop {
        match attempt().await {
            Err(e @ (AppError::LlmRateLimited(_) | AppError::LlmTransient(_)))
                if config.enabled && retries < config.max_retries =>
            {
                retries += 1;
                tracing::warn!(
                    error = %e,
                    retry = retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "LLM request failed, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            other => return other,
        }
    }
}
