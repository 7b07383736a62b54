use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_concurrent_reviews")]
    pub max_concurrent_reviews: usize,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_reviews: default_max_concurrent_reviews(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    /// Personal or fine-grained access token used when a request carries none.
    pub token: Option<String>,
    /// Repository reviewed when a request omits `repo_url`.
    pub default_repo_url: Option<String>,
    /// REST API root, for GitHub Enterprise Server.
    pub api_base_url: Option<String>,
    pub app: Option<GitHubAppConfig>,
    /// Enables `POST /webhooks/github` when set.
    pub webhook_secret: Option<String>,
    #[serde(default = "default_review_command")]
    pub review_command: String,
    #[serde(default)]
    pub review_on_open: bool,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            default_repo_url: None,
            api_base_url: None,
            app: None,
            webhook_secret: None,
            review_command: default_review_command(),
            review_on_open: false,
        }
    }
}

// Manual Debug impl to avoid leaking the token and webhook secret
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("default_repo_url", &self.default_repo_url)
            .field("api_base_url", &self.api_base_url)
            .field("app", &self.app)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("review_command", &self.review_command)
            .field("review_on_open", &self.review_on_open)
            .finish()
    }
}

/// GitHub App credentials, used when no access token is available.
#[derive(Debug, Deserialize, Clone)]
pub struct GitHubAppConfig {
    pub app_id: u64,
    pub private_key_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    OpenAi,
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_rate_limit_retry")]
    pub rate_limit_retry: bool,
    #[serde(default = "default_rate_limit_max_retries")]
    pub rate_limit_max_retries: u32,
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            api_key: None,
            model: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            rate_limit_retry: default_rate_limit_retry(),
            rate_limit_max_retries: default_rate_limit_max_retries(),
            rate_limit_backoff_secs: default_rate_limit_backoff_secs(),
        }
    }
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("rate_limit_retry", &self.rate_limit_retry)
            .field("rate_limit_max_retries", &self.rate_limit_max_retries)
            .field("rate_limit_backoff_secs", &self.rate_limit_backoff_secs)
            .finish()
    }
}

impl LlmConfig {
    pub fn model_name(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, LlmProvider::Anthropic) => "claude-sonnet-4-20250514",
            (None, LlmProvider::OpenAi) => "gpt-4o-mini",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionAction {
    /// Accept the next draft as final without another gate pass.
    #[default]
    AcceptNextDraft,
    /// Abort the run.
    Fail,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    #[serde(default = "default_max_gate_attempts")]
    pub max_gate_attempts: u32,
    #[serde(default)]
    pub on_exhaustion: ExhaustionAction,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_gate_attempts: default_max_gate_attempts(),
            on_exhaustion: ExhaustionAction::default(),
            max_steps: default_max_steps(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_concurrent_reviews() -> usize {
    4
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

fn default_review_command() -> String {
    "/review".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.2
}

fn default_rate_limit_retry() -> bool {
    true
}

fn default_rate_limit_max_retries() -> u32 {
    3
}

fn default_rate_limit_backoff_secs() -> u64 {
    2
}

fn default_max_gate_attempts() -> u32 {
    1
}

fn default_max_steps() -> u32 {
    25
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(
                config::File::with_name("pr-review-agent").required(false),
            );
        }

        // Environment variable overrides with PR_REVIEW_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("PR_REVIEW")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let mut app: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        app.apply_env_fallbacks(|key| std::env::var(key).ok());
        app.validate()?;
        Ok(app)
    }

    /// Fill unset secrets from the conventional variables (`GITHUB_TOKEN`, ...).
    fn apply_env_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.github.token.is_none() {
            self.github.token = non_empty("GITHUB_TOKEN");
        }
        if self.github.default_repo_url.is_none() {
            self.github.default_repo_url = non_empty("GITHUB_REPO_URL");
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = match self.llm.provider {
                LlmProvider::Anthropic => non_empty("ANTHROPIC_API_KEY"),
                LlmProvider::OpenAi => non_empty("OPENAI_API_KEY"),
            };
        }
    }

    fn validate(&self) -> Result<()> {
        if self.workflow.max_gate_attempts == 0 {
            return Err(AppError::Config(
                "workflow.max_gate_attempts must be at least 1".to_string(),
            ));
        }
        if self.workflow.max_steps < 4 {
            return Err(AppError::Config(
                "workflow.max_steps must allow at least context, draft, gate and post".to_string(),
            ));
        }
        if self.server.max_concurrent_reviews == 0 {
            return Err(AppError::Config(
                "server.max_concurrent_reviews must be at least 1".to_string(),
            ));
        }
        let slot_limit = tokio::sync::Semaphore::MAX_PERMITS.min(u32::MAX as usize);
        if self.server.max_concurrent_reviews > slot_limit {
            return Err(AppError::Config(format!(
                "server.max_concurrent_reviews must be at most {slot_limit}"
            )));
        }
        Ok(())
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.github
            .webhook_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
    }

    pub fn llm_api_key(&self) -> Result<&str> {
        self.llm.api_key.as_deref().ok_or_else(|| {
            AppError::Config(format!(
                "llm.api_key is required for provider {:?} (or set {})",
                self.llm.provider,
                match self.llm.provider {
                    LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
                    LlmProvider::OpenAi => "OPENAI_API_KEY",
                }
            ))
        })
    }
}
