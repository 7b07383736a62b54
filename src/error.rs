use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("repo_url is required (or set GITHUB_REPO_URL)")]
    MissingRepoUrl,

    #[error("Invalid repository URL: {0}")]
    InvalidRepoUrl(String),

    #[error("PR number not found in prompt: {0:?}")]
    PrNumberNotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Webhook verification failed: {0}")]
    WebhookVerification(String),

    #[error("GitHub resource not found: {0}")]
    GitHubNotFound(String),

    #[error("GitHub authentication failed: {0}")]
    GitHubUnauthorized(String),

    #[error("GitHub API rate limited: {0}")]
    GitHubRateLimited(String),

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("LLM API rate limited: {0}")]
    LlmRateLimited(String),

    #[error("LLM API transient error: {0}")]
    LlmTransient(String),

    #[error("Quality gate rejected the draft {attempts} time(s)")]
    GateExhausted { attempts: u32 },

    #[error("Workflow exceeded {0} steps without finishing")]
    StepLimitExceeded(u32),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<octocrab::Error> for AppError {
    fn from(e: octocrab::Error) -> Self {
        match &e {
            octocrab::Error::GitHub { source, .. } => {
                let message = source.message.clone();
                match source.status_code.as_u16() {
                    404 => AppError::GitHubNotFound(message),
                    429 => AppError::GitHubRateLimited(message),
                    403 if message.to_lowercase().contains("rate limit") => {
                        AppError::GitHubRateLimited(message)
                    }
                    401 | 403 => AppError::GitHubUnauthorized(message),
                    status => AppError::GitHubApi(format!("{status}: {message}")),
                }
            }
            _ => AppError::GitHubApi(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_)
            | AppError::MissingRepoUrl
            | AppError::InvalidRepoUrl(_)
            | AppError::PrNumberNotFound(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::WebhookVerification(_) | AppError::GitHubUnauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::GitHubNotFound(_) => StatusCode::NOT_FOUND,
            AppError::GitHubRateLimited(_) | AppError::LlmRateLimited(_) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::GitHubApi(_)
            | AppError::LlmApi(_)
            | AppError::LlmTransient(_)
            | AppError::Http(_)
            | AppError::GateExhausted { .. } => StatusCode::BAD_GATEWAY,
            AppError::StepLimitExceeded(_)
            | AppError::Serialization(_)
            | AppError::Io(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
