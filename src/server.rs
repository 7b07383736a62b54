use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;

use crate::agent::{build_model, LanguageModel};
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::platform::github::GitHubConnector;
use crate::platform::PlatformConnector;
use crate::workflow::{ReviewOutcome, ReviewRequest, ReviewWorkflow};

pub struct AppState {
    pub config: AppConfig,
    pub workflow: ReviewWorkflow,
    /// Bounds concurrent review runs.
    pub review_slots: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let connector = GitHubConnector::new(&config.github)?;
        let model = build_model(&config)?;
        Ok(Self::with_parts(config, Arc::new(connector), model))
    }

    pub fn with_parts(
        config: AppConfig,
        connector: Arc<dyn PlatformConnector>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        let workflow = ReviewWorkflow::new(connector, model, &config.workflow);
        let review_slots = Arc::new(Semaphore::new(config.server.max_concurrent_reviews));
        Self {
            config,
            workflow,
            review_slots,
        }
    }

    /// Validate a review request and fill in the configured repository.
    pub fn review_request(&self, body: ReviewBody) -> Result<ReviewRequest> {
        if body.prompt.trim().is_empty() {
            return Err(AppError::BadRequest("prompt must not be empty".to_string()));
        }

        let repo_url = body
            .repo_url
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.config.github.default_repo_url.clone())
            .ok_or(AppError::MissingRepoUrl)?;

        Ok(ReviewRequest {
            prompt: body.prompt,
            repo_url,
            github_token: body.github_token.filter(|t| !t.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    pub prompt: String,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub github_token: Option<String>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/review", post(review))
        .route("/health", get(health_check));

    if state.config.webhook_secret().is_some() {
        router = router.route(
            "/webhooks/github",
            post(crate::webhook::handler::handle_webhook),
        );
    } else {
        tracing::info!("No webhook secret configured, webhook endpoint disabled");
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn review(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReviewBody>,
) -> Result<Json<ReviewOutcome>> {
    let request = state.review_request(body)?;

    let _permit = state
        .review_slots
        .acquire()
        .await
        .map_err(|e| AppError::Internal(format!("review slots closed: {e}")))?;

    let outcome = state.workflow.run(request).await?;
    Ok(Json(outcome))
}

async fn health_check() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeConnector, FakePlatform, ScriptedModel};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn state_with(default_repo: Option<&str>, model: ScriptedModel) -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.github.default_repo_url = default_repo.map(str::to_string);
        Arc::new(AppState::with_parts(
            config,
            Arc::new(FakeConnector::new(FakePlatform::new(42))),
            Arc::new(model),
        ))
    }

    fn body(prompt: &str, repo_url: Option<&str>) -> ReviewBody {
        ReviewBody {
            prompt: prompt.to_string(),
            repo_url: repo_url.map(str::to_string),
            github_token: None,
        }
    }

    #[test]
    fn test_request_uses_default_repo() {
        let state = state_with(Some("acme/recipes"), ScriptedModel::new(Vec::<String>::new()));
        let request = state.review_request(body("PR #42", None)).unwrap();
        assert_eq!(request.repo_url, "acme/recipes");

        let request = state
            .review_request(body("PR #42", Some("acme/other")))
            .unwrap();
        assert_eq!(request.repo_url, "acme/other");
    }

    #[test]
    fn test_request_validation() {
        let state = state_with(None, ScriptedModel::new(Vec::<String>::new()));
        assert!(matches!(
            state.review_request(body("  ", Some("acme/recipes"))),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            state.review_request(body("PR #42", Some(""))),
            Err(AppError::MissingRepoUrl)
        ));
    }

    #[tokio::test]
    async fn test_review_endpoint_returns_outcome() {
        let model = ScriptedModel::new([
            r#"{"action":"draft","review_comment":"Good change."}"#,
            r#"{"ok":true}"#,
        ]);
        let state = state_with(Some("https://github.com/acme/recipes"), model);

        let Json(outcome) = review(State(state), Json(body("Please review PR #42", None)))
            .await
            .unwrap();

        assert!(outcome.posted);
        assert_eq!(outcome.final_response, "Good change.");
    }

    #[tokio::test]
    async fn test_review_endpoint_maps_missing_pr_to_400() {
        let state = state_with(Some("acme/recipes"), ScriptedModel::new(Vec::<String>::new()));

        let err = review(State(state), Json(body("review the latest change", None)))
            .await
            .unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_router_builds_with_and_without_webhook() {
        let state = state_with(None, ScriptedModel::new(Vec::<String>::new()));
        let _ = create_router(state);

        let mut config = AppConfig::default();
        config.github.webhook_secret = Some("s3cret".to_string());
        let state = Arc::new(AppState::with_parts(
            config,
            Arc::new(FakeConnector::new(FakePlatform::new(1))),
            Arc::new(ScriptedModel::new(Vec::<String>::new())),
        ));
        let _ = create_router(state);
    }
}
