use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::config::GitHubConfig;
use crate::server::AppState;
use crate::webhook::events::{IssueCommentEvent, PullRequestEvent, WebhookEvent};
use crate::webhook::signature::verify_signature;
use crate::workflow::ReviewRequest;

/// What a webhook delivery asks of us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Review { repo_url: String, pr_number: u64 },
    Ignore,
}

pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(secret) = state.config.webhook_secret() else {
        return StatusCode::NOT_FOUND;
    };

    // Extract required headers
    let signature = match headers.get("x-hub-signature-256").and_then(|v| v.to_str().ok()) {
        Some(sig) => sig.to_string(),
        None => {
            tracing::warn!("Missing X-Hub-Signature-256 header");
            return StatusCode::UNAUTHORIZED;
        }
    };

    let event_type = match headers.get("x-github-event").and_then(|v| v.to_str().ok()) {
        Some(et) => et.to_string(),
        None => {
            tracing::warn!("Missing X-GitHub-Event header");
            return StatusCode::BAD_REQUEST;
        }
    };

    if let Err(e) = verify_signature(secret, &body, &signature) {
        tracing::warn!(error = %e, "Webhook signature verification failed");
        return StatusCode::UNAUTHORIZED;
    }

    let event = match WebhookEvent::parse(&event_type, &body) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, event_type = %event_type, "Failed to parse webhook event");
            return StatusCode::BAD_REQUEST;
        }
    };

    tracing::info!(event_type = %event_type, "Received webhook event");

    match decide(&event, &state.config.github) {
        Trigger::Review {
            repo_url,
            pr_number,
        } => {
            spawn_review(Arc::clone(&state), repo_url, pr_number);
            StatusCode::ACCEPTED
        }
        Trigger::Ignore => StatusCode::OK,
    }
}

/// Decide whether a delivery should start a review.
pub fn decide(event: &WebhookEvent, config: &GitHubConfig) -> Trigger {
    match event {
        WebhookEvent::PullRequest(event) => decide_pull_request(event, config),
        WebhookEvent::IssueComment(event) => decide_issue_comment(event, config),
        WebhookEvent::Ping => {
            tracing::info!("Received ping event");
            Trigger::Ignore
        }
        WebhookEvent::Unsupported(event_type) => {
            tracing::debug!(event_type = %event_type, "Ignoring unsupported event");
            Trigger::Ignore
        }
    }
}

fn decide_pull_request(event: &PullRequestEvent, config: &GitHubConfig) -> Trigger {
    if !config.review_on_open {
        return Trigger::Ignore;
    }
    if !matches!(
        event.action.as_str(),
        "opened" | "reopened" | "ready_for_review"
    ) {
        return Trigger::Ignore;
    }
    if event.pull_request.draft {
        tracing::debug!(pr = event.pull_request.number, "Skipping draft PR");
        return Trigger::Ignore;
    }

    tracing::info!(
        repo = %event.repository.full_name,
        pr = event.pull_request.number,
        action = %event.action,
        "Pull request ready, starting review"
    );
    Trigger::Review {
        repo_url: event.repository.html_url.clone(),
        pr_number: event.pull_request.number,
    }
}

fn decide_issue_comment(event: &IssueCommentEvent, config: &GitHubConfig) -> Trigger {
    if event.action != "created" || event.issue.pull_request.is_none() {
        return Trigger::Ignore;
    }

    // Ignore comments from bots (including our own) to prevent feedback loops
    if event.comment.user.is_bot() {
        tracing::debug!(user = %event.comment.user.login, "Ignoring comment from bot");
        return Trigger::Ignore;
    }

    let body = event.comment.body.as_deref().unwrap_or_default().trim_start();
    if config.review_command.is_empty() || !body.starts_with(config.review_command.as_str()) {
        return Trigger::Ignore;
    }

    tracing::info!(
        repo = %event.repository.full_name,
        pr = event.issue.number,
        user = %event.comment.user.login,
        "Review requested by comment"
    );
    Trigger::Review {
        repo_url: event.repository.html_url.clone(),
        pr_number: event.issue.number,
    }
}

fn spawn_review(state: Arc<AppState>, repo_url: String, pr_number: u64) {
    let request = ReviewRequest {
        prompt: format!("Please review PR #{pr_number}"),
        repo_url,
        github_token: None,
    };

    // Take a slot now when one is free so shutdown sees the run as in flight
    let slots = Arc::clone(&state.review_slots);
    let ready = Arc::clone(&slots).try_acquire_owned().ok();

    tokio::spawn(async move {
        let _permit = match ready {
            Some(permit) => permit,
            None => match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!(pr = pr_number, "Shutting down, dropping review");
                    return;
                }
            },
        };

        match state.workflow.run(request).await {
            Ok(outcome) => {
                tracing::info!(pr = pr_number, posted = outcome.posted, "Webhook review finished")
            }
            Err(e) => tracing::error!(pr = pr_number, error = %e, "Webhook review failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::test_support::{FakeConnector, FakePlatform, ScriptedModel};
    use crate::webhook::signature::sign_payload;
    use axum::http::HeaderValue;

    const SECRET: &str = "webhook-secret";

    fn config(review_on_open: bool) -> GitHubConfig {
        GitHubConfig {
            review_on_open,
            webhook_secret: Some(SECRET.to_string()),
            ..Default::default()
        }
    }

    fn pr_event(action: &str, draft: bool) -> WebhookEvent {
        let payload = serde_json::json!({
            "action": action,
            "pull_request": {"number": 42, "draft": draft, "user": {"login": "octocat", "type": "User"}},
            "repository": {"full_name": "acme/recipes", "html_url": "https://github.com/acme/recipes"}
        });
        WebhookEvent::parse("pull_request", payload.to_string().as_bytes()).unwrap()
    }

    fn comment_payload(body: &str, login: &str, on_pr: bool) -> String {
        let mut issue = serde_json::json!({ "number": 42 });
        if on_pr {
            issue["pull_request"] = serde_json::json!({ "url": "https://api.github.com/repos/acme/recipes/pulls/42" });
        }
        serde_json::json!({
            "action": "created",
            "issue": issue,
            "comment": {"body": body, "user": {"login": login, "type": "User"}},
            "repository": {"full_name": "acme/recipes", "html_url": "https://github.com/acme/recipes"}
        })
        .to_string()
    }

    fn comment_event(body: &str, login: &str, on_pr: bool) -> WebhookEvent {
        WebhookEvent::parse("issue_comment", comment_payload(body, login, on_pr).as_bytes()).unwrap()
    }

    fn review_of_42() -> Trigger {
        Trigger::Review {
            repo_url: "https://github.com/acme/recipes".to_string(),
            pr_number: 42,
        }
    }

    #[test]
    fn test_opened_pr_triggers_when_enabled() {
        assert_eq!(decide(&pr_event("opened", false), &config(true)), review_of_42());
        assert_eq!(
            decide(&pr_event("ready_for_review", false), &config(true)),
            review_of_42()
        );
        assert_eq!(decide(&pr_event("opened", false), &config(false)), Trigger::Ignore);
    }

    #[test]
    fn test_draft_and_other_actions_ignored() {
        assert_eq!(decide(&pr_event("opened", true), &config(true)), Trigger::Ignore);
        assert_eq!(decide(&pr_event("closed", false), &config(true)), Trigger::Ignore);
        assert_eq!(decide(&pr_event("synchronize", false), &config(true)), Trigger::Ignore);
    }

    #[test]
    fn test_review_command_on_pr_triggers() {
        let event = comment_event("/review please", "octocat", true);
        assert_eq!(decide(&event, &config(false)), review_of_42());
    }

    #[test]
    fn test_comment_filters() {
        let github = config(false);
        assert_eq!(
            decide(&comment_event("/review", "octocat", false), &github),
            Trigger::Ignore
        );
        assert_eq!(
            decide(&comment_event("/review", "review-bot[bot]", true), &github),
            Trigger::Ignore
        );
        assert_eq!(
            decide(&comment_event("looks good", "octocat", true), &github),
            Trigger::Ignore
        );
    }

    fn sign(body: &[u8]) -> String {
        sign_payload(SECRET, body).unwrap()
    }

    fn headers(event: &str, signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-github-event", HeaderValue::from_str(event).unwrap());
        headers.insert("x-hub-signature-256", HeaderValue::from_str(signature).unwrap());
        headers
    }

    fn app_state(platform: FakePlatform, model: ScriptedModel) -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.github = config_with_token();
        Arc::new(AppState::with_parts(
            config,
            Arc::new(FakeConnector::new(platform)),
            Arc::new(model),
        ))
    }

    fn config_with_token() -> GitHubConfig {
        GitHubConfig {
            token: Some("ghp_test".to_string()),
            ..config(false)
        }
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let state = app_state(FakePlatform::new(42), ScriptedModel::new(Vec::<String>::new()));
        let body = Bytes::from(comment_payload("/review", "octocat", true));

        let status = handle_webhook(State(state), headers("issue_comment", "sha256=00"), body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_ping_and_malformed_payloads() {
        let state = app_state(FakePlatform::new(42), ScriptedModel::new(Vec::<String>::new()));

        let ping = Bytes::from_static(br#"{"zen":"Keep it logically awesome."}"#);
        let status =
            handle_webhook(State(Arc::clone(&state)), headers("ping", &sign(&ping)), ping).await;
        assert_eq!(status, StatusCode::OK);

        let broken = Bytes::from_static(br#"{"action":"created"}"#);
        let status =
            handle_webhook(State(state), headers("issue_comment", &sign(&broken)), broken).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_review_command_runs_review_in_background() {
        let platform = FakePlatform::new(42);
        let model = ScriptedModel::new([
            r#"{"action":"draft","review_comment":"Nice work."}"#,
            r#"{"ok":true,"final_review_comment":"Nice work, ship it."}"#,
        ]);
        let state = app_state(platform.clone(), model);
        let body = Bytes::from(comment_payload("/review", "octocat", true));

        let status = handle_webhook(
            State(Arc::clone(&state)),
            headers("issue_comment", &sign(&body)),
            body,
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        crate::shutdown::graceful_shutdown(&state).await;
        assert_eq!(platform.posted(), vec![(42, "Nice work, ship it.".to_string())]);
    }

    #[tokio::test]
    async fn test_review_after_shutdown_is_dropped() {
        let platform = FakePlatform::new(42);
        let model = ScriptedModel::new([
            r#"{"action":"draft","review_comment":"Nice work."}"#,
            r#"{"ok":true}"#,
        ]);
        let state = app_state(platform.clone(), model);
        crate::shutdown::graceful_shutdown(&state).await;

        let body = Bytes::from(comment_payload("/review", "octocat", true));
        let status = handle_webhook(
            State(Arc::clone(&state)),
            headers("issue_comment", &sign(&body)),
            body,
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(platform.posted().is_empty());
    }
}
