use serde_json::json;

use crate::error::{AppError, Result};
use crate::platform::Platform;
use crate::workflow::router::Step;
use crate::workflow::state::WorkflowState;

/// Publish the approved review. Returns whether anything was posted.
pub async fn post_review(state: &mut WorkflowState, platform: &dyn Platform) -> Result<bool> {
    state.log_step(Step::Post.name());

    if !state.review_ok {
        tracing::warn!(pr = state.pr_number, "Review not approved, skipping post");
        state.log_output("Review not approved; nothing posted.");
        return Ok(false);
    }

    let body = state.final_text().to_string();
    if body.trim().is_empty() {
        return Err(AppError::Internal(format!(
            "refusing to post an empty review on PR #{}",
            state.pr_number
        )));
    }

    state.log_tool(
        "post_review_comment",
        json!({ "pr_number": state.pr_number, "body_len": body.chars().count() }),
    );
    platform.create_review(state.pr_number, &body).await?;

    state.log_output("Review posted.");
    tracing::info!(pr = state.pr_number, "Review posted");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakePlatform;

    fn approved(final_text: &str, draft: &str) -> WorkflowState {
        WorkflowState {
            pr_number: 42,
            review_ok: true,
            final_review_comment: final_text.to_string(),
            review_comment: draft.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_posts_final_text_once() {
        let platform = FakePlatform::new(42);
        let mut state = approved("Final review", "draft");

        assert!(post_review(&mut state, &platform).await.unwrap());

        assert_eq!(platform.posted(), vec![(42, "Final review".to_string())]);
        let call = state.tool_calls.last().unwrap();
        assert_eq!(call.tool, "post_review_comment");
        assert_eq!(call.args["body_len"], 12);
    }

    #[tokio::test]
    async fn test_falls_back_to_draft() {
        let platform = FakePlatform::new(42);
        let mut state = approved("", "only draft");

        post_review(&mut state, &platform).await.unwrap();
        assert_eq!(platform.posted()[0].1, "only draft");
    }

    #[tokio::test]
    async fn test_unapproved_is_noop() {
        let platform = FakePlatform::new(42);
        let mut state = approved("text", "text");
        state.review_ok = false;

        assert!(!post_review(&mut state, &platform).await.unwrap());
        assert!(platform.posted().is_empty());
        assert!(state.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_empty_body_refused() {
        let platform = FakePlatform::new(42);
        let mut state = approved("  ", "");

        let err = post_review(&mut state, &platform).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(platform.posted().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_propagates() {
        let mut platform = FakePlatform::new(42);
        platform.fail_post = true;
        let mut state = approved("Final", "");

        assert!(matches!(
            post_review(&mut state, &platform).await,
            Err(AppError::GitHubApi(_))
        ));
    }
}
