use std::sync::Arc;

use tracing::Instrument;

use crate::agent::LanguageModel;
use crate::config::WorkflowConfig;
use crate::error::{AppError, Result};
use crate::platform::types::RepoRef;
use crate::platform::{Platform, PlatformConnector};
use crate::workflow::context::gather_context;
use crate::workflow::draft::draft_review;
use crate::workflow::gate::gate_review;
use crate::workflow::policy::RetryPolicy;
use crate::workflow::post::post_review;
use crate::workflow::router::{next_step, Signal, Step};
use crate::workflow::state::WorkflowState;
use crate::workflow::types::ReviewOutcome;

/// Input of one review run.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub prompt: String,
    pub repo_url: String,
    pub github_token: Option<String>,
}

/// Drives context → draft → gate → post for a single PR.
pub struct ReviewWorkflow {
    connector: Arc<dyn PlatformConnector>,
    model: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
    max_steps: u32,
}

impl ReviewWorkflow {
    pub fn new(
        connector: Arc<dyn PlatformConnector>,
        model: Arc<dyn LanguageModel>,
        config: &WorkflowConfig,
    ) -> Self {
        Self {
            connector,
            model,
            policy: RetryPolicy::from_config(config),
            max_steps: config.max_steps,
        }
    }

    pub async fn run(&self, request: ReviewRequest) -> Result<ReviewOutcome> {
        let state =
            WorkflowState::new(&request.repo_url, &request.prompt, request.github_token)?;
        let repo = RepoRef::parse(&state.repo_url)?;

        let span = tracing::info_span!("review", repo = %repo, pr = state.pr_number);
        self.execute(state, repo).instrument(span).await
    }

    async fn execute(&self, mut state: WorkflowState, repo: RepoRef) -> Result<ReviewOutcome> {
        tracing::info!("Starting review");
        // Host client lives for this run only
        let platform = self
            .connector
            .connect(&repo, state.github_token.as_deref())
            .await?;
        let posted = self.drive(&mut state, platform.as_ref()).await?;
        tracing::info!(
            posted,
            attempts = state.reviewer_attempts,
            tool_calls = state.tool_calls.len(),
            "Review finished"
        );
        Ok(ReviewOutcome::from_state(state, posted))
    }

    async fn drive(&self, state: &mut WorkflowState, platform: &dyn Platform) -> Result<bool> {
        let mut step = Step::Context;
        let mut executed = 0u32;
        let mut posted = false;

        while step != Step::End {
            if executed >= self.max_steps {
                return Err(AppError::StepLimitExceeded(self.max_steps));
            }
            executed += 1;

            let signal = match step {
                Step::Context => {
                    gather_context(state, platform).await?;
                    Signal::Gathered
                }
                Step::Draft => {
                    draft_review(state, self.model.as_ref()).await?;
                    Signal::after_draft(state)
                }
                Step::Gate => {
                    gate_review(state, self.model.as_ref(), &self.policy).await?;
                    Signal::after_gate(state)
                }
                Step::Post => {
                    posted = post_review(state, platform).await?;
                    Signal::Published
                }
                Step::End => break,
            };

            let next = next_step(step, signal).ok_or_else(|| {
                AppError::Internal(format!("no transition from {step} on {signal:?}"))
            })?;
            tracing::debug!(from = %step, to = %next, "Route");
            state.log_route(step.name(), next.name());
            step = next;
        }

        Ok(posted)
    }
}
