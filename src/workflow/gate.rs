use crate::agent::decode::{decode_gate, GateVerdict};
use crate::agent::prompt::gate_prompt;
use crate::agent::LanguageModel;
use crate::config::ExhaustionAction;
use crate::error::{AppError, Result};
use crate::workflow::policy::RetryPolicy;
use crate::workflow::router::Step;
use crate::workflow::state::WorkflowState;

pub const DEFAULT_REVISION_NOTES: &str = "Please rewrite to meet the criteria.";

pub const EMPTY_DRAFT_NOTES: &str = "The review is empty. Write the full review in review_comment.";

pub const UNPARSED_REVISION_NOTES: &str = "Output must be strict JSON and meet the review criteria (200-300 words, markdown, quoted lines, tests/docs/migrations notes).";

/// Judge the current draft against the review rubric.
pub async fn gate_review(
    state: &mut WorkflowState,
    model: &dyn LanguageModel,
    policy: &RetryPolicy,
) -> Result<()> {
    state.log_step(Step::Gate.name());

    let raw = model.complete(&gate_prompt(&state.review_comment)).await?;
    apply_gate_verdict(state, decode_gate(&raw), policy)
}

/// Record one gate pass. Fails only when the policy says to give up.
pub fn apply_gate_verdict(
    state: &mut WorkflowState,
    verdict: GateVerdict,
    policy: &RetryPolicy,
) -> Result<()> {
    state.reviewer_attempts += 1;

    let notes = match verdict {
        GateVerdict::Approved { text } => {
            let final_text = text.unwrap_or_else(|| state.review_comment.clone());
            if !final_text.trim().is_empty() {
                state.final_review_comment = final_text;
                state.review_ok = true;
                state.log_output("Gate approved the draft.");
                tracing::info!(
                    pr = state.pr_number,
                    attempts = state.reviewer_attempts,
                    "Review approved"
                );
                return Ok(());
            }
            tracing::warn!(pr = state.pr_number, "Gate approved an empty draft, treating as rejection");
            EMPTY_DRAFT_NOTES.to_string()
        }
        GateVerdict::Rejected { notes } => notes.unwrap_or_else(|| DEFAULT_REVISION_NOTES.to_string()),
        GateVerdict::Unparsed { .. } => {
            tracing::warn!(pr = state.pr_number, "Gate reply was not JSON, treating as rejection");
            UNPARSED_REVISION_NOTES.to_string()
        }
    };

    state.review_ok = false;
    state.log_output(format!("Gate rejected the draft: {notes}"));
    state.revision_notes = notes;
    tracing::info!(
        pr = state.pr_number,
        attempts = state.reviewer_attempts,
        "Review rejected"
    );

    if policy.is_exhausted(state.reviewer_attempts) {
        match policy.on_exhaustion {
            ExhaustionAction::AcceptNextDraft => {
                state.force_commentor_final = true;
                state.log_output("Retry budget spent; the next draft will be posted.");
            }
            ExhaustionAction::Fail => {
                return Err(AppError::GateExhausted {
                    attempts: state.reviewer_attempts,
                });
            }
        }
    }
    Ok(())
}
