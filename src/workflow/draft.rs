use crate::agent::decode::{decode_draft, DraftDecision};
use crate::agent::prompt::draft_prompt;
use crate::agent::LanguageModel;
use crate::error::Result;
use crate::workflow::router::Step;
use crate::workflow::state::WorkflowState;

/// Ask the model for a draft review or for more files.
pub async fn draft_review(state: &mut WorkflowState, model: &dyn LanguageModel) -> Result<()> {
    state.log_step(Step::Draft.name());

    // Notes from a rejection are only shown to one draft
    let notes = std::mem::take(&mut state.revision_notes);
    let request = draft_prompt(&state.user_prompt, &state.gathered_contexts, &notes);

    let raw = model.complete(&request).await?;
    apply_draft_decision(state, decode_draft(&raw));
    Ok(())
}

pub fn apply_draft_decision(state: &mut WorkflowState, decision: DraftDecision) {
    let text = match decision {
        DraftDecision::NeedContext { files } => {
            tracing::info!(pr = state.pr_number, files = ?files, "Draft step requested more context");
            state.log_output(format!("Requested files: {}", files.join(", ")));
            state.needs_more_context = true;
            state.requested_files = files;
            return;
        }
        DraftDecision::Draft { text } => text,
        DraftDecision::Unparsed { raw } => {
            tracing::warn!(pr = state.pr_number, "Draft reply was not JSON, using it verbatim");
            raw
        }
    };

    state.review_comment = text;
    if state.force_commentor_final && state.review_comment.trim().is_empty() {
        // Nothing to publish; post sees review_ok = false and skips
        state.review_ok = false;
        tracing::warn!(pr = state.pr_number, "Forced final draft is empty");
        state.log_output("Final draft is empty; nothing will be posted.");
    } else if state.force_commentor_final {
        state.final_review_comment = state.review_comment.clone();
        state.review_ok = true;
        state.log_output("Draft accepted as final without another gate pass.");
    } else {
        state.review_ok = false;
        state.log_output(format!("Draft written ({} chars).", state.review_comment.chars().count()));
    }
}
