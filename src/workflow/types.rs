use serde::Serialize;

use crate::workflow::state::{ToolCallRecord, WorkflowEvent, WorkflowState};

/// Result of a finished review run.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    /// Final review text, else the latest draft, else empty.
    pub final_response: String,
    pub pr_number: u64,
    /// Whether a review was published to the host.
    pub posted: bool,
    pub state: StateSnapshot,
    pub tool_calls: Vec<ToolCallRecord>,
    pub events: Vec<WorkflowEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub gathered_contexts: String,
    pub review_comment: String,
    pub final_review_comment: String,
}

impl ReviewOutcome {
    pub fn from_state(state: WorkflowState, posted: bool) -> Self {
        Self {
            final_response: state.final_text().to_string(),
            pr_number: state.pr_number,
            posted,
            state: StateSnapshot {
                gathered_contexts: state.gathered_contexts,
                review_comment: state.review_comment,
                final_review_comment: state.final_review_comment,
            },
            tool_calls: state.tool_calls,
            events: state.events,
        }
    }
}
