//! Step graph of a review run.
//!
//! ```text
//! context ──► draft ──┬──► gate ──┬──► post ──► end
//!    ▲                │           │     ▲
//!    └── need context ┘           │     │
//!                     ▲  rejected │     │
//!                     └───────────┘     │
//!                 forced final ─────────┘
//! ```

use super::state::WorkflowState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Context,
    Draft,
    Gate,
    Post,
    End,
}

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Step::Context => "context",
            Step::Draft => "draft",
            Step::Gate => "gate",
            Step::Post => "post",
            Step::End => "end",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a step reported when it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Gathered,
    ContextRequested,
    ForcedFinal,
    DraftReady,
    Approved,
    Rejected,
    Published,
}

impl Signal {
    pub fn after_draft(state: &WorkflowState) -> Self {
        if state.needs_more_context {
            Signal::ContextRequested
        } else if state.force_commentor_final {
            Signal::ForcedFinal
        } else {
            Signal::DraftReady
        }
    }

    pub fn after_gate(state: &WorkflowState) -> Self {
        if state.review_ok {
            Signal::Approved
        } else {
            Signal::Rejected
        }
    }
}

/// Transition table. `None` means the pair cannot happen.
pub fn next_step(from: Step, signal: Signal) -> Option<Step> {
    match (from, signal) {
        (Step::Context, Signal::Gathered) => Some(Step::Draft),
        (Step::Draft, Signal::ContextRequested) => Some(Step::Context),
        (Step::Draft, Signal::ForcedFinal) => Some(Step::Post),
        (Step::Draft, Signal::DraftReady) => Some(Step::Gate),
        (Step::Gate, Signal::Approved) => Some(Step::Post),
        (Step::Gate, Signal::Rejected) => Some(Step::Draft),
        (Step::Post, Signal::Published) => Some(Step::End),
        _ => None,
    }
}

pub fn route_after_draft(state: &WorkflowState) -> Step {
    match Signal::after_draft(state) {
        Signal::ContextRequested => Step::Context,
        Signal::ForcedFinal => Step::Post,
        _ => Step::Gate,
    }
}

pub fn route_after_gate(state: &WorkflowState) -> Step {
    match Signal::after_gate(state) {
        Signal::Approved => Step::Post,
        _ => Step::Draft,
    }
}
