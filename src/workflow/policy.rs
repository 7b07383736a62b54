use crate::config::{ExhaustionAction, WorkflowConfig};

/// Bounds the draft/gate revision loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Gate rejections allowed before `on_exhaustion` applies.
    pub max_attempts: u32,
    pub on_exhaustion: ExhaustionAction,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            on_exhaustion: ExhaustionAction::AcceptNextDraft,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            max_attempts: config.max_gate_attempts.max(1),
            on_exhaustion: config.on_exhaustion,
        }
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}
