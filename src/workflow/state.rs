use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{AppError, Result};

/// One external call made during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub args: serde_json::Value,
}

/// Observability log entry. Never read by routing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A step started.
    Step { name: String },
    ToolCall { tool: String },
    /// Intermediate output of a step.
    Output { content: String },
    Route { from: String, to: String },
}

/// State of a single review run, owned by the executor and lent to each step.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowState {
    pub repo_url: String,
    pub user_prompt: String,
    #[serde(skip)]
    pub github_token: Option<String>,
    pub pr_number: u64,

    pub gathered_contexts: String,
    pub review_comment: String,
    pub final_review_comment: String,

    pub review_ok: bool,
    pub revision_notes: String,
    pub needs_more_context: bool,
    pub requested_files: Vec<String>,
    pub reviewer_attempts: u32,
    pub force_commentor_final: bool,

    pub tool_calls: Vec<ToolCallRecord>,
    pub events: Vec<WorkflowEvent>,
}

impl WorkflowState {
    /// Start a run. Fails when the prompt names no PR.
    pub fn new(repo_url: &str, user_prompt: &str, github_token: Option<String>) -> Result<Self> {
        let pr_number = extract_pr_number(user_prompt)?;
        Ok(Self {
            repo_url: repo_url.to_string(),
            user_prompt: user_prompt.to_string(),
            github_token,
            pr_number,
            ..Default::default()
        })
    }

    pub fn log_step(&mut self, name: &str) {
        self.events.push(WorkflowEvent::Step {
            name: name.to_string(),
        });
    }

    pub fn log_tool(&mut self, tool: &str, args: serde_json::Value) {
        self.tool_calls.push(ToolCallRecord {
            tool: tool.to_string(),
            args,
        });
        self.events.push(WorkflowEvent::ToolCall {
            tool: tool.to_string(),
        });
    }

    pub fn log_output(&mut self, content: impl Into<String>) {
        self.events.push(WorkflowEvent::Output {
            content: content.into(),
        });
    }

    pub fn log_route(&mut self, from: &str, to: &str) {
        self.events.push(WorkflowEvent::Route {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    /// The text a caller should see: final review, else the latest draft.
    pub fn final_text(&self) -> &str {
        if !self.final_review_comment.is_empty() {
            &self.final_review_comment
        } else {
            &self.review_comment
        }
    }
}

fn pr_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:#|PR\s*)(\d+)").expect("PR number pattern is valid")
    })
}

/// Find the PR number in a free-text prompt: `#42`, `PR 42`, `pr42`.
pub fn extract_pr_number(user_prompt: &str) -> Result<u64> {
    pr_number_pattern()
        .captures(user_prompt)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .ok_or_else(|| AppError::PrNumberNotFound(user_prompt.to_string()))
}
