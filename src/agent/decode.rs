//! Strict decoding of the JSON replies the drafting and gate prompts ask for.
//!
//! Every reply decodes to a decision; output that does not match the contract
//! lands in an explicit `Unparsed` variant instead of an error.

use serde::Deserialize;

/// What the drafting model asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftDecision {
    /// More repository files are needed before drafting.
    NeedContext { files: Vec<String> },
    Draft { text: String },
    /// Not the documented shape; the raw reply is kept as a draft.
    Unparsed { raw: String },
}

/// What the gate model decided about a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    /// `text` is the (possibly lightly edited) final review, when supplied.
    Approved { text: Option<String> },
    Rejected { notes: Option<String> },
    Unparsed { raw: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum DraftReply {
    NeedContext {
        // Missing and null both mean "no specific files"
        #[serde(default)]
        requested_files: Option<Vec<String>>,
    },
    Draft {
        review_comment: String,
    },
}

#[derive(Debug, Deserialize)]
struct GateReply {
    ok: bool,
    #[serde(default)]
    final_review_comment: Option<String>,
    #[serde(default)]
    revision_notes: Option<String>,
}

/// Drop a single surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Skip the info string (`json`, `JSON`, ...) on the opening line
    match inner.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => trimmed,
    }
}

pub fn decode_draft(raw: &str) -> DraftDecision {
    match serde_json::from_str::<DraftReply>(strip_code_fence(raw)) {
        Ok(DraftReply::NeedContext { requested_files }) => DraftDecision::NeedContext {
            files: normalize_paths(requested_files.unwrap_or_default()),
        },
        Ok(DraftReply::Draft { review_comment }) => DraftDecision::Draft {
            text: review_comment,
        },
        Err(e) => {
            tracing::debug!(error = %e, "Draft reply is not the expected JSON");
            DraftDecision::Unparsed {
                raw: raw.to_string(),
            }
        }
    }
}

pub fn decode_gate(raw: &str) -> GateVerdict {
    match serde_json::from_str::<GateReply>(strip_code_fence(raw)) {
        Ok(GateReply {
            ok: true,
            final_review_comment,
            ..
        }) => GateVerdict::Approved {
            text: final_review_comment.filter(|t| !t.trim().is_empty()),
        },
        Ok(GateReply {
            ok: false,
            revision_notes,
            ..
        }) => GateVerdict::Rejected {
            notes: revision_notes.filter(|n| !n.trim().is_empty()),
        },
        Err(e) => {
            tracing::debug!(error = %e, "Gate reply is not the expected JSON");
            GateVerdict::Unparsed {
                raw: raw.to_string(),
            }
        }
    }
}

/// Trim paths, drop leading slashes, empties and duplicates; order is kept.
fn normalize_paths(paths: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.trim().trim_start_matches('/');
        if !path.is_empty() && !out.iter().any(|p| p == path) {
            out.push(path.to_string());
        }
    }
    out
}
