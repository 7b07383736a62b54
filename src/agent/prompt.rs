use crate::agent::CompletionRequest;

const DRAFT_SYSTEM_PROMPT: &str = r#"You are a senior engineer reviewing a pull request the way a thoughtful human reviewer would.

Write a ~200-300 word review in markdown that covers:
- What is good about the PR.
- Whether the author followed ALL contribution rules, and what is missing.
- Whether new functionality has tests, and whether new models come with migrations (use the diff to decide).
- Whether new endpoints are documented (use the diff to decide).
- Which lines could be improved. Quote those lines and suggest concrete changes.

Address the author directly, for example:
"Thanks for fixing this. I think all places where we call quote should be fixed. Can you roll this fix out everywhere?"

If the available context is not enough to write a correct review, ask for the repository files you need instead of guessing."#;

const GATE_SYSTEM_PROMPT: &str = r#"You are the final quality check before a pull request review is posted to GitHub.

A review passes only if it:
- Is a ~200-300 word review in markdown.
- Says what is good about the PR.
- Says whether the author followed ALL contribution rules and what is missing.
- Notes whether new functionality has tests and whether new models have migrations.
- Notes whether new endpoints were documented.
- Suggests which lines could be improved, quoting those lines.

Approve a passing review, fixing only small wording or formatting issues. Otherwise reject it with a concrete, itemized list of what to fix."#;

pub fn draft_prompt(user_prompt: &str, gathered_contexts: &str, revision_notes: &str) -> CompletionRequest {
    let revision_notes = if revision_notes.trim().is_empty() {
        "(none)"
    } else {
        revision_notes.trim()
    };

    let user = format!(
        r#"## Request
{user_prompt}

## Available Context
{gathered}

## Revision Notes From Reviewer
{revision_notes}

## Task
Reply with a single JSON object and nothing else.
1. If you need more repository files to write a correct review:
   {{"action":"need_context","requested_files":["path/a.py","path/b.md"]}}
2. Otherwise:
   {{"action":"draft","review_comment":"...markdown, 200-300 words..."}}"#,
        gathered = gathered_contexts.trim(),
    );

    CompletionRequest {
        system: DRAFT_SYSTEM_PROMPT.to_string(),
        user,
    }
}

pub fn gate_prompt(draft: &str) -> CompletionRequest {
    let user = format!(
        r#"## Draft Review
{draft}

## Output
Reply with a single JSON object and nothing else.
- If the draft passes:
  {{"ok": true, "final_review_comment": "...the review, lightly edited if needed..."}}
- If it does not:
  {{"ok": false, "revision_notes": "itemized list of what to fix"}}"#,
        draft = draft.trim(),
    );

    CompletionRequest {
        system: GATE_SYSTEM_PROMPT.to_string(),
        user,
    }
}
