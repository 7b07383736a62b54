use serde_json::json;

use crate::error::Result;
use crate::platform::types::{ChangedFile, PrDetails};
use crate::platform::Platform;
use crate::workflow::router::Step;
use crate::workflow::state::WorkflowState;

/// Files changed by one commit of the PR.
#[derive(Debug, Clone)]
pub struct CommitChanges {
    pub sha: String,
    pub files: Vec<ChangedFile>,
}

/// Fetch PR metadata, every commit's changed files and any files the draft
/// step asked for, and replace `gathered_contexts` with the rendered blob.
pub async fn gather_context(state: &mut WorkflowState, platform: &dyn Platform) -> Result<()> {
    state.log_step(Step::Context.name());

    let requested = std::mem::take(&mut state.requested_files);
    state.needs_more_context = false;

    let pr_number = state.pr_number;
    state.log_tool("get_pr_details", json!({ "pr_number": pr_number }));
    let pr = platform.get_pull_request(pr_number).await?;
    let commit_shas = platform.list_pull_request_commits(pr_number).await?;

    let mut commits = Vec::with_capacity(commit_shas.len());
    for sha in &commit_shas {
        state.log_tool("get_commit_details", json!({ "commit_sha": sha }));
        let files = platform.get_commit_files(sha).await?;
        commits.push(CommitChanges {
            sha: sha.clone(),
            files,
        });
    }

    let details = PrDetails::new(pr, commit_shas);
    let head = Some(details.head_sha.as_str()).filter(|sha| !sha.is_empty());

    let mut extra = Vec::with_capacity(requested.len());
    for path in requested {
        state.log_tool(
            "get_file_contents",
            json!({ "file_path": path, "ref": details.head_sha }),
        );
        let content = platform.get_file_contents(&path, head).await?;
        extra.push((path, content));
    }

    state.gathered_contexts = render_context(&details, &commits, &extra);
    state.log_output("Context gathered.");

    tracing::info!(
        pr = pr_number,
        commits = commits.len(),
        requested_files = extra.len(),
        bytes = state.gathered_contexts.len(),
        "Context gathered"
    );
    Ok(())
}

/// Markdown view of everything fetched. Output depends only on the inputs.
pub fn render_context(
    details: &PrDetails,
    commits: &[CommitChanges],
    requested: &[(String, String)],
) -> String {
    let mut out = String::new();

    out.push_str("## PR Details\n");
    out.push_str(&format!("- Author: {}\n", details.author));
    out.push_str(&format!("- Title: {}\n", details.title));
    out.push_str(&format!("- State: {}\n", details.state));
    out.push_str(&format!("- Diff URL: {}\n", details.diff_url));
    out.push_str(&format!("- Head commit: {}\n", details.head_sha));
    out.push_str(&format!("- Commits: {}\n", details.commit_shas.join(", ")));
    out.push_str("\n### Description\n");
    if details.body.trim().is_empty() {
        out.push_str("(no description)\n");
    } else {
        out.push_str(details.body.trim());
        out.push('\n');
    }

    out.push_str("\n## Changed Files\n");
    for commit in commits {
        out.push_str(&format!("\n### Commit {}\n", commit.sha));
        if commit.files.is_empty() {
            out.push_str("(no file changes)\n");
        }
        for file in &commit.files {
            out.push_str(&format!(
                "\n#### {} ({}, +{} -{}, {} changes)\n",
                file.filename, file.status, file.additions, file.deletions, file.changes
            ));
            if file.patch.is_empty() {
                out.push_str("(no patch available)\n");
            } else {
                out.push_str(&format!("```diff\n{}\n```\n", file.patch.trim_end()));
            }
        }
    }

    if !requested.is_empty() {
        out.push_str("\n## Requested Files\n");
        for (path, content) in requested {
            out.push_str(&format!("\n### {path}\n```\n{}\n```\n", content.trim_end()));
        }
    }

    out
}
