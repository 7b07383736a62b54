use base64::Engine;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::platform::types;

#[derive(Debug, Deserialize)]
pub struct UserPayload {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct HeadPayload {
    pub sha: String,
}

/// Subset of `GET /repos/{owner}/{repo}/pulls/{number}`.
#[derive(Debug, Deserialize)]
pub struct PullRequestPayload {
    pub number: u64,
    pub user: Option<UserPayload>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub diff_url: Option<String>,
    pub state: Option<String>,
    pub head: Option<HeadPayload>,
}

#[derive(Debug, Deserialize)]
pub struct CommitRefPayload {
    pub sha: String,
}

/// Subset of `GET /repos/{owner}/{repo}/commits/{sha}`.
#[derive(Debug, Deserialize)]
pub struct CommitPayload {
    pub sha: String,
    #[serde(default)]
    pub files: Vec<CommitFilePayload>,
}

#[derive(Debug, Deserialize)]
pub struct CommitFilePayload {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changes: u64,
    pub patch: Option<String>,
}

/// Subset of `GET /repos/{owner}/{repo}/contents/{path}` for a file.
#[derive(Debug, Deserialize)]
pub struct ContentPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

pub fn map_pull_request(pr: PullRequestPayload) -> types::PullRequest {
    types::PullRequest {
        number: pr.number,
        author: pr
            .user
            .map(|u| u.login)
            .unwrap_or_else(|| "unknown".to_string()),
        title: pr.title.unwrap_or_default(),
        body: pr.body.unwrap_or_default(),
        diff_url: pr.diff_url.unwrap_or_default(),
        state: pr.state.unwrap_or_default(),
        head_sha: pr.head.map(|h| h.sha).unwrap_or_default(),
    }
}

pub fn map_changed_files(commit: CommitPayload) -> Vec<types::ChangedFile> {
    commit
        .files
        .into_iter()
        .map(|f| types::ChangedFile {
            filename: f.filename,
            status: f.status,
            additions: f.additions,
            deletions: f.deletions,
            changes: f.changes,
            patch: f.patch.unwrap_or_default(),
        })
        .collect()
}

/// Decode a contents-API payload into UTF-8 text.
pub fn decode_content(payload: ContentPayload) -> Result<String> {
    if payload.kind != "file" {
        return Err(AppError::GitHubApi(format!(
            "{} is a {}, not a file",
            payload.path, payload.kind
        )));
    }

    match payload.encoding.as_deref() {
        Some("base64") => {}
        other => {
            // GitHub answers with encoding "none" for files over 1 MB
            return Err(AppError::GitHubApi(format!(
                "Unsupported content encoding {:?} for {}",
                other.unwrap_or("missing"),
                payload.path
            )));
        }
    }

    let compact: String = payload
        .content
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| AppError::GitHubApi(format!("Invalid base64 for {}: {e}", payload.path)))?;

    String::from_utf8(bytes)
        .map_err(|_| AppError::GitHubApi(format!("{} is not valid UTF-8", payload.path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_pull_request_fills_missing_fields() {
        let payload: PullRequestPayload = serde_json::from_value(serde_json::json!({
            "number": 42,
            "user": null,
            "title": "Add recipes endpoint",
            "body": null,
            "diff_url": "https://github.com/acme/widgets/pull/42.diff",
            "state": "open",
            "head": { "sha": "abc123" }
        }))
        .unwrap();

        let pr = map_pull_request(payload);
        assert_eq!(pr.author, "unknown");
        assert_eq!(pr.body, "");
        assert_eq!(pr.head_sha, "abc123");
        assert_eq!(pr.state, "open");
    }

    #[test]
    fn test_map_changed_files_defaults_missing_patch() {
        let payload: CommitPayload = serde_json::from_value(serde_json::json!({
            "sha": "abc123",
            "files": [
                { "filename": "logo.png", "status": "added", "additions": 0, "deletions": 0, "changes": 0 },
                { "filename": "src/app.py", "status": "modified", "additions": 3, "deletions": 1, "changes": 4, "patch": "@@ -1 +1 @@" }
            ]
        }))
        .unwrap();

        let files = map_changed_files(payload);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].patch, "");
        assert_eq!(files[1].changes, 4);
    }

    #[test]
    fn test_decode_content_handles_wrapped_base64() {
        let payload = ContentPayload {
            kind: "file".to_string(),
            path: "README.md".to_string(),
            encoding: Some("base64".to_string()),
            // "hello world\n" split across lines like the API does
            content: Some("aGVsbG8g\nd29ybGQK\n".to_string()),
        };
        assert_eq!(decode_content(payload).unwrap(), "hello world\n");
    }

    #[test]
    fn test_decode_content_rejects_directories_and_large_files() {
        let dir = ContentPayload {
            kind: "dir".to_string(),
            path: "src".to_string(),
            encoding: None,
            content: None,
        };
        assert!(decode_content(dir).is_err());

        let large = ContentPayload {
            kind: "file".to_string(),
            path: "dump.sql".to_string(),
            encoding: Some("none".to_string()),
            content: Some(String::new()),
        };
        assert!(decode_content(large).is_err());
    }
}
