use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A repository on the host, `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parse `https://github.com/owner/repo(.git)`, `git@github.com:owner/repo.git`
    /// or a bare `owner/repo`. The last two path segments win.
    pub fn parse(repo_url: &str) -> Result<Self> {
        let trimmed = repo_url.trim().trim_end_matches('/');
        let path = match trimmed.split_once("://") {
            Some((_, rest)) => rest,
            None => trimmed
                .split_once(':')
                .filter(|(host, _)| host.contains('@'))
                .map(|(_, rest)| rest)
                .unwrap_or(trimmed),
        };

        let mut segments = path.rsplit('/').filter(|s| !s.is_empty());
        let name = segments.next().map(|s| s.trim_end_matches(".git"));
        let owner = segments.next();

        match (owner, name) {
            (Some(owner), Some(name)) if !name.is_empty() => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(AppError::InvalidRepoUrl(repo_url.to_string())),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub author: String,
    pub title: String,
    pub body: String,
    pub diff_url: String,
    pub state: String,
    pub head_sha: String,
}

/// PR metadata plus the SHAs of its commits, as rendered into the context blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrDetails {
    pub author: String,
    pub title: String,
    pub body: String,
    pub diff_url: String,
    pub state: String,
    pub head_sha: String,
    pub commit_shas: Vec<String>,
}

impl PrDetails {
    pub fn new(pr: PullRequest, commit_shas: Vec<String>) -> Self {
        Self {
            author: pr.author,
            title: pr.title,
            body: pr.body,
            diff_url: pr.diff_url,
            state: pr.state,
            head_sha: pr.head_sha,
            commit_shas,
        }
    }
}

/// One file touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    /// `added`, `modified`, `removed`, `renamed`, `copied`, `changed` or `unchanged`.
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    pub patch: String,
}
