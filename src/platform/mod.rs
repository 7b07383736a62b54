pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// Source-control host operations, bound to a single repository.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Fetch a pull request.
    async fn get_pull_request(&self, pr_number: u64) -> Result<PullRequest>;

    /// List the SHAs of every commit on a pull request, oldest first.
    async fn list_pull_request_commits(&self, pr_number: u64) -> Result<Vec<String>>;

    /// Fetch the files changed by a commit, with patches.
    async fn get_commit_files(&self, commit_sha: &str) -> Result<Vec<ChangedFile>>;

    /// Fetch a file's contents as UTF-8 text. `None` reads the default branch.
    async fn get_file_contents(&self, path: &str, git_ref: Option<&str>) -> Result<String>;

    /// Publish a review comment on a pull request.
    async fn create_review(&self, pr_number: u64, body: &str) -> Result<()>;
}

/// Builds a repository-bound [`Platform`] for one review run.
///
/// The returned client is owned by the run and dropped when the run returns.
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    async fn connect(&self, repo: &RepoRef, token: Option<&str>) -> Result<Box<dyn Platform>>;
}
