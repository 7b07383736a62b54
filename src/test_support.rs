//! In-memory fakes for the host and model seams.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::agent::{CompletionRequest, LanguageModel};
use crate::error::{AppError, Result};
use crate::platform::types::{ChangedFile, PullRequest, RepoRef};
use crate::platform::{Platform, PlatformConnector};

pub const HEAD_SHA: &str = "c0ffee";

pub fn sample_pr(number: u64) -> PullRequest {
    PullRequest {
        number,
        author: "octocat".to_string(),
        title: "Add recipe search endpoint".to_string(),
        body: "Adds `GET /recipes/search`.".to_string(),
        diff_url: format!("https://github.com/acme/recipes/pull/{number}.diff"),
        state: "open".to_string(),
        head_sha: HEAD_SHA.to_string(),
    }
}

pub fn changed_file(filename: &str, patch: &str) -> ChangedFile {
    ChangedFile {
        filename: filename.to_string(),
        status: "modified".to_string(),
        additions: 2,
        deletions: 1,
        changes: 3,
        patch: patch.to_string(),
    }
}

/// Host fake. Clones share the call logs, so a test can keep one handle while
/// the run owns another.
#[derive(Clone)]
pub struct FakePlatform {
    pub pr: PullRequest,
    pub commits: Vec<(String, Vec<ChangedFile>)>,
    pub files: HashMap<String, String>,
    pub fail_post: bool,
    pub posted: Arc<Mutex<Vec<(u64, String)>>>,
    pub file_reads: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl FakePlatform {
    pub fn new(pr_number: u64) -> Self {
        Self {
            pr: sample_pr(pr_number),
            commits: vec![
                (
                    "a1".to_string(),
                    vec![changed_file("src/search.py", "@@ -1 +1,2 @@\n-old\n+new\n+more")],
                ),
                (
                    "b2".to_string(),
                    vec![changed_file("docs/API.md", "@@ -0,0 +1 @@\n+## Search")],
                ),
            ],
            files: HashMap::new(),
            fail_post: false,
            posted: Arc::default(),
            file_reads: Arc::default(),
        }
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    pub fn posted(&self) -> Vec<(u64, String)> {
        self.posted.lock().unwrap().clone()
    }

    pub fn file_reads(&self) -> Vec<(String, Option<String>)> {
        self.file_reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn get_pull_request(&self, pr_number: u64) -> Result<PullRequest> {
        if pr_number != self.pr.number {
            return Err(AppError::GitHubNotFound(format!("pull request #{pr_number}")));
        }
        Ok(self.pr.clone())
    }

    async fn list_pull_request_commits(&self, _pr_number: u64) -> Result<Vec<String>> {
        Ok(self.commits.iter().map(|(sha, _)| sha.clone()).collect())
    }

    async fn get_commit_files(&self, commit_sha: &str) -> Result<Vec<ChangedFile>> {
        self.commits
            .iter()
            .find(|(sha, _)| sha == commit_sha)
            .map(|(_, files)| files.clone())
            .ok_or_else(|| AppError::GitHubNotFound(format!("commit {commit_sha}")))
    }

    async fn get_file_contents(&self, path: &str, git_ref: Option<&str>) -> Result<String> {
        self.file_reads
            .lock()
            .unwrap()
            .push((path.to_string(), git_ref.map(str::to_string)));
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::GitHubNotFound(path.to_string()))
    }

    async fn create_review(&self, pr_number: u64, body: &str) -> Result<()> {
        if self.fail_post {
            return Err(AppError::GitHubApi("422: Unprocessable Entity".to_string()));
        }
        self.posted
            .lock()
            .unwrap()
            .push((pr_number, body.to_string()));
        Ok(())
    }
}

/// Hands out clones of one [`FakePlatform`] and records what it was asked for.
pub struct FakeConnector {
    pub platform: FakePlatform,
    pub connects: Mutex<Vec<(RepoRef, Option<String>)>>,
}

impl FakeConnector {
    pub fn new(platform: FakePlatform) -> Self {
        Self {
            platform,
            connects: Mutex::new(Vec::new()),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }
}

#[async_trait]
impl PlatformConnector for FakeConnector {
    async fn connect(&self, repo: &RepoRef, token: Option<&str>) -> Result<Box<dyn Platform>> {
        self.connects
            .lock()
            .unwrap()
            .push((repo.clone(), token.map(str::to_string)));
        Ok(Box::new(self.platform.clone()))
    }
}

/// Replays canned replies in order and keeps every prompt it was sent.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn draft_requests(&self) -> Vec<CompletionRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.user.starts_with("## Request"))
            .collect()
    }

    pub fn gate_calls(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.user.starts_with("## Draft Review"))
            .count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::LlmApi("script exhausted".to_string()))
    }
}
