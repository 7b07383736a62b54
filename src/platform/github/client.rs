use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::{Platform, PlatformConnector};

use super::auth::{self, InstallationToken};
use super::mapper;

const COMMITS_PER_PAGE: usize = 100;
// GitHub stops listing PR commits at 250
const MAX_COMMIT_PAGES: u32 = 3;

#[derive(Serialize)]
struct PageQuery {
    per_page: usize,
    page: u32,
}

#[derive(Serialize)]
struct RefQuery<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
}

#[derive(Serialize)]
struct CreateReviewBody<'a> {
    body: &'a str,
    event: &'static str,
}

/// GitHub REST client bound to one repository.
pub struct GitHubPlatform {
    client: Octocrab,
    repo: RepoRef,
}

impl GitHubPlatform {
    pub fn new(token: String, api_base_url: Option<&str>, repo: RepoRef) -> Result<Self> {
        let client = build_client(token, api_base_url)?;
        Ok(Self { client, repo })
    }

    fn repo_path(&self) -> String {
        format!("/repos/{}/{}", self.repo.owner, self.repo.name)
    }
}

fn build_client(token: String, api_base_url: Option<&str>) -> Result<Octocrab> {
    let mut builder = Octocrab::builder().personal_token(token);
    if let Some(base) = api_base_url {
        builder = builder.base_uri(base.to_string())?;
    }
    builder
        .build()
        .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn get_pull_request(&self, pr_number: u64) -> Result<PullRequest> {
        let url = format!("{}/pulls/{pr_number}", self.repo_path());
        let pr: mapper::PullRequestPayload = self.client.get(&url, None::<&()>).await?;
        Ok(mapper::map_pull_request(pr))
    }

    async fn list_pull_request_commits(&self, pr_number: u64) -> Result<Vec<String>> {
        let url = format!("{}/pulls/{pr_number}/commits", self.repo_path());
        let mut shas = Vec::new();

        for page in 1..=MAX_COMMIT_PAGES {
            let query = PageQuery {
                per_page: COMMITS_PER_PAGE,
                page,
            };
            let commits: Vec<mapper::CommitRefPayload> =
                self.client.get(&url, Some(&query)).await?;
            let count = commits.len();
            shas.extend(commits.into_iter().map(|c| c.sha));

            if count < COMMITS_PER_PAGE {
                break;
            }
        }

        Ok(shas)
    }

    async fn get_commit_files(&self, commit_sha: &str) -> Result<Vec<ChangedFile>> {
        let url = format!("{}/commits/{commit_sha}", self.repo_path());
        let commit: mapper::CommitPayload = self.client.get(&url, None::<&()>).await?;
        tracing::debug!(sha = %commit.sha, files = commit.files.len(), "Fetched commit");
        Ok(mapper::map_changed_files(commit))
    }

    async fn get_file_contents(&self, path: &str, git_ref: Option<&str>) -> Result<String> {
        let url = format!("{}/contents/{}", self.repo_path(), encode_path(path));
        let payload: mapper::ContentPayload = match git_ref {
            Some(git_ref) => self.client.get(&url, Some(&RefQuery { git_ref })).await?,
            None => self.client.get(&url, None::<&()>).await?,
        };
        mapper::decode_content(payload)
    }

    async fn create_review(&self, pr_number: u64, body: &str) -> Result<()> {
        let url = format!("{}/pulls/{pr_number}/reviews", self.repo_path());
        let _: serde_json::Value = self
            .client
            .post(
                &url,
                Some(&CreateReviewBody {
                    body,
                    event: "COMMENT",
                }),
            )
            .await?;
        Ok(())
    }
}

/// Connects [`GitHubPlatform`] clients, resolving credentials per run.
///
/// Token precedence: the request's token, then `github.token`, then a
/// GitHub App installation token for the repository.
pub struct GitHubConnector {
    config: GitHubConfig,
    /// Installation tokens keyed by repository full name.
    token_cache: Arc<RwLock<HashMap<String, InstallationToken>>>,
}

impl GitHubConnector {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        // Validate the private key exists
        if let Some(app) = &config.app {
            if !app.private_key_path.exists() {
                return Err(AppError::Config(format!(
                    "GitHub App private key not found at: {}",
                    app.private_key_path.display()
                )));
            }
        }

        Ok(Self {
            config: config.clone(),
            token_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    async fn resolve_token(&self, repo: &RepoRef, token: Option<&str>) -> Result<String> {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            return Ok(token.to_string());
        }
        if let Some(token) = self.config.token.as_deref() {
            return Ok(token.to_string());
        }
        if self.config.app.is_some() {
            return self.installation_token(repo).await;
        }

        Err(AppError::Config(
            "GITHUB_TOKEN is required (request github_token, github.token, or github.app)"
                .to_string(),
        ))
    }

    async fn installation_token(&self, repo: &RepoRef) -> Result<String> {
        let key = repo.full_name();

        // Check cache
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.get(&key) {
                if cached.is_fresh(chrono::Utc::now()) {
                    return Ok(cached.token.clone());
                }
            }
        }

        let app = self
            .config
            .app
            .as_ref()
            .ok_or_else(|| AppError::Config("github.app is not configured".to_string()))?;

        let jwt = auth::generate_app_jwt(app.app_id, &app.private_key_path)?;
        let app_client = build_client(jwt, self.config.api_base_url.as_deref())?;

        let installation_id = auth::find_installation(&app_client, repo).await?;
        let token = auth::create_installation_token(&app_client, installation_id).await?;

        tracing::info!(
            repo = %repo,
            installation_id,
            expires_at = %token.expires_at,
            "Minted installation token"
        );

        let value = token.token.clone();
        let mut cache = self.token_cache.write().await;
        cache.insert(key, token);

        Ok(value)
    }
}

#[async_trait]
impl PlatformConnector for GitHubConnector {
    async fn connect(&self, repo: &RepoRef, token: Option<&str>) -> Result<Box<dyn Platform>> {
        let token = self.resolve_token(repo, token).await?;
        let platform =
            GitHubPlatform::new(token, self.config.api_base_url.as_deref(), repo.clone())?;
        Ok(Box::new(platform))
    }
}
