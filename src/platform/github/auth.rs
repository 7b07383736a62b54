use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AppError, Result};
use crate::platform::types::RepoRef;

#[derive(Debug, Serialize)]
struct JwtClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Debug, Deserialize)]
struct InstallationPayload {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct AccessTokenPayload {
    token: String,
    expires_at: Option<String>,
}

/// An installation access token and when it stops working.
#[derive(Debug, Clone)]
pub struct InstallationToken {
    pub installation_id: u64,
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl InstallationToken {
    /// Usable for at least another five minutes.
    pub fn is_fresh(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at > now + chrono::Duration::minutes(5)
    }
}

/// Generate a JWT for GitHub App authentication.
pub fn generate_app_jwt(app_id: u64, private_key_path: &Path) -> Result<String> {
    let key_pem = std::fs::read(private_key_path).map_err(|e| {
        AppError::Config(format!(
            "Failed to read private key at {}: {e}",
            private_key_path.display()
        ))
    })?;

    let encoding_key = EncodingKey::from_rsa_pem(&key_pem)
        .map_err(|e| AppError::Config(format!("Invalid RSA private key: {e}")))?;

    let now = chrono::Utc::now().timestamp();
    let claims = JwtClaims {
        iat: now - 60,      // 60 seconds in the past to account for clock drift
        exp: now + 10 * 60, // 10 minute maximum
        iss: app_id.to_string(),
    };

    let header = Header::new(Algorithm::RS256);
    encode(&header, &claims, &encoding_key)
        .map_err(|e| AppError::Config(format!("Failed to generate JWT: {e}")))
}

/// Look up the App installation covering `repo`.
pub async fn find_installation(app_client: &Octocrab, repo: &RepoRef) -> Result<u64> {
    let url = format!("/repos/{}/{}/installation", repo.owner, repo.name);
    let installation: InstallationPayload = app_client.get(&url, None::<&()>).await?;
    Ok(installation.id)
}

/// Exchange the App JWT for an installation-scoped access token.
pub async fn create_installation_token(
    app_client: &Octocrab,
    installation_id: u64,
) -> Result<InstallationToken> {
    let url = format!("/app/installations/{installation_id}/access_tokens");
    let response: AccessTokenPayload = app_client.post(&url, None::<&()>).await?;

    let expires_at = response
        .expires_at
        .as_deref()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|| chrono::Utc::now() + chrono::Duration::hours(1));

    Ok(InstallationToken {
        installation_id,
        token: response.token,
        expires_at,
    })
}
