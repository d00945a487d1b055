//! Token-scoped GitHub API client for commit statuses and snapshot tarballs.

use anyhow::{anyhow, Context, Result};
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use tracing::debug;

use super::auth::InstallationToken;

/// Commit status states understood by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    /// Lint run in flight.
    Pending,
    /// Linter exited cleanly.
    Success,
    /// Linter reported problems.
    Failure,
    /// The dispatcher faulted after the run started.
    Error,
}

/// A commit status to publish.
#[derive(Debug, Clone, Serialize)]
pub struct CommitStatus {
    /// Status state.
    pub state: CommitState,
    /// Fixed context label grouping statuses of one tool.
    pub context: String,
    /// Human-readable outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Link to the archived lint output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

/// GitHub API client carrying one installation token.
///
/// Constructed fresh per invocation so credentials never outlive the
/// hook delivery they were minted for.
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    token: InstallationToken,
}

impl GitHubClient {
    /// Create a client for the given installation token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_url: &str, token: InstallationToken) -> Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(super::api_headers())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Publish a commit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_status(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<()> {
        let url = format!("{}/repos/{owner}/{repo}/statuses/{sha}", self.api_url);

        debug!(
            owner = %owner,
            repo = %repo,
            sha = %sha,
            state = ?status.state,
            "Publishing commit status"
        );

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token.secret()))
            .json(status)
            .send()
            .await
            .context("Failed to send commit status request")?;

        if !response.status().is_success() {
            let status_code = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "GitHub API error creating commit status: {status_code} - {body}"
            ));
        }

        Ok(())
    }

    /// Download the gzip tarball of a repository snapshot.
    ///
    /// GitHub answers with a redirect to a short-lived archive URL;
    /// reqwest follows it.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails or the body cannot be read.
    pub async fn download_tarball(&self, owner: &str, repo: &str, sha: &str) -> Result<Vec<u8>> {
        let url = format!("{}/repos/{owner}/{repo}/tarball/{sha}", self.api_url);

        debug!(owner = %owner, repo = %repo, sha = %sha, "Downloading snapshot tarball");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token.secret()))
            .send()
            .await
            .context("Failed to send tarball request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "GitHub API error downloading tarball: {status} - {body}"
            ));
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read tarball body")?;

        Ok(bytes.to_vec())
    }
}
