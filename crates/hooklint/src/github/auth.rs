//! GitHub App authentication.
//!
//! Exchanges the App's long-lived RS256 signing key for short-lived,
//! installation-scoped access tokens.

use anyhow::{anyhow, Context, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lifetime of an App bearer assertion, in seconds.
const ASSERTION_TTL_SECS: u64 = 300;

/// Claims of the App bearer assertion.
#[derive(Debug, Serialize)]
struct Claims {
    iat: u64,
    exp: u64,
    iss: String,
}

#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
}

/// Opaque short-lived credential scoped to one App installation.
///
/// Minted fresh per invocation, handed to the snapshot fetcher and the
/// status reporter, never persisted or reused.
#[derive(Clone)]
pub struct InstallationToken(String);

impl InstallationToken {
    pub(crate) fn secret(&self) -> &str {
        &self.0
    }
}

/// Authenticates as the App itself to mint installation tokens.
pub struct AppAuth {
    client: reqwest::Client,
    api_url: String,
    app_id: String,
    key: EncodingKey,
}

impl AppAuth {
    /// Create an authenticator from the App id and its RS256 private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid RSA PEM or the HTTP
    /// client cannot be created.
    pub fn new(api_url: &str, app_id: &str, private_key_pem: &str) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .context("Invalid GitHub App private key")?;

        let client = reqwest::Client::builder()
            .default_headers(super::api_headers())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            key,
        })
    }

    /// Sign a time-bounded bearer assertion identifying the App.
    fn bearer_assertion(&self) -> Result<String> {
        let now = u64::try_from(chrono::Utc::now().timestamp())
            .context("System clock is before the epoch")?;

        let claims = Claims {
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
            iss: self.app_id.clone(),
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .context("Failed to sign App bearer assertion")
    }

    /// Mint an access token scoped to `installation_id`.
    ///
    /// Two sequential round trips server-side: authenticate as the App
    /// via the bearer assertion, then create the installation token.
    ///
    /// # Errors
    ///
    /// Returns an error if signing or the API call fails.
    pub async fn installation_token(&self, installation_id: u64) -> Result<InstallationToken> {
        let assertion = self.bearer_assertion()?;
        let url = format!(
            "{}/app/installations/{installation_id}/access_tokens",
            self.api_url
        );

        debug!(installation_id, "Requesting installation token");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {assertion}"))
            .send()
            .await
            .context("Failed to send installation token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "GitHub API error creating installation token: {status} - {body}"
            ));
        }

        let parsed: InstallationTokenResponse = response
            .json()
            .await
            .context("Failed to parse installation token response")?;

        Ok(InstallationToken(parsed.token))
    }
}
