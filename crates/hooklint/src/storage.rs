//! Object store client.
//!
//! Archives lint output as public-readable plain-text objects in an S3
//! bucket, signing each request with AWS Signature Version 4 so no SDK
//! dependency is needed for a single `PutObject` call.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// AWS credentials and region scope for request signing.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token, for temporary credentials.
    pub session_token: Option<String>,
    /// Region the bucket lives in.
    pub region: String,
}

/// S3 client scoped to one bucket.
#[derive(Clone)]
pub struct ObjectStore {
    client: reqwest::Client,
    bucket: String,
    credentials: AwsCredentials,
    /// Path-style endpoint override; virtual-hosted addressing otherwise.
    endpoint: Option<String>,
}

impl ObjectStore {
    /// Create a client for `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        bucket: &str,
        credentials: AwsCredentials,
        endpoint: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            credentials,
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
        })
    }

    /// Public URL of an object, attached to commit statuses.
    ///
    /// Constructed unconditionally from the bucket name; it may 404 if
    /// the corresponding write failed.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{key}", self.bucket)
    }

    /// Host header value, canonical URI path and full request URL for `key`.
    fn object_address(&self, key: &str) -> (String, String, String) {
        match &self.endpoint {
            Some(endpoint) => {
                let host = endpoint
                    .split("://")
                    .nth(1)
                    .unwrap_or(endpoint)
                    .to_string();
                let uri = format!("/{}/{key}", self.bucket);
                (host, uri.clone(), format!("{endpoint}{uri}"))
            }
            None => {
                let host = format!("{}.s3.amazonaws.com", self.bucket);
                (host.clone(), format!("/{key}"), self.public_url(key))
            }
        }
    }

    /// Store a plain-text, public-readable object at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if signing or the upload fails.
    pub async fn put_text(&self, key: &str, body: String) -> Result<()> {
        let (host, uri, url) = self.object_address(key);

        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = hex::encode(Sha256::digest(body.as_bytes()));

        // Canonical headers, sorted by name. Log keys are built from
        // GitHub owner/repo/sha segments, which need no URI encoding.
        let mut headers: Vec<(String, String)> = vec![
            ("content-type".to_string(), "text/plain".to_string()),
            ("host".to_string(), host),
            ("x-amz-acl".to_string(), "public-read".to_string()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort();

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request =
            format!("PUT\n{uri}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}");
        let scope = format!("{date}/{}/s3/aws4_request", self.credentials.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = derive_signing_key(
            &self.credentials.secret_access_key,
            &date,
            &self.credentials.region,
        )?;
        let signature = hex::encode(hmac_bytes(&signing_key, string_to_sign.as_bytes())?);
        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.credentials.access_key_id
        );

        debug!(key = %key, bytes = body.len(), "Storing lint output");

        let mut request = self
            .client
            .put(&url)
            .header("Authorization", authorization)
            .header("Content-Type", "text/plain")
            .header("x-amz-acl", "public-read")
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", amz_date);
        if let Some(token) = &self.credentials.session_token {
            request = request.header("x-amz-security-token", token.clone());
        }

        let response = request
            .body(body)
            .send()
            .await
            .context("Failed to send object store request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Object store error: {status} - {body}"));
        }

        Ok(())
    }
}

/// Derive the SigV4 signing key for one day/region.
fn derive_signing_key(secret: &str, date: &str, region: &str) -> Result<Vec<u8>> {
    let key = hmac_bytes(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let key = hmac_bytes(&key, region.as_bytes())?;
    let key = hmac_bytes(&key, b"s3")?;
    hmac_bytes(&key, b"aws4_request")
}

fn hmac_bytes(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| anyhow!("Invalid HMAC key: {e}"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
