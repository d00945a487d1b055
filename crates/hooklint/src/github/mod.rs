//! GitHub App authentication and API access.
//!
//! Two authentication modes, each carried by its own client value so
//! credentials never leak across modes or invocations: [`AppAuth`]
//! authenticates as the App itself to mint installation tokens, and
//! [`GitHubClient`] performs repository operations with one such token.

pub mod auth;
pub mod client;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};

pub use auth::{AppAuth, InstallationToken};
pub use client::{CommitState, CommitStatus, GitHubClient};

/// Default headers shared by both authentication modes.
fn api_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(
        "X-GitHub-Api-Version",
        HeaderValue::from_static("2022-11-28"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static("hooklint/1.0"));
    headers
}
