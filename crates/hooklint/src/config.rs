//! Configuration for the lint dispatcher.

use anyhow::{Context, Result};
use std::env;

use crate::storage::AwsCredentials;

/// Dispatcher configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// Object store bucket receiving lint logs.
    pub bucket: String,
    /// GitHub App identifier (the `iss` claim of bearer assertions).
    pub app_id: String,
    /// RS256 private key for signing bearer assertions (PEM text).
    pub private_key: String,
    /// Webhook signing secret; signature verification is skipped when unset.
    pub webhook_secret: Option<String>,
    /// AWS credentials for object store writes.
    pub aws: AwsCredentials,
    /// Linter invocation settings.
    pub linter: LinterConfig,
    /// GitHub API base URL.
    pub github_api_url: String,
    /// Path-style object store endpoint override (used by tests).
    pub s3_endpoint: Option<String>,
}

/// Linter invocation settings.
#[derive(Debug, Clone)]
pub struct LinterConfig {
    /// Linter executable, invoked with no arguments.
    pub command: String,
    /// Short tool name used in log keys and status descriptions.
    pub name: String,
    /// Commit status context label.
    pub context: String,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Required values abort startup with a descriptive error instead of
    /// failing somewhere mid-pipeline.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            bucket: require("BUCKET")?,
            app_id: require("GITHUB_APP_ID")?,
            private_key: require("GITHUB_APP_PRIVATE_KEY")?,
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            aws: AwsCredentials {
                access_key_id: require("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
                session_token: env::var("AWS_SESSION_TOKEN").ok().filter(|s| !s.is_empty()),
                region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            },
            linter: LinterConfig {
                command: env::var("LINT_COMMAND").unwrap_or_else(|_| "standard".to_string()),
                name: env::var("LINT_NAME").unwrap_or_else(|_| "lint".to_string()),
                context: env::var("LINT_CONTEXT").unwrap_or_else(|_| "lint".to_string()),
            },
            github_api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
        })
    }
}

/// Read a required environment variable, rejecting empty values.
fn require(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .with_context(|| format!("{name} must be set"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Use a mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const REQUIRED: [&str; 5] = [
        "BUCKET",
        "GITHUB_APP_ID",
        "GITHUB_APP_PRIVATE_KEY",
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
    ];

    fn set_required() {
        for name in REQUIRED {
            env::set_var(name, "test-value");
        }
    }

    fn clear_all() {
        for name in REQUIRED {
            env::remove_var(name);
        }
        for name in [
            "PORT",
            "WEBHOOK_SECRET",
            "AWS_SESSION_TOKEN",
            "AWS_REGION",
            "LINT_COMMAND",
            "LINT_NAME",
            "LINT_CONTEXT",
            "GITHUB_API_URL",
            "S3_ENDPOINT",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_missing_required_fails_fast() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_all();

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("BUCKET"));
    }

    #[test]
    fn test_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_all();
        set_required();

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.webhook_secret.is_none());
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.linter.command, "standard");
        assert_eq!(config.linter.name, "lint");
        assert_eq!(config.github_api_url, "https://api.github.com");
        assert!(config.s3_endpoint.is_none());

        clear_all();
    }

    #[test]
    fn test_overrides_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_all();
        set_required();
        env::set_var("PORT", "9000");
        env::set_var("AWS_REGION", "eu-west-1");
        env::set_var("LINT_COMMAND", "/usr/local/bin/standard");
        env::set_var("WEBHOOK_SECRET", "hook-secret");

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.aws.region, "eu-west-1");
        assert_eq!(config.linter.command, "/usr/local/bin/standard");
        assert_eq!(config.webhook_secret, Some("hook-secret".to_string()));

        clear_all();
    }

    #[test]
    fn test_empty_required_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_all();
        set_required();
        env::set_var("BUCKET", "");

        assert!(Config::from_env().is_err());

        clear_all();
    }
}
