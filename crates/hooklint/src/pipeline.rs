//! Lint pipeline - orchestrates the full decode-fetch-lint-report flow.
//!
//! One invocation handles exactly one hook envelope, as a single linear
//! chain of suspending operations: decode the hook, mint an installation
//! token, fetch and unpack the snapshot, run the linter, then archive
//! the output and publish the terminal commit status. Nothing is shared
//! across invocations; every run gets a fresh token and staging area.

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::archive::StagingArea;
use crate::config::Config;
use crate::github::{AppAuth, CommitState, CommitStatus, GitHubClient};
use crate::hook::{self, HookEnvelope, WorkItem};
use crate::linter::{self, LintResult};
use crate::storage::ObjectStore;

/// Lint pipeline orchestrator.
pub struct Pipeline {
    config: Config,
    auth: AppAuth,
    store: ObjectStore,
}

impl Pipeline {
    /// Create a pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the App key is invalid or a client cannot be
    /// constructed.
    pub fn new(config: Config) -> Result<Self> {
        let auth = AppAuth::new(&config.github_api_url, &config.app_id, &config.private_key)?;
        let store = ObjectStore::new(&config.bucket, config.aws.clone(), config.s3_endpoint.clone())?;
        Ok(Self {
            config,
            auth,
            store,
        })
    }

    /// Handle one hook envelope end to end.
    ///
    /// Failures are logged here and never propagated; the user-visible
    /// outcome is the commit status trail on GitHub.
    pub async fn handle(&self, envelope: &HookEnvelope) {
        let item = hook::decode(envelope);

        let Some(sha) = item.sha.clone() else {
            debug!(
                owner = %item.owner,
                repo = %item.repo,
                "Hook carries no actionable commit; skipping"
            );
            return;
        };

        if let Err(e) = self.process(&item, &sha).await {
            error!(
                owner = %item.owner,
                repo = %item.repo,
                sha = %sha,
                error = %e,
                "Lint pipeline aborted"
            );
        }
    }

    async fn process(&self, item: &WorkItem, sha: &str) -> Result<()> {
        let installation_id = item
            .installation_id
            .context("Hook carries no installation id")?;

        let token = self.auth.installation_token(installation_id).await?;
        let github = GitHubClient::new(&self.config.github_api_url, token)?;

        let tarball = github.download_tarball(&item.owner, &item.repo, sha).await?;
        let staging = StagingArea::unpack(tarball).await?;

        // The snapshot is confirmed on disk, so a pending status can no
        // longer dangle on a download failure. From here on every exit
        // path must leave a terminal state behind it.
        github
            .create_status(
                &item.owner,
                &item.repo,
                sha,
                &CommitStatus {
                    state: CommitState::Pending,
                    context: self.config.linter.context.clone(),
                    description: None,
                    target_url: None,
                },
            )
            .await?;

        let result = linter::run(&self.config.linter.command, staging.root()).await;

        if let Err(e) = self.report(&github, item, sha, &result).await {
            self.report_fault(&github, item, sha).await;
            return Err(e);
        }

        Ok(())
    }

    /// Archive the lint output and publish the terminal status.
    ///
    /// The two side effects are independent: a storage failure is logged
    /// and the status still goes out, carrying a reference link that may
    /// 404.
    async fn report(
        &self,
        github: &GitHubClient,
        item: &WorkItem,
        sha: &str,
        result: &LintResult,
    ) -> Result<()> {
        let name = &self.config.linter.name;
        let key = format!("{name}/{}/{}/{sha}.log", item.owner, item.repo);

        if let Err(e) = self
            .store
            .put_text(&key, result.combined_output.clone())
            .await
        {
            error!(key = %key, error = %e, "Failed to store lint output");
        }

        let (state, description) = if result.succeeded {
            (CommitState::Success, format!("{name} succeeded!"))
        } else {
            (CommitState::Failure, format!("{name} failed!"))
        };

        github
            .create_status(
                &item.owner,
                &item.repo,
                sha,
                &CommitStatus {
                    state,
                    context: self.config.linter.context.clone(),
                    description: Some(description),
                    target_url: Some(self.store.public_url(&key)),
                },
            )
            .await?;

        info!(
            owner = %item.owner,
            repo = %item.repo,
            sha = %sha,
            succeeded = result.succeeded,
            "Lint run reported"
        );

        Ok(())
    }

    /// Best-effort terminal state for faults after `pending` went out.
    async fn report_fault(&self, github: &GitHubClient, item: &WorkItem, sha: &str) {
        let status = CommitStatus {
            state: CommitState::Error,
            context: self.config.linter.context.clone(),
            description: Some(format!("{} could not complete", self.config.linter.name)),
            target_url: None,
        };

        if let Err(e) = github
            .create_status(&item.owner, &item.repo, sha, &status)
            .await
        {
            error!(
                owner = %item.owner,
                repo = %item.repo,
                sha = %sha,
                error = %e,
                "Failed to publish error status"
            );
        }
    }
}
