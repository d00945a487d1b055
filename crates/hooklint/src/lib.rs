//! Webhook-triggered lint dispatcher.
//!
//! This crate provides:
//! - GitHub hook payload decoding into units of lint work
//! - GitHub App authentication (App JWT -> installation token)
//! - Repository snapshot download and staged tarball extraction
//! - Linter subprocess invocation with output capture
//! - Commit status publication and lint log archival to an object store
//! - HTTP server for webhook handling (standalone service)

pub mod archive;
pub mod config;
pub mod github;
pub mod hook;
pub mod linter;
pub mod pipeline;
pub mod server;
pub mod storage;

pub use archive::StagingArea;
pub use config::Config;
pub use github::{AppAuth, CommitState, CommitStatus, GitHubClient, InstallationToken};
pub use hook::{decode, HookEnvelope, WorkItem};
pub use linter::LintResult;
pub use pipeline::Pipeline;
pub use storage::ObjectStore;
