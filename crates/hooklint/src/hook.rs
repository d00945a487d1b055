//! GitHub hook payload decoding.
//!
//! Turns a loosely-typed webhook envelope (push or pull-request event)
//! into a well-defined unit of lint work. Decoding is pure: no I/O, no
//! side effects, and missing fields never panic.

use serde::Deserialize;

/// Pull-request actions that represent a code change worth linting.
const CHANGE_ACTIONS: [&str; 3] = ["opened", "edited", "reopened"];

/// Incoming webhook payload (push or pull-request event, simplified).
#[derive(Debug, Clone, Deserialize)]
pub struct HookEnvelope {
    /// Action type for pull-request events (opened, closed, etc.)
    #[serde(default)]
    pub action: Option<String>,
    /// Head commit for push events; absent or null on other events and
    /// on pushes with no identifiable head (e.g. branch deletions).
    #[serde(default)]
    pub head_commit: Option<HeadCommit>,
    /// Pull request details, when this is a pull-request event.
    #[serde(default)]
    pub pull_request: Option<PullRequestInfo>,
    /// Repository info
    pub repository: Repository,
    /// App installation the event was delivered for.
    #[serde(default)]
    pub installation: Option<Installation>,
}

/// Head commit of a push event.
#[derive(Debug, Clone, Deserialize)]
pub struct HeadCommit {
    /// Commit sha.
    pub id: String,
}

/// Pull request details (simplified).
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestInfo {
    /// PR author.
    pub user: GitHubUser,
    /// Source branch.
    pub head: GitRef,
}

/// Git reference (branch).
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    /// SHA
    pub sha: String,
}

/// GitHub Repository
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// Repository name
    pub name: String,
    /// Repository owner.
    pub owner: RepositoryOwner,
}

/// Repository owner account.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryOwner {
    /// Owner login
    pub login: String,
}

/// GitHub User
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    /// User login
    pub login: String,
}

/// App installation reference.
#[derive(Debug, Clone, Deserialize)]
pub struct Installation {
    /// Installation ID
    pub id: u64,
}

/// One unit of lint work extracted from a hook envelope.
///
/// `sha` is `None` when the event does not represent an actionable code
/// change; in that case no downstream stage may run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Repository owner login.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Commit to lint, if the event is actionable.
    pub sha: Option<String>,
    /// Installation the access token must be scoped to.
    pub installation_id: Option<u64>,
}

/// Decode a hook envelope into a [`WorkItem`].
///
/// A push event yields the head commit sha. A pull-request event yields
/// the PR head sha only when the action is one of [`CHANGE_ACTIONS`] and
/// the author is not the repository owner (owner pushes are already
/// covered by the push event).
#[must_use]
pub fn decode(envelope: &HookEnvelope) -> WorkItem {
    let owner = envelope.repository.owner.login.clone();
    let repo = envelope.repository.name.clone();

    let sha = match &envelope.head_commit {
        Some(head) => Some(head.id.clone()),
        None => pull_request_sha(envelope, &owner),
    };

    WorkItem {
        owner,
        repo,
        sha,
        installation_id: envelope.installation.as_ref().map(|i| i.id),
    }
}

/// Resolve the sha of an actionable pull-request event, if any.
fn pull_request_sha(envelope: &HookEnvelope, owner: &str) -> Option<String> {
    let pr = envelope.pull_request.as_ref()?;
    let action = envelope.action.as_deref()?;

    // Explicit set membership; a substring or truthiness check would
    // silently drop every pull request.
    let code_has_changed = CHANGE_ACTIONS.contains(&action);
    let is_owner = pr.user.login == owner;

    (code_has_changed && !is_owner).then(|| pr.head.sha.clone())
}
