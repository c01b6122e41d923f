//! Issue-tracker adapter port (§6). Every operation the engine needs from
//! the external tracker, expressed generically so the infrastructure
//! adapter can be `gh`-CLI-backed (as the teacher's `reference::github`
//! resolver already is) without leaking that choice into the application
//! layer.

use agora_domain::{CheckStatusSummary, Issue, PullRequest};
use async_trait::async_trait;
use thiserror::Error;

/// Classified tracker failure (§7). Transient failures are retried with
/// exponential backoff up to 5 attempts by the adapter itself; only a
/// `Fatal` (or an exhausted transient) ever reaches the caller.
#[derive(Error, Debug, Clone)]
pub enum TrackerError {
    #[error("tracker call failed non-retriably: {0}")]
    Fatal(String),

    #[error("tracker precondition not met: {0}")]
    StateConflict(String),
}

/// Labels to set when creating an issue; body/title are always required.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

#[async_trait]
pub trait TrackerPort: Send + Sync {
    /// List open issues, optionally filtered to those carrying every label
    /// in `labels` (empty means "all open issues").
    async fn list_open_issues(&self, labels: &[String]) -> Result<Vec<Issue>, TrackerError>;

    async fn read_issue(&self, number: u64) -> Result<Issue, TrackerError>;

    async fn create_issue(&self, issue: NewIssue) -> Result<u64, TrackerError>;

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), TrackerError>;

    async fn remove_labels(&self, number: u64, labels: &[String]) -> Result<(), TrackerError>;

    async fn close_issue(&self, number: u64) -> Result<(), TrackerError>;

    async fn post_comment(&self, number: u64, body: &str) -> Result<(), TrackerError>;

    async fn create_branch(&self, name: &str, from: &str) -> Result<(), TrackerError>;

    /// Open a PR; `body` must contain a `Closes #N` token (§3, §6).
    async fn open_pr(&self, branch: &str, title: &str, body: &str) -> Result<u64, TrackerError>;

    async fn read_pr(&self, number: u64) -> Result<PullRequest, TrackerError>;

    async fn list_pr_review_comments(&self, number: u64) -> Result<Vec<String>, TrackerError>;

    async fn merge_pr(&self, number: u64) -> Result<(), TrackerError>;

    async fn close_pr(&self, number: u64) -> Result<(), TrackerError>;

    /// Recent CI runs on the main branch, most recent first.
    async fn recent_ci_runs(&self, limit: u32) -> Result<Vec<CheckStatusSummary>, TrackerError>;
}
