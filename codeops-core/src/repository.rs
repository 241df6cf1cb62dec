//! Repository hosting boundary used by the execution stage

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A pull request opened by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
}

/// Branch, commit and pull request operations on a hosted repository
///
/// Failures are reported as [`crate::Error::RepositoryOperationFailed`] and
/// end up as tool outcomes on the execution result.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Get the name of this host
    fn name(&self) -> &'static str;

    /// Create `branch` pointing at the head of `from`; an existing branch is not an error
    async fn create_branch(&self, branch: &str, from: &str) -> Result<()>;

    /// Create or update `path` on `branch`, returning the new commit sha
    async fn commit_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String>;

    /// Open a pull request from `head` into `base`
    async fn open_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest>;

    /// Comment on an issue or pull request
    async fn comment(&self, number: u64, body: &str) -> Result<()>;
}
