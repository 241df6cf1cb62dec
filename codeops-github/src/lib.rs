//! GitHub integration for CodeOps
//!
//! [`GitHubClient`] implements [`codeops_core::RepositoryHost`], giving the
//! execution stage real branch, commit, pull request and comment operations.

mod client;
mod error;
mod host;

pub use client::{parse_github_url, GitHubClient};
pub use error::{Error, Result};
