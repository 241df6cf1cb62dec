//! GitHub API client using octocrab

use crate::{Error, Result};
use codeops_core::Secrets;
use octocrab::models::repos::Object;
use octocrab::params::repos::Reference;
use octocrab::Octocrab;
use tracing::{debug, info};

/// GitHub API client bound to one repository
pub struct GitHubClient {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Create a client for `owner/repo` authenticated with `token`
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        let owner = owner.into();
        let repo = repo.into();

        let client = Octocrab::builder()
            .personal_token(token.into())
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(owner = %owner, repo = %repo, "Created GitHub client");

        Ok(Self {
            client,
            owner,
            repo,
        })
    }

    /// Create a client for a repository URL using the configured token
    ///
    /// The token comes from GITHUB_TOKEN or ~/.config/codeops/secrets.toml.
    pub fn from_secrets(url: &str, secrets: &Secrets) -> Result<Self> {
        let (owner, repo) = parse_github_url(url)?;
        let token = secrets.github_token().ok_or_else(|| {
            Error::Auth(
                "GitHub token not found. Set GITHUB_TOKEN environment variable \
                 or add token to ~/.config/codeops/secrets.toml"
                    .to_string(),
            )
        })?;
        Self::new(owner, repo, token)
    }

    /// Get the repository owner
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Get the underlying octocrab client
    pub fn client(&self) -> &Octocrab {
        &self.client
    }

    /// Commit sha at the head of `branch`
    pub async fn branch_head(&self, branch: &str) -> Result<String> {
        debug!(branch, "Resolving branch head");

        let reference = self
            .client
            .repos(&self.owner, &self.repo)
            .get_ref(&Reference::Branch(branch.to_string()))
            .await
            .map_err(|e| match e {
                octocrab::Error::GitHub { ref source, .. }
                    if source.message.contains("Not Found") =>
                {
                    Error::RefNotFound(branch.to_string())
                }
                other => Error::Api(other),
            })?;

        match reference.object {
            Object::Commit { sha, .. } | Object::Tag { sha, .. } => Ok(sha),
            _ => Err(Error::Parse(format!(
                "Unexpected object type for ref {}",
                branch
            ))),
        }
    }

    /// Blob sha of `path` on `branch`, if the file exists
    pub(crate) async fn file_sha(&self, branch: &str, path: &str) -> Result<Option<String>> {
        let result = self
            .client
            .repos(&self.owner, &self.repo)
            .get_content()
            .path(path)
            .r#ref(branch)
            .send()
            .await;

        match result {
            Ok(items) => Ok(items.items.into_iter().next().map(|content| content.sha)),
            Err(octocrab::Error::GitHub { source, .. }) if source.message.contains("Not Found") => {
                Ok(None)
            }
            Err(e) => Err(Error::Api(e)),
        }
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// Parse a GitHub repository reference into owner and repo
///
/// Supports formats:
/// - owner/repo
/// - https://github.com/owner/repo
/// - git@github.com:owner/repo.git
pub fn parse_github_url(url: &str) -> Result<(String, String)> {
    let invalid = || {
        Error::Parse(format!(
            "Invalid repository format: {}. Expected owner/repo",
            url
        ))
    };

    let path = if url.starts_with("https://") || url.starts_with("http://") {
        let parsed = url::Url::parse(url).map_err(|e| Error::Parse(e.to_string()))?;
        parsed.path().trim_matches('/').to_string()
    } else if let Some(rest) = url.strip_prefix("git@") {
        rest.split_once(':').map(|(_, path)| path.to_string()).ok_or_else(invalid)?
    } else if !url.contains(':') {
        url.to_string()
    } else {
        return Err(Error::Parse(format!("Unrecognized URL format: {}", url)));
    };

    let path = path.trim_end_matches(".git");
    let mut parts = path.split('/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            // Shorthand must be exactly owner/repo; URLs may carry extra segments
            if !url.contains("://") && parts.next().is_some() {
                return Err(invalid());
            }
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand() {
        let (owner, repo) = parse_github_url("acme/service").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(repo, "service");
    }

    #[test]
    fn test_parse_https_url() {
        let (owner, repo) = parse_github_url("https://github.com/acme/service.git").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(repo, "service");
    }

    #[test]
    fn test_parse_https_url_with_extra_path() {
        let (owner, repo) =
            parse_github_url("https://github.com/acme/service/pull/12").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(repo, "service");
    }

    #[test]
    fn test_parse_ssh_url() {
        let (owner, repo) = parse_github_url("git@github.com:acme/service.git").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(repo, "service");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_github_url("invalid").is_err());
        assert!(parse_github_url("a/b/c").is_err());
        assert!(parse_github_url("/service").is_err());
        assert!(parse_github_url("ftp:acme/service").is_err());
    }

    #[test]
    fn test_from_secrets_requires_token() {
        let secrets = Secrets::default();
        if secrets.github_token().is_none() {
            assert!(matches!(
                GitHubClient::from_secrets("acme/service", &secrets),
                Err(Error::Auth(_))
            ));
        }
    }

    #[test]
    fn test_error_maps_to_core() {
        let err: codeops_core::Error = Error::RefNotFound("main".to_string()).into();
        assert!(matches!(
            err,
            codeops_core::Error::RepositoryOperationFailed(_)
        ));
    }
}
