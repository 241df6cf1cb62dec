//! Repository host operations backed by the GitHub REST API

use async_trait::async_trait;
use codeops_core::{PullRequest, RepositoryHost};
use octocrab::params::repos::Reference;
use tracing::{debug, info};

use crate::{Error, GitHubClient};

#[async_trait]
impl RepositoryHost for GitHubClient {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn create_branch(&self, branch: &str, from: &str) -> codeops_core::Result<()> {
        let sha = self.branch_head(from).await?;

        let result = self
            .client()
            .repos(self.owner(), self.repo())
            .create_ref(&Reference::Branch(branch.to_string()), sha.clone())
            .await;

        match result {
            Ok(_) => {
                info!(branch, from, sha = %sha, "Created branch");
                Ok(())
            }
            Err(octocrab::Error::GitHub { source, .. })
                if source.message.contains("already exists") =>
            {
                debug!(branch, "Branch already exists");
                Ok(())
            }
            Err(e) => Err(Error::Api(e).into()),
        }
    }

    async fn commit_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> codeops_core::Result<String> {
        let repos = self.client().repos(self.owner(), self.repo());

        match self.file_sha(branch, path).await? {
            Some(blob_sha) => {
                repos
                    .update_file(path, message, content, blob_sha)
                    .branch(branch)
                    .send()
                    .await
                    .map_err(Error::Api)?;
            }
            None => {
                repos
                    .create_file(path, message, content)
                    .branch(branch)
                    .send()
                    .await
                    .map_err(Error::Api)?;
            }
        }

        let sha = self.branch_head(branch).await?;
        info!(branch, path, sha = %sha, "Committed file");
        Ok(sha)
    }

    async fn open_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> codeops_core::Result<PullRequest> {
        let pr = self
            .client()
            .pulls(self.owner(), self.repo())
            .create(title, head, base)
            .body(body)
            .send()
            .await
            .map_err(Error::Api)?;

        let url = pr.html_url.map(|u| u.to_string()).unwrap_or_else(|| {
            format!(
                "https://github.com/{}/{}/pull/{}",
                self.owner(),
                self.repo(),
                pr.number
            )
        });

        info!(number = pr.number, url = %url, "Opened pull request");
        Ok(PullRequest {
            number: pr.number,
            url,
        })
    }

    async fn comment(&self, number: u64, body: &str) -> codeops_core::Result<()> {
        self.client()
            .issues(self.owner(), self.repo())
            .create_comment(number, body)
            .await
            .map_err(Error::Api)?;

        debug!(number, "Posted comment");
        Ok(())
    }
}
