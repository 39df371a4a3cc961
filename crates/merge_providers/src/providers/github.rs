//! GitHub pull requests and commits through the REST v3 API.

use std::sync::Arc;

use async_trait::async_trait;

use super::{SourceControlProvider, WorkItemProvider};
use crate::catalog::ServerKind;
use crate::client::RestClient;
use crate::error::{ProviderError, Result};
use crate::ids::{parse_commit_id, parse_numeric_id, HostedRepository};
use crate::models::{GitHubCommit, GitHubPullRequest};

pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Pull requests of one repository, used as the work items of a git-host tracker.
pub struct GitHubPullRequests {
    repository: HostedRepository,
    client: Arc<RestClient>,
}

impl GitHubPullRequests {
    pub fn new(repository: HostedRepository, client: Arc<RestClient>) -> Self {
        Self { repository, client }
    }

    async fn fetch(&self, id: &str) -> Result<GitHubPullRequest> {
        let number = parse_numeric_id(id, "pull request number")?;
        let path = format!(
            "repos/{}/{}/pulls/{}",
            self.repository.owner, self.repository.repository, number
        );
        self.client.get(&path).await
    }
}

#[async_trait]
impl WorkItemProvider for GitHubPullRequests {
    fn kind(&self) -> ServerKind {
        ServerKind::GitHostIssueTracker
    }

    async fn work_item_url(&self, id: &str) -> Result<String> {
        let pull = self.fetch(id).await?;
        pull.html_url.ok_or_else(|| {
            ProviderError::not_found(format!(
                "Pull request #{} of {}/{} has no web URL.",
                pull.number, self.repository.owner, self.repository.repository
            ))
        })
    }

    async fn work_item_title(&self, id: &str) -> Result<String> {
        let pull = self.fetch(id).await?;
        pull.title.ok_or_else(|| {
            ProviderError::not_found(format!(
                "Pull request #{} of {}/{} has no title.",
                pull.number, self.repository.owner, self.repository.repository
            ))
        })
    }
}

/// Commits of one repository.
pub struct GitHubCommits {
    repository: HostedRepository,
    client: Arc<RestClient>,
}

impl GitHubCommits {
    pub fn new(repository: HostedRepository, client: Arc<RestClient>) -> Self {
        Self { repository, client }
    }
}

#[async_trait]
impl SourceControlProvider for GitHubCommits {
    fn kind(&self) -> ServerKind {
        ServerKind::GitHostVcs
    }

    async fn changeset_url(&self, id: &str) -> Result<String> {
        let sha = parse_commit_id(id)?;
        let path = format!(
            "repos/{}/{}/commits/{}",
            self.repository.owner, self.repository.repository, sha
        );
        let commit: GitHubCommit = self.client.get(&path).await?;
        commit.html_url.ok_or_else(|| {
            ProviderError::not_found(format!(
                "Unable to access commit ID {} in {}/{}.",
                commit.sha, self.repository.owner, self.repository.repository
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use crate::config::ConnectionConfig;
    use std::time::Duration;

    fn client(server: &mockito::Server) -> Arc<RestClient> {
        let config = ConnectionConfig::new(server.url(), Credential::bearer("ghp_token"))
            .with_accept(GITHUB_ACCEPT)
            .with_cooldown(Duration::ZERO);
        Arc::new(RestClient::new(config).expect("client builds"))
    }

    fn repository() -> HostedRepository {
        HostedRepository::parse("acme/widgets").unwrap()
    }

    #[tokio::test]
    async fn pull_request_url_and_title() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/acme/widgets/pulls/17")
            .match_header("authorization", "Bearer ghp_token")
            .match_header("accept", GITHUB_ACCEPT)
            .with_status(200)
            .with_body(
                r#"{"number": 17, "title": "Fix flaky import", "state": "open",
                    "html_url": "https://github.com/acme/widgets/pull/17"}"#,
            )
            .expect(2)
            .create_async()
            .await;

        let provider = GitHubPullRequests::new(repository(), client(&server));
        assert_eq!(
            provider.work_item_url("17").await.unwrap(),
            "https://github.com/acme/widgets/pull/17"
        );
        assert_eq!(provider.work_item_title("17").await.unwrap(), "Fix flaky import");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn pull_request_number_must_be_numeric() {
        let server = mockito::Server::new_async().await;
        let provider = GitHubPullRequests::new(repository(), client(&server));
        let err = provider.work_item_url("seventeen").await.unwrap_err();
        assert!(matches!(err, ProviderError::Format(_)));
    }

    #[tokio::test]
    async fn commit_url_reads_html_url() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/widgets/commits/ab34cd")
            .with_status(200)
            .with_body(r#"{"sha": "ab34cd", "html_url": "https://github.com/acme/widgets/commit/ab34cd"}"#)
            .create_async()
            .await;

        let provider = GitHubCommits::new(repository(), client(&server));
        assert_eq!(
            provider.changeset_url("ab34cd").await.unwrap(),
            "https://github.com/acme/widgets/commit/ab34cd"
        );
    }

    #[tokio::test]
    async fn unknown_commit_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/widgets/commits/deadbeef")
            .with_status(404)
            .with_body(r#"{"message": "No commit found for SHA: deadbeef"}"#)
            .create_async()
            .await;

        let provider = GitHubCommits::new(repository(), client(&server));
        match provider.changeset_url("deadbeef").await {
            Err(ProviderError::NotFound(message)) => assert!(message.contains("No commit found")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
