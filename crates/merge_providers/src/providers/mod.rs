//! Provider variants behind the work-item and source-control capability sets.

mod azure_devops;
mod github;
mod jira;

use async_trait::async_trait;

use crate::catalog::ServerKind;
use crate::error::Result;

pub use azure_devops::{AzureGitCommits, AzureWorkItems, TfvcChangesets};
pub use github::{GitHubCommits, GitHubPullRequests, GITHUB_ACCEPT};
pub use jira::JiraIssues;

/// Resolves work-item ids against one configured server.
#[async_trait]
pub trait WorkItemProvider: Send + Sync {
    fn kind(&self) -> ServerKind;

    async fn work_item_url(&self, id: &str) -> Result<String>;

    async fn work_item_title(&self, id: &str) -> Result<String>;
}

/// Resolves a single changeset or commit id against one configured server.
#[async_trait]
pub trait SourceControlProvider: Send + Sync {
    fn kind(&self) -> ServerKind;

    async fn changeset_url(&self, id: &str) -> Result<String>;
}
