//! Azure DevOps Services and Azure DevOps Server / TFS REST lookups.

use std::sync::Arc;

use async_trait::async_trait;

use super::{SourceControlProvider, WorkItemProvider};
use crate::catalog::ServerKind;
use crate::client::RestClient;
use crate::error::{ProviderError, Result};
use crate::ids::{parse_commit_id, parse_numeric_id, DistributedRepository};
use crate::models::{AzureChangeset, AzureGitCommit, AzureWorkItem};

/// Work items of an on-prem collection or a dev.azure.com organization.
pub struct AzureWorkItems {
    server: String,
    kind: ServerKind,
    client: Arc<RestClient>,
    api_version: String,
}

impl AzureWorkItems {
    pub fn new(
        server: impl Into<String>,
        kind: ServerKind,
        client: Arc<RestClient>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            kind,
            client,
            api_version: api_version.into(),
        }
    }

    async fn fetch(&self, id: &str) -> Result<AzureWorkItem> {
        let id = parse_numeric_id(id, "work item id")?;
        let path = format!("_apis/wit/workitems/{id}");
        let query = [("api-version", self.api_version.as_str()), ("$expand", "links")];
        self.client.get_with_query(&path, Some(&query[..])).await
    }
}

#[async_trait]
impl WorkItemProvider for AzureWorkItems {
    fn kind(&self) -> ServerKind {
        self.kind
    }

    async fn work_item_url(&self, id: &str) -> Result<String> {
        let item = self.fetch(id).await?;
        item.html_url().map(str::to_string).ok_or_else(|| {
            ProviderError::not_found(format!(
                "Unable to access work item ID {} on server {}.",
                item.id, self.server
            ))
        })
    }

    async fn work_item_title(&self, id: &str) -> Result<String> {
        let item = self.fetch(id).await?;
        item.title().map(str::to_string).ok_or_else(|| {
            ProviderError::not_found(format!(
                "Work item ID {} on server {} has no title.",
                item.id, self.server
            ))
        })
    }
}

/// Integer-keyed TFVC changesets.
pub struct TfvcChangesets {
    server: String,
    kind: ServerKind,
    client: Arc<RestClient>,
    api_version: String,
}

impl TfvcChangesets {
    pub fn new(
        server: impl Into<String>,
        kind: ServerKind,
        client: Arc<RestClient>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            kind,
            client,
            api_version: api_version.into(),
        }
    }
}

#[async_trait]
impl SourceControlProvider for TfvcChangesets {
    fn kind(&self) -> ServerKind {
        self.kind
    }

    async fn changeset_url(&self, id: &str) -> Result<String> {
        let id = parse_numeric_id(id, "changeset id")?;
        let path = format!("_apis/tfvc/changesets/{id}");
        let query = [("api-version", self.api_version.as_str())];
        let changeset: AzureChangeset = self.client.get_with_query(&path, Some(&query[..])).await?;
        changeset.web_url().map(str::to_string).ok_or_else(|| {
            ProviderError::not_found(format!(
                "Unable to access changeset ID {} on server {}.",
                changeset.changeset_id, self.server
            ))
        })
    }
}

/// Commits of a git repository hosted on an on-prem collection.
pub struct AzureGitCommits {
    repository: DistributedRepository,
    client: Arc<RestClient>,
    api_version: String,
}

impl AzureGitCommits {
    pub fn new(
        repository: DistributedRepository,
        client: Arc<RestClient>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            client,
            api_version: api_version.into(),
        }
    }
}

#[async_trait]
impl SourceControlProvider for AzureGitCommits {
    fn kind(&self) -> ServerKind {
        ServerKind::OnPremDistributedVcs
    }

    async fn changeset_url(&self, id: &str) -> Result<String> {
        let commit_id = parse_commit_id(id)?;
        let path = format!(
            "{}/_apis/git/repositories/{}/commits/{}",
            self.repository.project, self.repository.repository, commit_id
        );
        let query = [("api-version", self.api_version.as_str())];
        let commit: AzureGitCommit = self.client.get_with_query(&path, Some(&query[..])).await?;
        commit.web_url().map(str::to_string).ok_or_else(|| {
            ProviderError::not_found(format!(
                "Unable to access commit ID {} on server {}.",
                commit.commit_id, self.repository.host
            ))
        })
    }
}
