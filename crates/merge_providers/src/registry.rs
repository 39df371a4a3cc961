//! Resolves server identifiers to provider variants and caches their remote clients.
//!
//! Clients are keyed by `(identifier, client kind)` and remember the credential they were
//! built with. Live credentials are re-read on every call; a client whose snapshot no longer
//! matches is rebuilt before the request goes out.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::auth::Credential;
use crate::catalog::{ServerCatalog, ServerFamily, ServerKind};
use crate::client::RestClient;
use crate::config::ProviderOptions;
use crate::error::{ProviderError, Result};
use crate::ids::{
    classify_changeset_id, host_segment, split_changeset_ids, ChangesetKind, DistributedRepository,
    HostedRepository,
};
use crate::launcher::Launcher;
use crate::providers::{
    AzureGitCommits, AzureWorkItems, GitHubCommits, GitHubPullRequests, JiraIssues,
    SourceControlProvider, TfvcChangesets, WorkItemProvider,
};

/// Live credential lookup. Called on every provider operation.
pub trait CredentialSource: Send + Sync {
    fn credential_for(&self, kind: ServerKind, identifier: &str) -> Credential;
}

/// Fixed credentials per kind, for hosts without a secret store.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    credentials: Mutex<HashMap<ServerKind, Credential>>,
}

impl StaticCredentials {
    pub fn set(&self, kind: ServerKind, credential: Credential) {
        self.credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(kind, credential);
    }
}

impl CredentialSource for StaticCredentials {
    fn credential_for(&self, kind: ServerKind, _identifier: &str) -> Credential {
        self.credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }
}

/// Remote API surface a cached client talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientKind {
    WorkItemTracking,
    Tfvc,
    Git,
    GitHub,
    Jira,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    identifier: String,
    kind: ClientKind,
}

struct CachedClient {
    client: Arc<RestClient>,
    snapshot: Credential,
}

/// Item family accepted by the go-to-item flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemType {
    WorkItem,
    Changeset,
}

pub struct ProviderRegistry {
    catalog: ServerCatalog,
    credentials: Arc<dyn CredentialSource>,
    launcher: Arc<dyn Launcher>,
    options: ProviderOptions,
    clients: Mutex<HashMap<CacheKey, CachedClient>>,
    builds: AtomicUsize,
    connection_failures: AtomicUsize,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("servers", &self.catalog.entries().len())
            .field("cached_clients", &self.cached_client_count())
            .field("client_builds", &self.client_builds())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new(
        catalog: ServerCatalog,
        credentials: Arc<dyn CredentialSource>,
        launcher: Arc<dyn Launcher>,
        options: ProviderOptions,
    ) -> Self {
        Self {
            catalog,
            credentials,
            launcher,
            options,
            clients: Mutex::new(HashMap::new()),
            builds: AtomicUsize::new(0),
            connection_failures: AtomicUsize::new(0),
        }
    }

    pub fn catalog(&self) -> &ServerCatalog {
        &self.catalog
    }

    pub fn resolve(&self, family: ServerFamily, identifier: &str) -> Result<ServerKind> {
        self.catalog.resolve(family, identifier)
    }

    /// Number of remote clients constructed so far, rebuilds included.
    pub fn client_builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Lookups that failed on transport or authentication since the registry was built.
    pub fn connection_failures(&self) -> usize {
        self.connection_failures.load(Ordering::SeqCst)
    }

    pub fn cached_client_count(&self) -> usize {
        self.lock_clients().len()
    }

    /// Work-item provider for a configured server.
    pub fn work_items(&self, identifier: &str) -> Result<Box<dyn WorkItemProvider>> {
        let identifier = identifier.trim();
        let kind = self.resolve(ServerFamily::WorkItems, identifier)?;
        let provider: Box<dyn WorkItemProvider> = match kind {
            ServerKind::OnPremIssueTracker | ServerKind::CloudIssueTracker => {
                let client = self.client(identifier, kind, ClientKind::WorkItemTracking, identifier)?;
                Box::new(AzureWorkItems::new(
                    identifier,
                    kind,
                    client,
                    self.options.azure_api_version.clone(),
                ))
            }
            ServerKind::GitHostIssueTracker => {
                let repository = HostedRepository::parse(identifier)?;
                let client = self.github_client(identifier, kind)?;
                Box::new(GitHubPullRequests::new(repository, client))
            }
            ServerKind::ExternalTicketTracker => {
                let client = self.client(identifier, kind, ClientKind::Jira, identifier)?;
                Box::new(JiraIssues::new(identifier, client))
            }
            other => {
                return Err(ProviderError::Configuration(format!(
                    "{other} is not a work item provider"
                )))
            }
        };
        Ok(provider)
    }

    /// Source-control provider able to resolve `sub_id`; the id's shape picks the lookup family.
    pub fn source_control(
        &self,
        identifier: &str,
        sub_id: &str,
    ) -> Result<Box<dyn SourceControlProvider>> {
        let identifier = identifier.trim();
        let kind = self.resolve(ServerFamily::SourceControl, identifier)?;
        if kind == ServerKind::GitHostVcs {
            let repository = HostedRepository::parse(identifier)?;
            let client = self.github_client(identifier, kind)?;
            return Ok(Box::new(GitHubCommits::new(repository, client)));
        }

        match classify_changeset_id(sub_id) {
            ChangesetKind::Centralized => {
                let host = host_segment(identifier);
                let client = self.client(identifier, kind, ClientKind::Tfvc, host)?;
                Ok(Box::new(TfvcChangesets::new(
                    host,
                    kind,
                    client,
                    self.options.azure_api_version.clone(),
                )))
            }
            ChangesetKind::Distributed => {
                let repository = DistributedRepository::parse(identifier)?;
                let client = self.client(identifier, kind, ClientKind::Git, &repository.host)?;
                Ok(Box::new(AzureGitCommits::new(
                    repository,
                    client,
                    self.options.azure_api_version.clone(),
                )))
            }
        }
    }

    pub async fn work_item_url(&self, server: &str, id: &str) -> Result<String> {
        let result = self.work_items(server)?.work_item_url(id).await;
        self.note_failure(server, result)
    }

    pub async fn work_item_title(&self, server: &str, id: &str) -> Result<String> {
        let result = self.work_items(server)?.work_item_title(id).await;
        self.note_failure(server, result)
    }

    /// Resolves and launches a work item, returning the URL that was opened.
    pub async fn open_work_item(&self, server: &str, id: &str) -> Result<String> {
        let url = self.work_item_url(server, id).await?;
        self.launcher.launch(&url)?;
        Ok(url)
    }

    /// URL of a single changeset or commit id.
    pub async fn changeset_url(&self, server: &str, id: &str) -> Result<String> {
        let id = id.trim();
        let result = self.source_control(server, id)?.changeset_url(id).await;
        self.note_failure(server, result)
    }

    /// URLs of every id packed into a changeset field, in field order. The first failure aborts.
    pub async fn changeset_urls(&self, server: &str, field: &str) -> Result<Vec<String>> {
        let ids = split_changeset_ids(field);
        if ids.is_empty() {
            return Err(ProviderError::format("no changeset id given"));
        }
        let mut urls = Vec::with_capacity(ids.len());
        for id in ids {
            urls.push(self.changeset_url(server, id).await?);
        }
        Ok(urls)
    }

    /// Launches every changeset packed into the field, returning the opened URLs.
    pub async fn open_changesets(&self, server: &str, field: &str) -> Result<Vec<String>> {
        let urls = self.changeset_urls(server, field).await?;
        for url in &urls {
            self.launcher.launch(url)?;
        }
        Ok(urls)
    }

    /// Go-to-item entry point: opens whichever item type was asked for.
    pub async fn open_item(&self, item_type: ItemType, server: &str, id: &str) -> Result<Vec<String>> {
        match item_type {
            ItemType::WorkItem => Ok(vec![self.open_work_item(server, id).await?]),
            ItemType::Changeset => self.open_changesets(server, id).await,
        }
    }

    fn github_client(&self, identifier: &str, kind: ServerKind) -> Result<Arc<RestClient>> {
        let base = self.options.github_api_base.clone();
        self.client(identifier, kind, ClientKind::GitHub, &base)
    }

    fn client(
        &self,
        identifier: &str,
        server_kind: ServerKind,
        client_kind: ClientKind,
        base_url: &str,
    ) -> Result<Arc<RestClient>> {
        let credential = self.credentials.credential_for(server_kind, identifier);
        let key = CacheKey {
            identifier: identifier.to_string(),
            kind: client_kind,
        };

        let mut clients = self.lock_clients();
        if let Some(cached) = clients.get(&key) {
            if cached.snapshot == credential {
                debug!("reusing {:?} client for {}", client_kind, identifier);
                return Ok(Arc::clone(&cached.client));
            }
            warn!(
                "credentials for {} changed, rebuilding {:?} client",
                identifier, client_kind
            );
        }

        let mut config = self.options.connection(base_url, credential.clone());
        if client_kind == ClientKind::GitHub {
            config = config.with_accept(crate::providers::GITHUB_ACCEPT);
        }
        let client = Arc::new(RestClient::new(config)?);
        self.builds.fetch_add(1, Ordering::SeqCst);
        info!(
            "built {:?} client for {} ({} auth)",
            client_kind,
            identifier,
            credential.scheme()
        );
        clients.insert(
            key,
            CachedClient {
                client: Arc::clone(&client),
                snapshot: credential,
            },
        );
        Ok(client)
    }

    /// Transport and credential failures are counted and logged; other failures pass through.
    fn note_failure<T>(&self, server: &str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_connection_error() {
                self.connection_failures.fetch_add(1, Ordering::SeqCst);
                warn!("cannot reach {} or credentials were rejected: {}", server, err);
            }
        }
        result
    }

    fn lock_clients(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, CachedClient>> {
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::RecordingLauncher;
    use mockito::Matcher;
    use std::time::Duration;

    struct Fixture {
        registry: ProviderRegistry,
        credentials: Arc<StaticCredentials>,
        launcher: Arc<RecordingLauncher>,
    }

    fn fixture(server: &mockito::Server) -> Fixture {
        let base = server.url();
        let catalog = ServerCatalog::builder()
            .servers(ServerKind::OnPremIssueTracker, [base.clone()])
            .servers(ServerKind::GitHostIssueTracker, ["acme/widgets"])
            .servers(ServerKind::OnPremVcs, [base.clone()])
            .servers(ServerKind::OnPremDistributedVcs, [format!("{base}|Proj|Repo"), format!("{base}|Proj")])
            .servers(ServerKind::GitHostVcs, ["acme/widgets"])
            .build();
        let credentials = Arc::new(StaticCredentials::default());
        credentials.set(ServerKind::OnPremIssueTracker, Credential::basic("dev", "pw"));
        credentials.set(ServerKind::OnPremVcs, Credential::basic("dev", "pw"));
        credentials.set(ServerKind::OnPremDistributedVcs, Credential::basic("dev", "pw"));
        let launcher = Arc::new(RecordingLauncher::default());
        let options = ProviderOptions::default()
            .with_github_api_base(base)
            .with_cooldown(Duration::ZERO);
        let registry = ProviderRegistry::new(
            catalog,
            Arc::clone(&credentials) as Arc<dyn CredentialSource>,
            Arc::clone(&launcher) as Arc<dyn Launcher>,
            options,
        );
        Fixture {
            registry,
            credentials,
            launcher,
        }
    }

    async fn mock_work_item(server: &mut mockito::Server, expected_calls: usize) -> mockito::Mock {
        server
            .mock("GET", "/_apis/wit/workitems/42")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"id": 42, "fields": {"System.Title": "Crash on save"},
                    "_links": {"html": {"href": "https://tfs/Coll/_workitems/edit/42"}}}"#,
            )
            .expect(expected_calls)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn repeated_lookup_reuses_cached_client() {
        let mut server = mockito::Server::new_async().await;
        let mock = mock_work_item(&mut server, 2).await;
        let fx = fixture(&server);
        let base = server.url();

        let first = fx.registry.work_item_url(&base, "42").await.unwrap();
        let second = fx.registry.work_item_url(&base, "42").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.registry.client_builds(), 1);
        assert_eq!(fx.registry.cached_client_count(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_credentials_count_as_connection_failures() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/_apis/wit/workitems/7")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;
        let fx = fixture(&server);
        let base = server.url();

        let err = fx.registry.work_item_url(&base, "7").await.unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(fx.registry.connection_failures(), 1);

        let err = fx.registry.work_item_url(&base, "abc").await.unwrap_err();
        assert!(matches!(err, ProviderError::Format(_)));
        assert_eq!(fx.registry.connection_failures(), 1);
        assert_eq!(fx.registry.client_builds(), 1);
    }

    #[tokio::test]
    async fn credential_change_rebuilds_client() {
        let mut server = mockito::Server::new_async().await;
        let _mock = mock_work_item(&mut server, 3).await;
        let fx = fixture(&server);
        let base = server.url();

        fx.registry.work_item_url(&base, "42").await.unwrap();
        fx.credentials
            .set(ServerKind::OnPremIssueTracker, Credential::basic("dev", "rotated"));
        fx.registry.work_item_url(&base, "42").await.unwrap();
        assert_eq!(fx.registry.client_builds(), 2);

        fx.registry.work_item_url(&base, "42").await.unwrap();
        assert_eq!(fx.registry.client_builds(), 2);
        assert_eq!(fx.registry.cached_client_count(), 1);
    }

    #[tokio::test]
    async fn rotated_credentials_are_sent_after_rebuild() {
        let mut server = mockito::Server::new_async().await;
        let rotated = server
            .mock("GET", "/_apis/wit/workitems/42")
            .match_query(Matcher::Any)
            .match_header("authorization", "Basic ZGV2OnJvdGF0ZWQ=")
            .with_status(200)
            .with_body(r#"{"id": 42, "_links": {"html": {"href": "https://tfs/42"}}}"#)
            .create_async()
            .await;
        let fx = fixture(&server);

        fx.credentials
            .set(ServerKind::OnPremIssueTracker, Credential::basic("dev", "rotated"));
        fx.registry.work_item_url(&server.url(), "42").await.unwrap();
        rotated.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_server_is_configuration_error() {
        let server = mockito::Server::new_async().await;
        let fx = fixture(&server);

        let err = fx
            .registry
            .work_item_url("https://nowhere", "1")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert_eq!(fx.registry.client_builds(), 0);
    }

    #[tokio::test]
    async fn packed_changeset_field_resolves_each_sub_id() {
        let mut server = mockito::Server::new_async().await;
        let tfvc = server
            .mock("GET", "/_apis/tfvc/changesets/12")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"changesetId": 12, "_links": {"web": {"href": "https://tfs/cs/12"}}}"#)
            .create_async()
            .await;
        let git = server
            .mock("GET", "/Proj/_apis/git/repositories/Repo/commits/ab34")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"commitId": "ab34", "_links": {"web": {"href": "https://tfs/commit/ab34"}}}"#)
            .create_async()
            .await;
        let fx = fixture(&server);
        let identifier = format!("{}|Proj|Repo", server.url());

        let urls = fx.registry.changeset_urls(&identifier, "12,ab34").await.unwrap();

        assert_eq!(urls, vec!["https://tfs/cs/12", "https://tfs/commit/ab34"]);
        assert_eq!(fx.registry.cached_client_count(), 2);
        tfvc.assert_async().await;
        git.assert_async().await;
    }

    #[tokio::test]
    async fn distributed_lookup_on_two_segment_identifier_is_format_error() {
        let server = mockito::Server::new_async().await;
        let fx = fixture(&server);
        let identifier = format!("{}|Proj", server.url());

        let err = fx.registry.changeset_url(&identifier, "abc123").await.unwrap_err();
        assert!(matches!(err, ProviderError::Format(_)));
    }

    #[tokio::test]
    async fn commit_id_against_plain_base_url_is_format_error() {
        let server = mockito::Server::new_async().await;
        let fx = fixture(&server);

        let err = fx.registry.changeset_url(&server.url(), "ab34").await.unwrap_err();
        assert!(matches!(err, ProviderError::Format(_)));
    }

    #[tokio::test]
    async fn empty_changeset_field_is_format_error() {
        let server = mockito::Server::new_async().await;
        let fx = fixture(&server);

        let err = fx.registry.changeset_urls(&server.url(), " ; ").await.unwrap_err();
        assert!(matches!(err, ProviderError::Format(_)));
    }

    #[tokio::test]
    async fn git_host_commits_share_the_github_client() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/widgets/commits/ab34")
            .with_status(200)
            .with_body(r#"{"sha": "ab34", "html_url": "https://github.com/acme/widgets/commit/ab34"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/acme/widgets/pulls/5")
            .with_status(200)
            .with_body(r#"{"number": 5, "title": "t", "html_url": "https://github.com/acme/widgets/pull/5"}"#)
            .create_async()
            .await;
        let fx = fixture(&server);

        fx.registry.changeset_url("acme/widgets", "ab34").await.unwrap();
        fx.registry.work_item_url("acme/widgets", "5").await.unwrap();
        assert_eq!(fx.registry.client_builds(), 1);
    }

    #[tokio::test]
    async fn open_item_launches_every_resolved_url() {
        let mut server = mockito::Server::new_async().await;
        let _wi = mock_work_item(&mut server, 1).await;
        server
            .mock("GET", Matcher::Regex(r"^/_apis/tfvc/changesets/\d+$".into()))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"changesetId": 1, "_links": {"web": {"href": "https://tfs/cs"}}}"#)
            .expect(2)
            .create_async()
            .await;
        let fx = fixture(&server);
        let base = server.url();

        fx.registry.open_item(ItemType::WorkItem, &base, "42").await.unwrap();
        fx.registry.open_item(ItemType::Changeset, &base, "1;2").await.unwrap();

        assert_eq!(
            fx.launcher.opened(),
            vec!["https://tfs/Coll/_workitems/edit/42", "https://tfs/cs", "https://tfs/cs"]
        );
    }

    #[tokio::test]
    async fn concurrent_lookups_build_one_client() {
        let mut server = mockito::Server::new_async().await;
        let _mock = mock_work_item(&mut server, 8).await;
        let fx = fixture(&server);
        let registry = Arc::new(fx.registry);
        let base = server.url();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let base = base.clone();
            handles.push(tokio::spawn(async move {
                registry.work_item_url(&base, "42").await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(registry.client_builds(), 1);
    }
}
