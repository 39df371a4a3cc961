//! Jira issues through the REST v2 API.

use std::sync::Arc;

use async_trait::async_trait;

use super::WorkItemProvider;
use crate::catalog::ServerKind;
use crate::client::RestClient;
use crate::error::{ProviderError, Result};
use crate::ids::parse_ticket_key;
use crate::models::JiraIssue;

pub struct JiraIssues {
    server: String,
    client: Arc<RestClient>,
}

impl JiraIssues {
    pub fn new(server: impl Into<String>, client: Arc<RestClient>) -> Self {
        Self {
            server: server.into(),
            client,
        }
    }

    async fn fetch(&self, key: &str) -> Result<JiraIssue> {
        let key = parse_ticket_key(key)?;
        let path = format!("rest/api/2/issue/{key}");
        self.client
            .get_with_query(&path, Some(&[("fields", "summary")][..]))
            .await
    }
}

#[async_trait]
impl WorkItemProvider for JiraIssues {
    fn kind(&self) -> ServerKind {
        ServerKind::ExternalTicketTracker
    }

    /// Browse URL built from the configured base and the canonical key the server returned.
    async fn work_item_url(&self, id: &str) -> Result<String> {
        let issue = self.fetch(id).await?;
        Ok(format!(
            "{}/browse/{}",
            self.server.trim_end_matches('/'),
            issue.key
        ))
    }

    async fn work_item_title(&self, id: &str) -> Result<String> {
        let issue = self.fetch(id).await?;
        issue.fields.summary.ok_or_else(|| {
            ProviderError::not_found(format!("Issue {} on server {} has no summary.", issue.key, self.server))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use crate::config::ConnectionConfig;
    use mockito::Matcher;
    use std::time::Duration;

    fn provider(server: &mockito::Server) -> JiraIssues {
        let config = ConnectionConfig::new(server.url(), Credential::basic("alice", "s3cret"))
            .with_cooldown(Duration::ZERO);
        let client = Arc::new(RestClient::new(config).expect("client builds"));
        JiraIssues::new(format!("{}/", server.url()), client)
    }

    #[tokio::test]
    async fn url_uses_browse_path_and_returned_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/api/2/issue/proj-123")
            .match_query(Matcher::UrlEncoded("fields".into(), "summary".into()))
            .match_header("authorization", "Basic YWxpY2U6czNjcmV0")
            .with_status(200)
            .with_body(r#"{"id": "10001", "key": "PROJ-123", "fields": {"summary": "Login fails"}}"#)
            .create_async()
            .await;

        let jira = provider(&server);
        let url = jira.work_item_url("proj-123").await.unwrap();
        assert_eq!(url, format!("{}/browse/PROJ-123", server.url()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn title_is_summary() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/api/2/issue/PROJ-9")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"key": "PROJ-9", "fields": {"summary": "Upgrade parser"}}"#)
            .create_async()
            .await;

        assert_eq!(provider(&server).work_item_title("PROJ-9").await.unwrap(), "Upgrade parser");
    }

    #[tokio::test]
    async fn missing_issue_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/api/2/issue/PROJ-404")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"errorMessages": ["Issue does not exist or you do not have permission to see it."], "errors": {}}"#)
            .create_async()
            .await;

        let err = provider(&server).work_item_url("PROJ-404").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
