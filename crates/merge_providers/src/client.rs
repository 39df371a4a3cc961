use crate::config::ConnectionConfig;
use crate::error::{ProviderError, Result};
use crate::rate_limiter::RateLimiter;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Remote handle for one provider instance: an HTTP client with default auth headers and request pacing.
#[derive(Clone)]
pub struct RestClient {
    http: HttpClient,
    config: ConnectionConfig,
    limiter: RateLimiter,
}

impl RestClient {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let http = build_http_client(&config)?;
        let limiter = RateLimiter::new(config.cooldown);
        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    pub async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.get_with_query(path, None).await
    }

    pub async fn get_with_query<T>(
        &self,
        path: &str,
        query: Option<&[(&str, &str)]>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.limiter.hit().await;
        let url = self.url_for(path);
        debug!("provider request {}", url);
        let mut request = self.http.get(url);
        if let Some(params) = query {
            request = request.query(params);
        }
        let response = request.send().await?;
        Self::parse_json(response).await
    }

    /// Absolute URL for a path relative to the configured base URL.
    pub fn url_for(&self, path: &str) -> String {
        let mut base = self.config.api_root();
        let trimmed = path.trim_start_matches('/');
        base.push_str(trimmed);
        base
    }

    async fn parse_json<T>(response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(ProviderError::from)
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::Authentication(format!(
                "Access denied ({}) - {}",
                status, body
            )))
        } else if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::NotFound(
                extract_error_message(&body).unwrap_or_else(|| status.to_string()),
            ))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(build_http_error(status, &body))
        }
    }
}

fn build_http_client(config: &ConnectionConfig) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();

    if let Some(auth) = config.credential.authorization_header() {
        let mut auth_value = header_value(auth)?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
    }

    if let Some(accept) = &config.accept {
        headers.insert(ACCEPT, header_value(accept.clone())?);
    }

    headers.insert(USER_AGENT, header_value(config.user_agent.clone())?);

    HttpClient::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|err| ProviderError::Other(err.to_string()))
}

fn header_value(value: String) -> Result<HeaderValue> {
    HeaderValue::from_str(&value).map_err(|err| ProviderError::Other(err.to_string()))
}

fn build_http_error(status: StatusCode, body: &str) -> ProviderError {
    let code = extract_error_code(body);
    ProviderError::http(status, code, body.to_string())
}

fn extract_error_code(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    ["typeKey", "code"]
        .iter()
        .find_map(|field| value.get(field).and_then(|c| c.as_str()).map(|s| s.to_string()))
}

/// Pulls a human readable message out of Azure DevOps, GitHub or Jira error bodies.
fn extract_error_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
        return Some(message.to_string());
    }
    value
        .get("errorMessages")
        .and_then(|messages| messages.as_array())
        .and_then(|messages| messages.first())
        .and_then(|first| first.as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Deserialize)]
    struct Probe {
        value: u32,
    }

    fn client_for(server: &mockito::Server, credential: Credential) -> RestClient {
        let config = ConnectionConfig::new(server.url(), credential).with_cooldown(Duration::ZERO);
        RestClient::new(config).expect("client builds")
    }

    #[tokio::test]
    async fn get_sends_authorization_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/probe")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"value": 7}"#)
            .create_async()
            .await;

        let client = client_for(&server, Credential::bearer("tok"));
        let probe: Probe = client.get("probe").await.expect("probe succeeds");

        assert_eq!(probe.value, 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/probe")
            .with_status(401)
            .with_body("nope")
            .create_async()
            .await;

        let client = client_for(&server, Credential::basic("a", "b"));
        let err = client.get::<Probe>("probe").await.unwrap_err();
        assert!(matches!(err, ProviderError::Authentication(_)));
    }

    #[tokio::test]
    async fn missing_record_maps_to_not_found_with_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/probe")
            .with_status(404)
            .with_body(r#"{"message": "TF401232: Work item 99 does not exist"}"#)
            .create_async()
            .await;

        let client = client_for(&server, Credential::Anonymous);
        match client.get::<Probe>("probe").await {
            Err(ProviderError::NotFound(message)) => assert!(message.contains("TF401232")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_keeps_status_and_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/probe")
            .with_status(500)
            .with_body(r#"{"typeKey": "VssServiceException", "message": "boom"}"#)
            .create_async()
            .await;

        let client = client_for(&server, Credential::Anonymous);
        match client.get::<Probe>("probe").await {
            Err(ProviderError::Http { status, code, .. }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(code.as_deref(), Some("VssServiceException"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn url_for_joins_relative_paths() {
        let config = ConnectionConfig::new("https://host/tfs/", Credential::Anonymous);
        let client = RestClient::new(config).expect("client builds");
        assert_eq!(client.url_for("/_apis/wit/workitems/1"), "https://host/tfs/_apis/wit/workitems/1");
    }

    #[test]
    fn jira_error_messages_are_extracted() {
        let body = r#"{"errorMessages": ["Issue does not exist or you do not have permission to see it."]}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("Issue does not exist or you do not have permission to see it.")
        );
    }
}
