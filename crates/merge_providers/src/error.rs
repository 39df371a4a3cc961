//! Error model used by provider client operations.

use std::io;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Failure of a provider lookup: malformed ids or identifiers, missing remote records, transport and credential problems, or an identifier no configured provider owns.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("format error: {0}")]
    Format(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("http {status}: {message}")]
    Http {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("failed to launch {url}: {message}")]
    Launch { url: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Constructs an HTTP error variant with optional API-specific code.
    pub fn http(status: StatusCode, code: Option<String>, message: impl Into<String>) -> Self {
        ProviderError::Http {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        ProviderError::Format(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ProviderError::NotFound(message.into())
    }

    /// True for transport and credential failures.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_)
                | ProviderError::Timeout(_)
                | ProviderError::Authentication(_)
                | ProviderError::Http { .. }
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    /// Converts reqwest errors into semantic ProviderError variants.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_status() {
            let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            ProviderError::Http {
                status,
                code: None,
                message: err.to_string(),
            }
        } else if err.is_connect() || err.is_request() {
            ProviderError::Network(err.to_string())
        } else if err.is_decode() {
            ProviderError::Serialization(err.to_string())
        } else {
            ProviderError::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    /// Converts serde_json decode/encode failures into serialization errors.
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Serialization(err.to_string())
    }
}
