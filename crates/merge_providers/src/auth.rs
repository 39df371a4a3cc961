//! Credentials used to authenticate against provider instances.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

/// Credential fields a remote client is built with.
///
/// A cached client keeps the value it was built from; comparing it with the
/// live value on every call detects rotation.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub enum Credential {
    #[default]
    Anonymous,
    Basic {
        username: String,
        password: String,
    },
    /// Azure DevOps style PAT, sent as basic auth with an empty user name.
    PersonalAccessToken(String),
    Bearer(String),
}

impl Credential {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credential::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn personal_access_token(token: impl Into<String>) -> Self {
        Credential::PersonalAccessToken(token.into())
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Credential::Bearer(token.into())
    }

    /// Value for the `Authorization` header, `None` for anonymous access.
    pub fn authorization_header(&self) -> Option<String> {
        match self {
            Credential::Anonymous => None,
            Credential::Basic { username, password } => Some(format!(
                "Basic {}",
                BASE64_STANDARD.encode(format!("{username}:{password}"))
            )),
            Credential::PersonalAccessToken(token) => Some(format!(
                "Basic {}",
                BASE64_STANDARD.encode(format!(":{token}"))
            )),
            Credential::Bearer(token) => Some(format!("Bearer {token}")),
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Credential::Anonymous => "anonymous",
            Credential::Basic { .. } => "basic",
            Credential::PersonalAccessToken(_) => "pat",
            Credential::Bearer(_) => "bearer",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            other => write!(f, "Credential({})", other.scheme()),
        }
    }
}
