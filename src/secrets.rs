//! Provider secrets in the OS keyring, cached in memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use keyring::{Entry, Error as KeyringError};
use log::warn;
use merge_providers::{Credential, CredentialSource, ServerKind};

use crate::error::SecretsError;
use crate::store::{LegacySecrets, MergeStore};

pub const KEYRING_SERVICE: &str = "org.mergetracker.merge-tracker";

/// One secret slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SecretKey {
    /// Password for on-prem collections, shared by work items, TFVC and git.
    OnPremPassword,
    /// Personal access token for dev.azure.com organizations.
    CloudToken,
    GitHubToken,
    JiraPassword,
}

impl SecretKey {
    pub fn account(self) -> &'static str {
        match self {
            SecretKey::OnPremPassword => "on-prem-password",
            SecretKey::CloudToken => "cloud-token",
            SecretKey::GitHubToken => "github-token",
            SecretKey::JiraPassword => "jira-password",
        }
    }
}

enum Backend {
    Keyring { service: String },
    Memory(Mutex<HashMap<SecretKey, String>>),
}

struct SecretsInner {
    backend: Backend,
    cache: Mutex<HashMap<SecretKey, Option<String>>>,
}

#[derive(Clone)]
pub struct SecretsManager {
    inner: Arc<SecretsInner>,
}

impl SecretsManager {
    pub fn keyring(service: impl Into<String>) -> Self {
        Self::with_backend(Backend::Keyring {
            service: service.into(),
        })
    }

    /// Process-local store that never touches the OS keyring.
    pub fn in_memory() -> Self {
        Self::with_backend(Backend::Memory(Mutex::new(HashMap::new())))
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            inner: Arc::new(SecretsInner {
                backend,
                cache: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn get(&self, key: SecretKey) -> Result<Option<String>, SecretsError> {
        {
            let cache = self.lock_cache();
            if let Some(cached) = cache.get(&key) {
                return Ok(cached.clone());
            }
        }

        let secret = self.read(key)?;
        self.lock_cache().insert(key, secret.clone());
        Ok(secret)
    }

    /// Stores a secret; a blank value removes it.
    pub fn set(&self, key: SecretKey, value: &str) -> Result<(), SecretsError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return self.clear(key);
        }
        self.write(key, Some(trimmed))?;
        self.lock_cache().insert(key, Some(trimmed.to_string()));
        Ok(())
    }

    pub fn clear(&self, key: SecretKey) -> Result<(), SecretsError> {
        self.write(key, None)?;
        self.lock_cache().insert(key, None);
        Ok(())
    }

    /// Moves plain-text secrets found by the store migration into the secret store.
    pub fn import_legacy(&self, legacy: &LegacySecrets) -> Result<(), SecretsError> {
        if let Some(password) = &legacy.on_prem_password {
            self.set(SecretKey::OnPremPassword, password)?;
        }
        if let Some(token) = &legacy.cloud_token {
            self.set(SecretKey::CloudToken, token)?;
        }
        Ok(())
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<SecretKey, Option<String>>> {
        self.inner
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self, key: SecretKey) -> Result<Option<String>, SecretsError> {
        match &self.inner.backend {
            Backend::Keyring { service } => match entry(service, key)?.get_password() {
                Ok(secret) => Ok(Some(secret)),
                Err(KeyringError::NoEntry) => Ok(None),
                Err(err) => Err(SecretsError::Read {
                    account: key.account().to_string(),
                    message: err.to_string(),
                }),
            },
            Backend::Memory(secrets) => Ok(secrets
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .get(&key)
                .cloned()),
        }
    }

    fn write(&self, key: SecretKey, value: Option<&str>) -> Result<(), SecretsError> {
        match &self.inner.backend {
            Backend::Keyring { service } => {
                let entry = entry(service, key)?;
                match value {
                    Some(secret) => entry.set_password(secret).map_err(|err| SecretsError::Write {
                        account: key.account().to_string(),
                        message: err.to_string(),
                    }),
                    None => match entry.delete_credential() {
                        Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
                        Err(err) => Err(SecretsError::Delete {
                            account: key.account().to_string(),
                            message: err.to_string(),
                        }),
                    },
                }
            }
            Backend::Memory(secrets) => {
                let mut secrets = secrets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                match value {
                    Some(secret) => secrets.insert(key, secret.to_string()),
                    None => secrets.remove(&key),
                };
                Ok(())
            }
        }
    }
}

fn entry(service: &str, key: SecretKey) -> Result<Entry, SecretsError> {
    Entry::new(service, key.account()).map_err(|err| SecretsError::Entry(err.to_string()))
}

/// Live credentials for the provider registry: usernames from the configuration record,
/// secrets from the keyring.
pub struct AppCredentials {
    store: Arc<MergeStore>,
    secrets: SecretsManager,
}

impl AppCredentials {
    pub fn new(store: Arc<MergeStore>, secrets: SecretsManager) -> Self {
        Self { store, secrets }
    }

    fn secret(&self, key: SecretKey) -> String {
        match self.secrets.get(key) {
            Ok(secret) => secret.unwrap_or_default(),
            Err(err) => {
                warn!("Secret {} unavailable: {}", key.account(), err);
                String::new()
            }
        }
    }
}

impl CredentialSource for AppCredentials {
    fn credential_for(&self, kind: ServerKind, _identifier: &str) -> Credential {
        match kind {
            ServerKind::OnPremIssueTracker | ServerKind::OnPremVcs | ServerKind::OnPremDistributedVcs => {
                let username = self.store.configuration().on_prem_tfs_username;
                let password = self.secret(SecretKey::OnPremPassword);
                if username.is_empty() && password.is_empty() {
                    Credential::Anonymous
                } else {
                    Credential::basic(username, password)
                }
            }
            ServerKind::CloudIssueTracker => {
                let token = self.secret(SecretKey::CloudToken);
                if token.is_empty() {
                    Credential::Anonymous
                } else {
                    Credential::personal_access_token(token)
                }
            }
            ServerKind::GitHostIssueTracker | ServerKind::GitHostVcs => {
                let token = self.secret(SecretKey::GitHubToken);
                if token.is_empty() {
                    Credential::Anonymous
                } else {
                    Credential::bearer(token)
                }
            }
            ServerKind::ExternalTicketTracker => {
                let username = self.store.configuration().jira_username;
                let password = self.secret(SecretKey::JiraPassword);
                if username.is_empty() && password.is_empty() {
                    Credential::Anonymous
                } else {
                    Credential::basic(username, password)
                }
            }
        }
    }
}
