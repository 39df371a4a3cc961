//! Error types of the persistence, query and startup layers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("store document is corrupt: {0}")]
    Corrupt(String),
    #[error("merge item {0} does not exist")]
    UnknownItem(u64),
    #[error("merge target {target} does not belong to merge item {item}")]
    UnknownTarget { item: u64, target: u64 },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Filter text that cannot be turned into a matcher.
#[derive(Debug, Error)]
#[error("filter '{filter}' cannot be evaluated: {reason}")]
pub struct QueryError {
    pub filter: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("Failed to open keyring entry: {0}")]
    Entry(String),
    #[error("Failed to read {account} from keyring: {message}")]
    Read { account: String, message: String },
    #[error("Failed to store {account} in keyring: {message}")]
    Write { account: String, message: String },
    #[error("Failed to delete {account} from keyring: {message}")]
    Delete { account: String, message: String },
}

/// Failures that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not determine the configuration directory")]
    NoConfigDirectory,
    #[error("unable to read the merge tracker store at {}: {source}", path.display())]
    UnreadableStore {
        path: PathBuf,
        #[source]
        source: StoreError,
    },
    #[error("failed to start the async runtime: {0}")]
    Runtime(#[from] io::Error),
}

/// Failure of a user action on a merge target, before or during the provider call.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Provider(#[from] merge_providers::ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("No {0} server is configured.")]
    NoServer(&'static str),
    #[error("The merge target has no {0}.")]
    MissingId(&'static str),
}
