//! Provider clients resolving work-item and changeset ids to browser URLs and titles.
//!
//! Supported back ends: Azure DevOps Server / TFS (work items, TFVC changesets, git commits),
//! Azure DevOps Services, GitHub (pull requests and commits) and Jira.

pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod ids;
pub mod launcher;
pub mod models;
pub mod providers;
pub mod rate_limiter;
pub mod registry;

pub use auth::Credential;
pub use catalog::{CatalogBuilder, ServerCatalog, ServerEntry, ServerFamily, ServerKind};
pub use client::RestClient;
pub use config::{ConnectionConfig, ProviderOptions};
pub use error::{ProviderError, Result};
pub use ids::{classify_changeset_id, split_changeset_ids, ChangesetKind};
pub use launcher::{Launcher, RecordingLauncher, SystemLauncher};
pub use providers::{SourceControlProvider, WorkItemProvider};
pub use rate_limiter::RateLimiter;
pub use registry::{ClientKind, CredentialSource, ItemType, ProviderRegistry, StaticCredentials};
