//! Configured servers tagged with their provider kind.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ProviderError, Result};

/// Which capability set a server is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerFamily {
    WorkItems,
    SourceControl,
}

/// Concrete provider variant behind a server identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerKind {
    /// On-prem Team Foundation / Azure DevOps Server collection, basic credentials.
    OnPremIssueTracker,
    /// dev.azure.com organization, personal access token only.
    CloudIssueTracker,
    /// GitHub repository pull requests.
    GitHostIssueTracker,
    /// Jira instance.
    ExternalTicketTracker,
    /// On-prem centralized version control (TFVC).
    OnPremVcs,
    /// On-prem git repository addressed as `baseUrl|project|repository`.
    OnPremDistributedVcs,
    /// GitHub repository commits.
    GitHostVcs,
}

impl ServerKind {
    /// Work-item kinds in resolution priority order.
    pub const WORK_ITEM_PRIORITY: [ServerKind; 4] = [
        ServerKind::OnPremIssueTracker,
        ServerKind::CloudIssueTracker,
        ServerKind::GitHostIssueTracker,
        ServerKind::ExternalTicketTracker,
    ];

    /// Source-control kinds in resolution priority order.
    pub const SOURCE_CONTROL_PRIORITY: [ServerKind; 3] = [
        ServerKind::OnPremVcs,
        ServerKind::OnPremDistributedVcs,
        ServerKind::GitHostVcs,
    ];

    pub fn family(self) -> ServerFamily {
        match self {
            ServerKind::OnPremIssueTracker
            | ServerKind::CloudIssueTracker
            | ServerKind::GitHostIssueTracker
            | ServerKind::ExternalTicketTracker => ServerFamily::WorkItems,
            ServerKind::OnPremVcs | ServerKind::OnPremDistributedVcs | ServerKind::GitHostVcs => {
                ServerFamily::SourceControl
            }
        }
    }

    pub fn priority(family: ServerFamily) -> &'static [ServerKind] {
        match family {
            ServerFamily::WorkItems => &Self::WORK_ITEM_PRIORITY,
            ServerFamily::SourceControl => &Self::SOURCE_CONTROL_PRIORITY,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ServerKind::OnPremIssueTracker => "on-prem work items",
            ServerKind::CloudIssueTracker => "cloud work items",
            ServerKind::GitHostIssueTracker => "GitHub pull requests",
            ServerKind::ExternalTicketTracker => "Jira issues",
            ServerKind::OnPremVcs => "on-prem changesets",
            ServerKind::OnPremDistributedVcs => "on-prem git commits",
            ServerKind::GitHostVcs => "GitHub commits",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A configured identifier together with the kind it resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerEntry {
    pub identifier: String,
    pub kind: ServerKind,
}

/// Per-kind identifier lists collected from configuration, before priority resolution.
#[derive(Clone, Debug, Default)]
pub struct CatalogBuilder {
    lists: HashMap<ServerKind, Vec<String>>,
}

impl CatalogBuilder {
    pub fn servers<I, S>(mut self, kind: ServerKind, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lists
            .entry(kind)
            .or_default()
            .extend(identifiers.into_iter().map(Into::into));
        self
    }

    /// Tags every identifier with the first kind (in priority order) that lists it.
    pub fn build(self) -> ServerCatalog {
        let mut catalog = ServerCatalog::default();
        for family in [ServerFamily::WorkItems, ServerFamily::SourceControl] {
            for kind in ServerKind::priority(family) {
                let Some(identifiers) = self.lists.get(kind) else {
                    continue;
                };
                for raw in identifiers {
                    let identifier = raw.trim();
                    if identifier.is_empty() {
                        continue;
                    }
                    let key = (family, identifier.to_string());
                    if let Some(existing) = catalog.index.get(&key) {
                        if existing != kind {
                            warn!(
                                "server '{}' is configured as {} and {}; using {}",
                                identifier, existing, kind, existing
                            );
                        }
                        continue;
                    }
                    catalog.index.insert(key, *kind);
                    catalog.entries.push(ServerEntry {
                        identifier: identifier.to_string(),
                        kind: *kind,
                    });
                }
            }
        }
        catalog
    }
}

/// Immutable lookup from `(family, identifier)` to [`ServerKind`].
#[derive(Clone, Debug, Default)]
pub struct ServerCatalog {
    entries: Vec<ServerEntry>,
    index: HashMap<(ServerFamily, String), ServerKind>,
}

impl ServerCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn resolve(&self, family: ServerFamily, identifier: &str) -> Result<ServerKind> {
        self.index
            .get(&(family, identifier.trim().to_string()))
            .copied()
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "No configured {} server matches '{}'",
                    match family {
                        ServerFamily::WorkItems => "work item",
                        ServerFamily::SourceControl => "source control",
                    },
                    identifier
                ))
            })
    }

    /// First configured identifier of the family, the fallback for targets without an override.
    pub fn default_server(&self, family: ServerFamily) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.kind.family() == family)
            .map(|entry| entry.identifier.as_str())
    }

    pub fn servers(&self, kind: ServerKind) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |entry| entry.kind == kind)
            .map(|entry| entry.identifier.as_str())
    }

    pub fn entries(&self) -> &[ServerEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
