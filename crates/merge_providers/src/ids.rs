//! Item id and server identifier shapes.
//!
//! Work-item ids, centralized changeset ids and pull-request numbers are decimal
//! integers, commit ids are hex strings, external ticket keys are free strings.
//! A changeset field may pack several ids separated by `,` or `;`.

use crate::error::{ProviderError, Result};

/// Lookup family a single changeset sub-id belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangesetKind {
    /// Purely numeric, resolved as an integer-keyed changeset.
    Centralized,
    /// Contains letters, resolved as a commit.
    Distributed,
}

/// Classifies one sub-id by the presence of any alphabetic character.
pub fn classify_changeset_id(id: &str) -> ChangesetKind {
    if id.chars().any(char::is_alphabetic) {
        ChangesetKind::Distributed
    } else {
        ChangesetKind::Centralized
    }
}

/// Splits a changeset field into trimmed, non-empty sub-ids in their original order.
pub fn split_changeset_ids(field: &str) -> Vec<&str> {
    field
        .split([',', ';'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// Parses a decimal integer id, naming `what` in the error.
pub fn parse_numeric_id(id: &str, what: &str) -> Result<u32> {
    let trimmed = id.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(ProviderError::format(format!(
            "{what} must be an integer, got '{id}'"
        )));
    }
    trimmed
        .parse::<u32>()
        .map_err(|err| ProviderError::format(format!("{what} '{id}' is out of range: {err}")))
}

/// Validates a commit id as a non-empty hex string.
pub fn parse_commit_id(id: &str) -> Result<&str> {
    let trimmed = id.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProviderError::format(format!(
            "commit ids must be hexadecimal, got '{id}'"
        )));
    }
    Ok(trimmed)
}

/// Free-form external ticket key such as `PROJ-123`.
pub fn parse_ticket_key(id: &str) -> Result<&str> {
    let trimmed = id.trim();
    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) || trimmed.contains('/') {
        return Err(ProviderError::format(format!("'{id}' is not a ticket key")));
    }
    Ok(trimmed)
}

/// `"{baseUrl}|{project}|{repository}"` identifier of an on-prem distributed repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistributedRepository {
    pub host: String,
    pub project: String,
    pub repository: String,
}

impl DistributedRepository {
    pub fn parse(identifier: &str) -> Result<Self> {
        let parts: Vec<&str> = identifier
            .split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        match parts.as_slice() {
            [host, project, repository] => Ok(Self {
                host: host.to_string(),
                project: project.to_string(),
                repository: repository.to_string(),
            }),
            _ => Err(ProviderError::format(format!(
                "'{identifier}' must have the shape 'baseUrl|project|repository' ({} segment(s) found)",
                parts.len()
            ))),
        }
    }
}

/// First `|` segment of an identifier: the collection URL both centralized and distributed lookups talk to.
pub fn host_segment(identifier: &str) -> &str {
    identifier.split('|').next().unwrap_or(identifier).trim()
}

/// `"{organization}/{repository}"` identifier of a git-host repository.
///
/// Only the last two path segments count, so a full repository URL is accepted too.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostedRepository {
    pub owner: String,
    pub repository: String,
}

impl HostedRepository {
    pub fn parse(identifier: &str) -> Result<Self> {
        let mut segments = identifier
            .trim()
            .trim_end_matches('/')
            .rsplit('/')
            .map(str::trim)
            .filter(|segment| !segment.is_empty());
        match (segments.next(), segments.next()) {
            (Some(repository), Some(owner)) => Ok(Self {
                owner: owner.to_string(),
                repository: repository.to_string(),
            }),
            _ => Err(ProviderError::format(format!(
                "'{identifier}' must have the shape 'organization/repository'"
            ))),
        }
    }
}
