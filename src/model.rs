//! Merge items and their branch-specific merge targets.

use merge_providers::{ServerCatalog, ServerFamily};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Name given to freshly created merge items; auto naming only replaces this value.
pub const DEFAULT_MERGE_ITEM_NAME: &str = "New Merge Item";

/// Whether a merge target has been merged.
///
/// Persisted as a nullable boolean; anything but `true` reads back as `NotCompleted`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Completion {
    Completed,
    #[default]
    NotCompleted,
}

impl Completion {
    pub fn is_completed(self) -> bool {
        self == Completion::Completed
    }
}

impl From<bool> for Completion {
    fn from(value: bool) -> Self {
        if value {
            Completion::Completed
        } else {
            Completion::NotCompleted
        }
    }
}

impl Serialize for Completion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.is_completed())
    }
}

impl<'de> Deserialize<'de> for Completion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let flag = Option::<bool>::deserialize(deserializer)?;
        Ok(Completion::from(flag.unwrap_or(false)))
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn optional_server<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|server| server.trim().to_string())
        .filter(|server| !server.is_empty()))
}

/// One branch-specific instance of a merge item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MergeTarget {
    #[serde(rename = "ObjectId")]
    pub id: u64,
    #[serde(default)]
    pub merge_item_id: u64,
    #[serde(default, deserialize_with = "nullable_string")]
    pub target_branch: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub work_item_id: String,
    /// One or more changeset or commit ids separated by `,` or `;`.
    #[serde(default, deserialize_with = "nullable_string")]
    pub changeset_id: String,
    #[serde(default)]
    pub is_original: bool,
    #[serde(rename = "IsCompleted", default)]
    pub completion: Completion,
    #[serde(default, deserialize_with = "nullable_string")]
    pub notes: String,
    #[serde(default, deserialize_with = "optional_server", skip_serializing_if = "Option::is_none")]
    pub work_item_server: Option<String>,
    #[serde(default, deserialize_with = "optional_server", skip_serializing_if = "Option::is_none")]
    pub source_control_server: Option<String>,
}

impl MergeTarget {
    pub fn new(id: u64, merge_item_id: u64) -> Self {
        Self {
            id,
            merge_item_id,
            ..Self::default()
        }
    }

    /// Explicit override, else the first configured work-item server.
    pub fn effective_work_item_server<'a>(&'a self, catalog: &'a ServerCatalog) -> Option<&'a str> {
        self.work_item_server
            .as_deref()
            .or_else(|| catalog.default_server(ServerFamily::WorkItems))
    }

    /// Explicit override, else the first configured source-control server.
    pub fn effective_source_control_server<'a>(
        &'a self,
        catalog: &'a ServerCatalog,
    ) -> Option<&'a str> {
        self.source_control_server
            .as_deref()
            .or_else(|| catalog.default_server(ServerFamily::SourceControl))
    }

    pub fn has_work_item(&self) -> bool {
        !self.work_item_id.trim().is_empty()
    }

    pub fn has_changeset(&self) -> bool {
        !self.changeset_id.trim().is_empty()
    }
}

/// A unit of work that has to be merged into several branches.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeItem {
    pub id: u64,
    pub name: String,
    pub targets: Vec<MergeTarget>,
    /// Advisory text from the last failed operation on this item. Never persisted.
    pub last_error: Option<String>,
    /// Set when the current filter hides this item. Never persisted.
    pub filtered_out: bool,
}

impl MergeItem {
    /// New item with the default name and a single original, not completed target.
    pub fn new(id: u64, first_target_id: u64) -> Self {
        let mut original = MergeTarget::new(first_target_id, id);
        original.is_original = true;
        Self {
            id,
            name: DEFAULT_MERGE_ITEM_NAME.to_string(),
            targets: vec![original],
            last_error: None,
            filtered_out: false,
        }
    }

    pub fn has_default_name(&self) -> bool {
        self.name == DEFAULT_MERGE_ITEM_NAME
    }

    pub fn target(&self, target_id: u64) -> Option<&MergeTarget> {
        self.targets.iter().find(|target| target.id == target_id)
    }

    pub fn target_mut(&mut self, target_id: u64) -> Option<&mut MergeTarget> {
        self.targets.iter_mut().find(|target| target.id == target_id)
    }

    pub fn original(&self) -> Option<&MergeTarget> {
        self.targets.iter().find(|target| target.is_original)
    }

    pub fn add_target(&mut self, target_id: u64) -> &MergeTarget {
        self.targets.push(MergeTarget::new(target_id, self.id));
        &self.targets[self.targets.len() - 1]
    }

    pub fn remove_target(&mut self, target_id: u64) -> Option<MergeTarget> {
        let index = self.targets.iter().position(|target| target.id == target_id)?;
        Some(self.targets.remove(index))
    }

    /// Sets the original flag on one target; marking a target original clears it on its siblings.
    ///
    /// Returns `false` when the target does not belong to this item.
    pub fn set_original(&mut self, target_id: u64, is_original: bool) -> bool {
        if self.target(target_id).is_none() {
            return false;
        }
        for target in &mut self.targets {
            if target.id == target_id {
                target.is_original = is_original;
            } else if is_original {
                target.is_original = false;
            }
        }
        true
    }

    /// Keeps at most one original target, preferring the first one found.
    pub(crate) fn normalize_original(&mut self) {
        let mut seen = false;
        for target in &mut self.targets {
            if target.is_original {
                if seen {
                    target.is_original = false;
                }
                seen = true;
            }
        }
    }

    /// True when at least one target is still waiting to be merged.
    pub fn has_pending_target(&self) -> bool {
        self.targets
            .iter()
            .any(|target| !target.completion.is_completed())
    }

    /// Check-in message for one target.
    ///
    /// `%o` original work item, `%v` original branch, `%b` this branch, `%t` this work item.
    pub fn checkin_note(&self, target_id: u64, template: &str) -> Option<String> {
        let target = self.target(target_id)?;
        let original = self.original();
        let original_work_item = original.map(|t| t.work_item_id.as_str()).unwrap_or("");
        let original_branch = original.map(|t| t.target_branch.as_str()).unwrap_or("");
        Some(
            template
                .replace("%o", original_work_item)
                .replace("%v", original_branch)
                .replace("%b", &target.target_branch)
                .replace("%t", &target.work_item_id),
        )
    }
}
