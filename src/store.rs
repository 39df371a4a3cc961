//! File-backed store holding the configuration record and all merge items.
//!
//! The document keeps items and targets in separate collections linked by `MergeItemId`,
//! with a `UserVersion` counter gating the one-time legacy migration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

use crate::config::RootConfiguration;
use crate::error::{StartupError, StoreError};
use crate::model::{MergeItem, MergeTarget};

pub const CURRENT_USER_VERSION: u32 = 1;
pub const STORE_FILE_NAME: &str = "merge-tracker.json";

/// Secrets found in a legacy configuration record. They are handed to the secret store and
/// never written back to the document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LegacySecrets {
    pub on_prem_password: Option<String>,
    pub cloud_token: Option<String>,
}

impl LegacySecrets {
    pub fn is_empty(&self) -> bool {
        self.on_prem_password.is_none() && self.cloud_token.is_none()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "PascalCase")]
struct MergeItemRecord {
    #[serde(rename = "ObjectId")]
    id: u64,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
struct StoreDocument {
    #[serde(default)]
    user_version: u32,
    #[serde(default)]
    saved_at: Option<String>,
    #[serde(default)]
    next_object_id: u64,
    #[serde(default)]
    configuration: RootConfiguration,
    #[serde(default)]
    merge_items: Vec<MergeItemRecord>,
    #[serde(default)]
    merge_targets: Vec<MergeTarget>,
}

/// Renames legacy field names in place. Runs only while `UserVersion` is 0.
///
/// Returns the secrets that the legacy configuration record carried in plain text.
pub fn migrate_document(document: &mut Value) -> Option<LegacySecrets> {
    let root = document.as_object_mut()?;
    let version = root.get("UserVersion").and_then(Value::as_u64).unwrap_or(0);
    if version != 0 {
        return None;
    }

    if let Some(targets) = root.get_mut("MergeTargets").and_then(Value::as_array_mut) {
        for target in targets.iter_mut().filter_map(Value::as_object_mut) {
            rename_field(target, "BugNumber", "WorkItemId");
            rename_field(target, "Changeset", "ChangesetId");
        }
    }

    let mut secrets = LegacySecrets::default();
    if let Some(configuration) = root.get_mut("Configuration").and_then(Value::as_object_mut) {
        rename_field(configuration, "ShowTfsSettings", "ShowProjectSettings");
        rename_field(configuration, "TfsUsername", "OnPremTfsUsername");
        rename_field(configuration, "TfsPassword", "OnPremTfsPassword");
        rename_field(configuration, "TfsToken", "CloudAzureDevOpsToken");
        secrets.on_prem_password = take_secret(configuration, "OnPremTfsPassword");
        secrets.cloud_token = take_secret(configuration, "CloudAzureDevOpsToken");
    }

    root.insert("UserVersion".to_string(), Value::from(CURRENT_USER_VERSION));
    Some(secrets)
}

fn rename_field(object: &mut JsonMap<String, Value>, from: &str, to: &str) {
    if let Some(value) = object.remove(from) {
        object.entry(to.to_string()).or_insert(value);
    }
}

fn take_secret(object: &mut JsonMap<String, Value>, key: &str) -> Option<String> {
    match object.remove(key) {
        Some(Value::String(secret)) if !secret.is_empty() => Some(secret),
        _ => None,
    }
}

struct StoreState {
    configuration: RootConfiguration,
    items: Vec<MergeItem>,
    next_object_id: u64,
    dirty: bool,
}

impl StoreState {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }

    fn item_mut(&mut self, item_id: u64) -> Result<&mut MergeItem, StoreError> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(StoreError::UnknownItem(item_id))
    }

    fn to_document(&self) -> StoreDocument {
        StoreDocument {
            user_version: CURRENT_USER_VERSION,
            saved_at: Some(Utc::now().to_rfc3339()),
            next_object_id: self.next_object_id,
            configuration: self.configuration.clone(),
            merge_items: self
                .items
                .iter()
                .map(|item| MergeItemRecord {
                    id: item.id,
                    name: Some(item.name.clone()),
                })
                .collect(),
            merge_targets: self
                .items
                .iter()
                .flat_map(|item| item.targets.iter().cloned())
                .collect(),
        }
    }

    fn from_document(document: StoreDocument) -> Self {
        let mut items: Vec<MergeItem> = document
            .merge_items
            .into_iter()
            .map(|record| MergeItem {
                id: record.id,
                name: record.name.unwrap_or_default(),
                targets: Vec::new(),
                last_error: None,
                filtered_out: false,
            })
            .collect();

        let mut max_id = items.iter().map(|item| item.id).max().unwrap_or(0);
        for target in document.merge_targets {
            max_id = max_id.max(target.id);
            match items.iter_mut().find(|item| item.id == target.merge_item_id) {
                Some(item) => item.targets.push(target),
                None => warn!(
                    "Dropping merge target {} owned by missing merge item {}",
                    target.id, target.merge_item_id
                ),
            }
        }
        for item in &mut items {
            item.normalize_original();
        }

        Self {
            configuration: document.configuration.normalize(),
            items,
            next_object_id: document.next_object_id.max(max_id + 1),
            dirty: false,
        }
    }
}

/// Result of opening the store.
pub struct OpenedStore {
    pub store: MergeStore,
    /// Secrets lifted out of a legacy document during migration.
    pub legacy_secrets: Option<LegacySecrets>,
}

/// Thread-safe store of the configuration and merge items, persisted as one JSON document.
pub struct MergeStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl MergeStore {
    /// Store file in the platform configuration directory.
    pub fn default_path() -> Result<PathBuf, StartupError> {
        let dirs = directories::ProjectDirs::from("org", "mergetracker", "merge-tracker")
            .ok_or(StartupError::NoConfigDirectory)?;
        Ok(dirs.config_dir().join(STORE_FILE_NAME))
    }

    /// Loads the store, creating an empty one when the file does not exist yet.
    ///
    /// An existing file that cannot be read or parsed is fatal.
    pub fn open(path: impl Into<PathBuf>) -> Result<OpenedStore, StartupError> {
        let path = path.into();
        Self::load(&path).map_err(|source| StartupError::UnreadableStore {
            path: path.clone(),
            source,
        })
    }

    fn load(path: &Path) -> Result<OpenedStore, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("No store at {}, starting empty", path.display());
                let state = StoreState::from_document(StoreDocument {
                    user_version: CURRENT_USER_VERSION,
                    next_object_id: 1,
                    ..StoreDocument::default()
                });
                return Ok(OpenedStore {
                    store: Self::with_state(path, state),
                    legacy_secrets: None,
                });
            }
            Err(err) => return Err(err.into()),
        };

        let mut document: Value = serde_json::from_str(&content)?;
        let legacy_secrets = migrate_document(&mut document);
        let migrated = legacy_secrets.is_some();
        let document: StoreDocument = serde_json::from_value(document)?;
        let mut state = StoreState::from_document(document);
        if migrated {
            info!("Migrated store at {} to version {}", path.display(), CURRENT_USER_VERSION);
            state.dirty = true;
        }

        debug!(
            "Loaded {} merge item(s) from {}",
            state.items.len(),
            path.display()
        );
        Ok(OpenedStore {
            store: Self::with_state(path, state),
            legacy_secrets: legacy_secrets.filter(|secrets| !secrets.is_empty()),
        })
    }

    fn with_state(path: &Path, state: StoreState) -> Self {
        Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Writes the document, copying the previous file to the `.bak` sibling first.
    pub fn save(&self) -> Result<(), StoreError> {
        let content = {
            let mut state = self.lock();
            let content = serde_json::to_string_pretty(&state.to_document())?;
            state.dirty = false;
            content
        };

        if let Err(err) = self.write_with_backup(&content) {
            self.lock().dirty = true;
            return Err(err.into());
        }
        debug!("Saved store to {}", self.path.display());
        Ok(())
    }

    fn write_with_backup(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }
        fs::write(&self.path, content)
    }

    /// Saves only when something changed since the last save.
    pub fn save_if_dirty(&self) -> Result<bool, StoreError> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    pub fn configuration(&self) -> RootConfiguration {
        self.lock().configuration.clone()
    }

    pub fn update_configuration<R>(&self, update: impl FnOnce(&mut RootConfiguration) -> R) -> R {
        let mut state = self.lock();
        let result = update(&mut state.configuration);
        state.dirty = true;
        result
    }

    pub fn items(&self) -> Vec<MergeItem> {
        self.lock().items.clone()
    }

    pub fn item(&self, item_id: u64) -> Option<MergeItem> {
        self.lock().items.iter().find(|item| item.id == item_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// New item named "New Merge Item" with one original target.
    pub fn create_merge_item(&self) -> MergeItem {
        let mut state = self.lock();
        let item_id = state.allocate_id();
        let target_id = state.allocate_id();
        let item = MergeItem::new(item_id, target_id);
        state.items.push(item.clone());
        state.dirty = true;
        item
    }

    /// Deletes an item together with all of its targets.
    pub fn delete_merge_item(&self, item_id: u64) -> Result<MergeItem, StoreError> {
        let mut state = self.lock();
        let index = state
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(StoreError::UnknownItem(item_id))?;
        let removed = state.items.remove(index);
        state.dirty = true;
        Ok(removed)
    }

    pub fn create_merge_target(&self, item_id: u64) -> Result<MergeTarget, StoreError> {
        let mut state = self.lock();
        let target_id = state.allocate_id();
        let target = state.item_mut(item_id)?.add_target(target_id).clone();
        state.dirty = true;
        Ok(target)
    }

    pub fn delete_merge_target(&self, item_id: u64, target_id: u64) -> Result<MergeTarget, StoreError> {
        let mut state = self.lock();
        let removed = state
            .item_mut(item_id)?
            .remove_target(target_id)
            .ok_or(StoreError::UnknownTarget {
                item: item_id,
                target: target_id,
            })?;
        state.dirty = true;
        Ok(removed)
    }

    /// Mutates one item under the store lock.
    pub fn update_item<R>(
        &self,
        item_id: u64,
        update: impl FnOnce(&mut MergeItem) -> R,
    ) -> Result<R, StoreError> {
        let mut state = self.lock();
        let result = update(state.item_mut(item_id)?);
        state.dirty = true;
        Ok(result)
    }

    /// Mutates one target under the store lock.
    ///
    /// Marking the target original through `update` clears the flag on its siblings.
    pub fn update_target<R>(
        &self,
        item_id: u64,
        target_id: u64,
        update: impl FnOnce(&mut MergeTarget) -> R,
    ) -> Result<R, StoreError> {
        let mut state = self.lock();
        let item = state.item_mut(item_id)?;
        let target = item.target_mut(target_id).ok_or(StoreError::UnknownTarget {
            item: item_id,
            target: target_id,
        })?;
        let was_original = target.is_original;
        let result = update(target);
        if target.is_original && !was_original {
            item.set_original(target_id, true);
        }
        state.dirty = true;
        Ok(result)
    }

    pub fn set_original(&self, item_id: u64, target_id: u64, is_original: bool) -> Result<(), StoreError> {
        let mut state = self.lock();
        if !state.item_mut(item_id)?.set_original(target_id, is_original) {
            return Err(StoreError::UnknownTarget {
                item: item_id,
                target: target_id,
            });
        }
        state.dirty = true;
        Ok(())
    }

    /// Transient advisory text; does not mark the store dirty.
    pub fn set_last_error(&self, item_id: u64, message: Option<String>) {
        let mut state = self.lock();
        if let Ok(item) = state.item_mut(item_id) {
            item.last_error = message;
        }
    }

    /// Records which items the current filter hides.
    pub(crate) fn mark_visible(&self, visible: &[u64]) {
        let mut state = self.lock();
        for item in &mut state.items {
            item.filtered_out = !visible.contains(&item.id);
        }
    }
}
