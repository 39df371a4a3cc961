//! Application facade tying the store, the provider registry and the task wrapper together.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{info, warn};
use merge_providers::{ItemType, Launcher, ProviderRegistry, ServerFamily};
use tokio::task::JoinHandle;

use crate::config::RootConfiguration;
use crate::error::{ActionError, SecretsError, StartupError, StoreError};
use crate::filter::{FilterEngine, FilterQuery, FilterResult};
use crate::model::{MergeItem, MergeTarget};
use crate::secrets::{AppCredentials, SecretKey, SecretsManager};
use crate::store::{MergeStore, OpenedStore};
use crate::task::{ItemErrorSink, TaskOutcome, TaskRunner};
use crate::timer::AutoSaveTimer;

const AUTO_SAVE_TICK: Duration = Duration::from_secs(1);

pub struct MergeTracker {
    store: Arc<MergeStore>,
    secrets: SecretsManager,
    launcher: Arc<dyn Launcher>,
    registry: RwLock<Arc<ProviderRegistry>>,
    filter: FilterEngine,
    tasks: TaskRunner,
    auto_save: AutoSaveTimer,
}

fn build_registry(
    store: &Arc<MergeStore>,
    secrets: &SecretsManager,
    launcher: &Arc<dyn Launcher>,
) -> Arc<ProviderRegistry> {
    let configuration = store.configuration();
    let credentials = AppCredentials::new(Arc::clone(store), secrets.clone());
    Arc::new(ProviderRegistry::new(
        configuration.catalog(),
        Arc::new(credentials),
        Arc::clone(launcher),
        configuration.provider_options(),
    ))
}

impl MergeTracker {
    /// Opens the store at `path`. Legacy plain-text secrets are moved into `secrets`.
    pub fn open(
        path: impl Into<PathBuf>,
        secrets: SecretsManager,
        launcher: Arc<dyn Launcher>,
    ) -> Result<Self, StartupError> {
        let OpenedStore {
            store,
            legacy_secrets,
        } = MergeStore::open(path)?;
        if let Some(legacy) = legacy_secrets {
            match secrets.import_legacy(&legacy) {
                Ok(()) => info!("Moved legacy credentials into the keyring"),
                Err(err) => warn!("Failed to move legacy credentials into the keyring: {}", err),
            }
        }
        Ok(Self::with_store(store, secrets, launcher))
    }

    pub fn with_store(store: MergeStore, secrets: SecretsManager, launcher: Arc<dyn Launcher>) -> Self {
        for warning in store.configuration().identifier_warnings() {
            warn!("{}", warning);
        }
        let store = Arc::new(store);
        let registry = build_registry(&store, &secrets, &launcher);
        Self {
            store,
            secrets,
            launcher,
            registry: RwLock::new(registry),
            filter: FilterEngine::default(),
            tasks: TaskRunner::default(),
            auto_save: AutoSaveTimer::new(),
        }
    }

    pub fn store(&self) -> &Arc<MergeStore> {
        &self.store
    }

    pub fn secrets(&self) -> &SecretsManager {
        &self.secrets
    }

    pub fn tasks(&self) -> &TaskRunner {
        &self.tasks
    }

    pub fn registry(&self) -> Arc<ProviderRegistry> {
        let registry = self
            .registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*registry)
    }

    /// Applies a configuration change and rebuilds the provider registry from it.
    pub fn update_configuration(&self, update: impl FnOnce(&mut RootConfiguration)) {
        self.store.update_configuration(|configuration| {
            update(configuration);
            *configuration = configuration.clone().normalize();
        });
        for warning in self.store.configuration().identifier_warnings() {
            warn!("{}", warning);
        }
        let registry = build_registry(&self.store, &self.secrets, &self.launcher);
        *self
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = registry;
        info!("Provider configuration reloaded");
    }

    /// Stores a secret. Cached provider clients pick it up on their next call.
    pub fn set_secret(&self, key: SecretKey, value: &str) -> Result<(), SecretsError> {
        self.secrets.set(key, value)
    }

    pub fn create_merge_item(&self) -> MergeItem {
        self.store.create_merge_item()
    }

    pub fn delete_merge_item(&self, item_id: u64) -> Result<MergeItem, StoreError> {
        self.store.delete_merge_item(item_id)
    }

    pub fn create_merge_target(&self, item_id: u64) -> Result<MergeTarget, StoreError> {
        self.store.create_merge_target(item_id)
    }

    pub fn delete_merge_target(&self, item_id: u64, target_id: u64) -> Result<MergeTarget, StoreError> {
        self.store.delete_merge_target(item_id, target_id)
    }

    pub fn set_original(&self, item_id: u64, target_id: u64, is_original: bool) -> Result<(), StoreError> {
        self.store.set_original(item_id, target_id, is_original)
    }

    /// Updates a target's work-item id, then tries to name a still unnamed item after it.
    pub async fn set_work_item_id(
        &self,
        item_id: u64,
        target_id: u64,
        work_item_id: &str,
    ) -> Result<Option<TaskOutcome<String>>, StoreError> {
        let value = work_item_id.trim().to_string();
        self.store
            .update_target(item_id, target_id, |target| target.work_item_id = value)?;
        Ok(self.generate_name(item_id, target_id).await)
    }

    /// Renames an item still called "New Merge Item" after the title of its original work item.
    ///
    /// `None` when the item does not qualify for auto naming.
    pub async fn generate_name(&self, item_id: u64, target_id: u64) -> Option<TaskOutcome<String>> {
        let item = self.store.item(item_id)?;
        let target = item.target(target_id)?;
        if !item.has_default_name() || !target.is_original || !target.has_work_item() {
            return None;
        }
        let registry = self.registry();
        let server = target
            .effective_work_item_server(registry.catalog())?
            .to_string();
        let work_item_id = target.work_item_id.clone();

        let sink = ItemErrorSink::new(Arc::clone(&self.store), item_id);
        let outcome = self
            .tasks
            .perform("retrieving the work item name", Some(&sink), async move {
                registry.work_item_title(&server, &work_item_id).await
            })
            .await;

        if let Some(title) = outcome.value.as_ref().filter(|title| !title.trim().is_empty()) {
            let title = title.trim().to_string();
            let _ = self.store.update_item(item_id, |item| {
                if item.has_default_name() {
                    item.name = title;
                }
            });
        }
        Some(outcome)
    }

    fn work_item_lookup(&self, item_id: u64, target_id: u64) -> Result<(String, String), ActionError> {
        let target = self.target(item_id, target_id)?;
        if !target.has_work_item() {
            return Err(ActionError::MissingId("work item id"));
        }
        let registry = self.registry();
        let server = target
            .effective_work_item_server(registry.catalog())
            .ok_or(ActionError::NoServer("work item"))?
            .to_string();
        Ok((server, target.work_item_id))
    }

    fn changeset_lookup(&self, item_id: u64, target_id: u64) -> Result<(String, String), ActionError> {
        let target = self.target(item_id, target_id)?;
        if !target.has_changeset() {
            return Err(ActionError::MissingId("changeset id"));
        }
        let registry = self.registry();
        let server = target
            .effective_source_control_server(registry.catalog())
            .ok_or(ActionError::NoServer("source control"))?
            .to_string();
        Ok((server, target.changeset_id))
    }

    fn target(&self, item_id: u64, target_id: u64) -> Result<MergeTarget, StoreError> {
        let item = self.store.item(item_id).ok_or(StoreError::UnknownItem(item_id))?;
        item.target(target_id)
            .cloned()
            .ok_or(StoreError::UnknownTarget {
                item: item_id,
                target: target_id,
            })
    }

    /// Opens a target's work item in the browser. Failures land on the item's last error.
    pub async fn open_work_item(&self, item_id: u64, target_id: u64) -> TaskOutcome<String> {
        let lookup = self.work_item_lookup(item_id, target_id);
        let registry = self.registry();
        let sink = ItemErrorSink::new(Arc::clone(&self.store), item_id);
        self.tasks
            .perform("opening work item", Some(&sink), async move {
                let (server, id) = lookup?;
                Ok::<_, ActionError>(registry.open_work_item(&server, &id).await?)
            })
            .await
    }

    /// Opens every changeset or commit of a target.
    pub async fn open_changesets(&self, item_id: u64, target_id: u64) -> TaskOutcome<Vec<String>> {
        let lookup = self.changeset_lookup(item_id, target_id);
        let registry = self.registry();
        let sink = ItemErrorSink::new(Arc::clone(&self.store), item_id);
        self.tasks
            .perform("opening changeset", Some(&sink), async move {
                let (server, field) = lookup?;
                Ok::<_, ActionError>(registry.open_changesets(&server, &field).await?)
            })
            .await
    }

    /// Work-item URL for copying.
    pub async fn work_item_url(&self, item_id: u64, target_id: u64) -> TaskOutcome<String> {
        let lookup = self.work_item_lookup(item_id, target_id);
        let registry = self.registry();
        let sink = ItemErrorSink::new(Arc::clone(&self.store), item_id);
        self.tasks
            .perform("copying the work item URL", Some(&sink), async move {
                let (server, id) = lookup?;
                Ok::<_, ActionError>(registry.work_item_url(&server, &id).await?)
            })
            .await
    }

    /// Changeset URLs for copying, in field order.
    pub async fn changeset_urls(&self, item_id: u64, target_id: u64) -> TaskOutcome<Vec<String>> {
        let lookup = self.changeset_lookup(item_id, target_id);
        let registry = self.registry();
        let sink = ItemErrorSink::new(Arc::clone(&self.store), item_id);
        self.tasks
            .perform("copying the changeset URL", Some(&sink), async move {
                let (server, field) = lookup?;
                Ok::<_, ActionError>(registry.changeset_urls(&server, &field).await?)
            })
            .await
    }

    /// Opens an arbitrary item by id; `server` defaults to the first server of the family.
    pub async fn go_to_item(
        &self,
        item_type: ItemType,
        server: Option<&str>,
        id: &str,
    ) -> TaskOutcome<Vec<String>> {
        let registry = self.registry();
        let (family, label, context) = match item_type {
            ItemType::WorkItem => (ServerFamily::WorkItems, "work item", "opening work item"),
            ItemType::Changeset => (ServerFamily::SourceControl, "source control", "opening changeset"),
        };
        let server = server
            .map(str::to_string)
            .or_else(|| registry.catalog().default_server(family).map(str::to_string))
            .ok_or(ActionError::NoServer(label));
        let id = id.trim().to_string();
        self.tasks
            .perform(context, None, async move {
                let server = server?;
                Ok::<_, ActionError>(registry.open_item(item_type, &server, &id).await?)
            })
            .await
    }

    pub fn checkin_note(&self, item_id: u64, target_id: u64) -> Result<String, StoreError> {
        let template = self.store.configuration().check_in_message;
        let item = self.store.item(item_id).ok_or(StoreError::UnknownItem(item_id))?;
        item.checkin_note(target_id, &template)
            .ok_or(StoreError::UnknownTarget {
                item: item_id,
                target: target_id,
            })
    }

    /// Visible items for the persisted filter state.
    pub fn filtered_items(&self) -> FilterResult {
        let query = FilterQuery::from_configuration(&self.store.configuration());
        let result = self.filter.filter(&self.store.items(), &query);
        self.store.mark_visible(&result.ids());
        result
    }

    pub fn set_filter(&self, text: &str, not_completed_only: bool) -> FilterResult {
        self.store.update_configuration(|configuration| {
            configuration.filter = text.to_string();
            configuration.not_completed_filter = not_completed_only;
        });
        self.filtered_items()
    }

    pub fn clear_filters(&self) -> FilterResult {
        self.store
            .update_configuration(RootConfiguration::clear_filters);
        self.filtered_items()
    }

    pub fn save(&self) -> Result<(), StoreError> {
        self.store.save()?;
        self.auto_save.mark_saved();
        Ok(())
    }

    /// Final save at shutdown. Errors are logged, not returned.
    pub fn save_on_close(&self) {
        match self.save() {
            Ok(()) => info!("Saved store on close"),
            Err(err) => warn!("Failed to save store on close: {}", err),
        }
    }

    /// Background loop saving the store whenever the configured interval has elapsed.
    pub fn spawn_auto_save(self: &Arc<Self>) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(AUTO_SAVE_TICK).await;
                let interval = tracker.store.configuration().auto_save_interval();
                let _ = tracker.auto_save.tick(&tracker.store, interval);
            }
        })
    }
}
