//! Periodic auto-save bookkeeping.

use std::sync::Mutex;
use std::time::Duration;

use log::{debug, warn};

use crate::error::StoreError;
use crate::store::MergeStore;

/// Decides when the next periodic save is due.
pub struct AutoSaveTimer {
    last_save_at: Mutex<Option<u64>>,
}

impl Default for AutoSaveTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoSaveTimer {
    /// The first save becomes due one interval after creation.
    pub fn new() -> Self {
        Self {
            last_save_at: Mutex::new(Some(Self::now_secs())),
        }
    }

    fn now_secs() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    }

    pub fn mark_saved(&self) {
        *self.last_save_at.lock().unwrap_or_else(|p| p.into_inner()) = Some(Self::now_secs());
    }

    /// True once `interval` has passed since the last save; restarts the interval when due.
    pub fn check_save_due(&self, interval: Duration) -> bool {
        let interval_secs = interval.as_secs();
        if interval_secs == 0 {
            return false;
        }

        let now = Self::now_secs();
        let mut last_save = self.last_save_at.lock().unwrap_or_else(|p| p.into_inner());
        let last = last_save.unwrap_or(now);
        if now.saturating_sub(last) < interval_secs {
            return false;
        }
        *last_save = Some(now);
        true
    }

    /// One auto-save step: saves a dirty store when the interval has elapsed.
    ///
    /// Returns whether a save happened.
    pub fn tick(&self, store: &MergeStore, interval: Option<Duration>) -> Result<bool, StoreError> {
        let Some(interval) = interval else {
            return Ok(false);
        };
        if !self.check_save_due(interval) {
            return Ok(false);
        }
        match store.save_if_dirty() {
            Ok(saved) => {
                if saved {
                    debug!("Auto-saved store to {}", store.path().display());
                }
                Ok(saved)
            }
            Err(err) => {
                warn!("Auto-save failed: {}", err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_store(name: &str) -> MergeStore {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = env::temp_dir().join(format!("merge-tracker-autosave-{name}-{nanos}/merge-tracker.json"));
        MergeStore::open(path).expect("open").store
    }

    fn cleanup(store: &MergeStore) {
        if let Some(parent) = store.path().parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn save_not_due_right_after_creation() {
        let timer = AutoSaveTimer::new();
        assert!(!timer.check_save_due(Duration::from_secs(60)));
    }

    #[test]
    fn due_after_interval_then_restarts() {
        let timer = AutoSaveTimer::new();
        *timer.last_save_at.lock().unwrap() = Some(0);

        assert!(timer.check_save_due(Duration::from_secs(1)));
        assert!(!timer.check_save_due(Duration::from_secs(60)));
    }

    #[test]
    fn zero_interval_is_never_due() {
        let timer = AutoSaveTimer::new();
        *timer.last_save_at.lock().unwrap() = Some(0);
        assert!(!timer.check_save_due(Duration::ZERO));
    }

    #[test]
    fn tick_saves_only_dirty_store() {
        let store = temp_store("dirty");
        let timer = AutoSaveTimer::new();

        *timer.last_save_at.lock().unwrap() = Some(0);
        assert!(!timer.tick(&store, Some(Duration::from_secs(1))).unwrap());
        assert!(!store.path().exists());

        store.create_merge_item();
        *timer.last_save_at.lock().unwrap() = Some(0);
        assert!(timer.tick(&store, Some(Duration::from_secs(1))).unwrap());
        assert!(store.path().exists());
        assert!(!store.is_dirty());
        cleanup(&store);
    }

    #[test]
    fn disabled_interval_never_saves() {
        let store = temp_store("disabled");
        store.create_merge_item();
        let timer = AutoSaveTimer::new();
        *timer.last_save_at.lock().unwrap() = Some(0);
        assert!(!timer.tick(&store, None).unwrap());
        assert!(store.is_dirty());
    }
}
