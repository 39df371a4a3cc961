use std::sync::Arc;

use log::{error, info, warn};
use merge_providers::{Launcher, SystemLauncher};

pub mod app;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod secrets;
pub mod store;
pub mod task;
pub mod timer;

pub use app::MergeTracker;
pub use error::{ActionError, QueryError, SecretsError, StartupError, StoreError};
pub use model::{Completion, MergeItem, MergeTarget};
pub use store::MergeStore;

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_text(value: &str, limit: usize) -> String {
    let trimmed = value.trim();
    if trimmed.chars().count() <= limit {
        return trimmed.to_string();
    }
    if limit <= 1 {
        return "…".to_string();
    }
    let mut truncated: String = trimmed.chars().take(limit - 1).collect();
    truncated.push('…');
    truncated
}

/// Shortens error details for logs and hides anything that looks like a credential.
pub fn redact_log_details(value: &str) -> String {
    let collapsed = collapse_whitespace(value);
    let category = collapsed
        .split(':')
        .next()
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .unwrap_or("error");
    let lowered = collapsed.to_lowercase();
    let has_sensitive_hint = [
        "token",
        "authorization",
        "bearer",
        "basic ",
        "password",
        "pat=",
        "set-cookie",
    ]
    .iter()
    .any(|hint| lowered.contains(hint));

    if has_sensitive_hint {
        return format!(
            "{}: <redacted-sensitive-details>",
            truncate_text(category, 64)
        );
    }

    truncate_text(&collapsed, 180)
}

/// Runs the tracker until interrupted, saving on the way out.
pub fn run() -> Result<(), StartupError> {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .try_init();

    info!("Starting merge tracker");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;

    let path = MergeStore::default_path()?;
    let secrets = secrets::SecretsManager::keyring(secrets::KEYRING_SERVICE);
    let launcher: Arc<dyn Launcher> = Arc::new(SystemLauncher);
    let tracker = Arc::new(MergeTracker::open(&path, secrets, launcher)?);
    info!(
        "Loaded {} merge item(s) from {}",
        tracker.store().len(),
        path.display()
    );

    runtime.block_on(async {
        let auto_save = tracker.spawn_auto_save();
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", err);
        }
        auto_save.abort();
        if tracker.tasks().busy().is_busy() {
            warn!(
                "Shutting down with {} task(s) in flight",
                tracker.tasks().busy().in_flight()
            );
        }
    });

    tracker.save_on_close();
    info!("Merge tracker stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_credential_details() {
        let redacted = redact_log_details("authentication error: Authorization: Basic dXNlcjpwYXNz");
        assert_eq!(redacted, "authentication error: <redacted-sensitive-details>");
    }

    #[test]
    fn collapses_and_truncates_plain_details() {
        assert_eq!(
            redact_log_details("not found:\n\n  work item   42"),
            "not found: work item 42"
        );
        let long = "x".repeat(500);
        let redacted = redact_log_details(&long);
        assert_eq!(redacted.chars().count(), 180);
        assert!(redacted.ends_with('…'));
    }

    #[test]
    fn empty_category_falls_back_to_error() {
        assert_eq!(
            redact_log_details(": password rejected"),
            "error: <redacted-sensitive-details>"
        );
    }
}
