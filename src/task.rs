//! Runs fallible provider and storage operations without letting failures escape.
//!
//! Each task clears the previous advisory message, raises the busy indicator for as long as
//! it runs and turns any error or panic into text written to an [`ErrorSink`].

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::redact_log_details;
use crate::store::MergeStore;

/// Counts operations in flight. Busy while the count is non-zero.
#[derive(Clone, Debug, Default)]
pub struct BusyIndicator {
    in_flight: Arc<AtomicUsize>,
}

impl BusyIndicator {
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn enter(&self) -> BusyGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        BusyGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

/// Releases its busy slot on drop, whichever way the task ends.
#[must_use]
pub struct BusyGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Where advisory failure text goes.
pub trait ErrorSink: Send + Sync {
    fn clear(&self);
    fn report(&self, message: &str);
}

/// Writes into a merge item's last-error text.
pub struct ItemErrorSink {
    store: Arc<MergeStore>,
    item_id: u64,
}

impl ItemErrorSink {
    pub fn new(store: Arc<MergeStore>, item_id: u64) -> Self {
        Self { store, item_id }
    }
}

impl ErrorSink for ItemErrorSink {
    fn clear(&self) {
        self.store.set_last_error(self.item_id, None);
    }

    fn report(&self, message: &str) {
        self.store.set_last_error(self.item_id, Some(message.to_string()));
    }
}

/// Keeps the last message in memory, for flows without an owning merge item.
#[derive(Debug, Default)]
pub struct MessageSink {
    message: Mutex<Option<String>>,
}

impl MessageSink {
    pub fn message(&self) -> Option<String> {
        self.message
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ErrorSink for MessageSink {
    fn clear(&self) {
        *self.message.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    fn report(&self, message: &str) {
        *self.message.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some(message.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome<T> {
    pub value: Option<T>,
    /// Advisory text when the task failed.
    pub message: Option<String>,
}

impl<T> TaskOutcome<T> {
    fn success(value: T) -> Self {
        Self {
            value: Some(value),
            message: None,
        }
    }

    fn failure(message: String) -> Self {
        Self {
            value: None,
            message: Some(message),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.message.is_none()
    }
}

/// `"There was an error {context}.\n\n{detail}"`
pub fn failure_message(context: &str, detail: &str) -> String {
    format!("There was an error {context}.\n\n{detail}")
}

fn panic_detail(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("the operation panicked: {text}")
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("the operation panicked: {text}")
    } else {
        "the operation panicked".to_string()
    }
}

/// Executes tasks on the tokio runtime and owns the busy indicator they share.
#[derive(Clone, Debug, Default)]
pub struct TaskRunner {
    busy: BusyIndicator,
}

impl TaskRunner {
    pub fn busy(&self) -> &BusyIndicator {
        &self.busy
    }

    /// Runs `action` to completion. `context` completes the sentence "There was an error ...".
    pub async fn perform<T, E, F>(
        &self,
        context: &str,
        sink: Option<&dyn ErrorSink>,
        action: F,
    ) -> TaskOutcome<T>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        if let Some(sink) = sink {
            sink.clear();
        }
        let _busy = self.busy.enter();

        let detail = match tokio::spawn(action).await {
            Ok(Ok(value)) => return TaskOutcome::success(value),
            Ok(Err(err)) => err.to_string(),
            Err(join_error) if join_error.is_panic() => panic_detail(join_error.into_panic()),
            Err(join_error) => join_error.to_string(),
        };

        warn!("Task failed while {}", context);
        debug!("Task failure details: {}", redact_log_details(&detail));
        let message = failure_message(context, &detail);
        if let Some(sink) = sink {
            sink.report(&message);
        }
        TaskOutcome::failure(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merge_providers::ProviderError;
    use std::time::Duration;

    #[tokio::test]
    async fn success_returns_value_and_clears_previous_message() {
        let runner = TaskRunner::default();
        let sink = MessageSink::default();
        sink.report("stale");

        let outcome = runner
            .perform("opening work item", Some(&sink), async { Ok::<_, ProviderError>(7) })
            .await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.value, Some(7));
        assert_eq!(sink.message(), None);
        assert!(!runner.busy().is_busy());
    }

    #[tokio::test]
    async fn failure_is_reported_with_context() {
        let runner = TaskRunner::default();
        let sink = MessageSink::default();

        let outcome = runner
            .perform("opening work item", Some(&sink), async {
                Err::<(), _>(ProviderError::format("work item id must be an integer, got 'x'"))
            })
            .await;

        assert!(!outcome.succeeded());
        let message = outcome.message.unwrap();
        assert!(message.starts_with("There was an error opening work item.\n\n"));
        assert!(message.contains("work item id must be an integer"));
        assert_eq!(sink.message(), Some(message));
        assert!(!runner.busy().is_busy());
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let runner = TaskRunner::default();
        let outcome = runner
            .perform("opening changeset", None, async {
                if true {
                    panic!("boom");
                }
                Ok::<(), ProviderError>(())
            })
            .await;

        assert!(!outcome.succeeded());
        assert!(outcome.message.unwrap().contains("boom"));
        assert!(!runner.busy().is_busy());
    }

    #[tokio::test]
    async fn busy_while_task_is_in_flight() {
        let runner = TaskRunner::default();
        let busy = runner.busy().clone();
        let (release, wait) = tokio::sync::oneshot::channel::<()>();

        let task = {
            let runner = runner.clone();
            tokio::spawn(async move {
                runner
                    .perform("saving", None, async move {
                        let _ = wait.await;
                        Ok::<(), ProviderError>(())
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(busy.is_busy());
        release.send(()).unwrap();
        assert!(task.await.unwrap().succeeded());
        assert!(!busy.is_busy());
    }

    #[test]
    fn busy_guard_nests() {
        let busy = BusyIndicator::default();
        let outer = busy.enter();
        let inner = busy.enter();
        assert_eq!(busy.in_flight(), 2);
        drop(inner);
        assert!(busy.is_busy());
        drop(outer);
        assert!(!busy.is_busy());
    }
}
