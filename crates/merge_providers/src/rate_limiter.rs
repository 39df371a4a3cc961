//! Per-client request pacing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

/// Enforces a minimum interval between requests sent through one remote client.
///
/// Clones share the same clock, so every handle to a cached client paces together.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_call: Arc::new(Mutex::new(None)),
        }
    }

    /// Limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Sleeps until the cooldown since the previous request has elapsed, then stamps this one.
    pub async fn hit(&self) {
        let mut last_call = self.last_call.lock().await;
        if !self.cooldown.is_zero() {
            if let Some(wait) = (*last_call).and_then(|last| self.cooldown.checked_sub(last.elapsed())) {
                sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}
