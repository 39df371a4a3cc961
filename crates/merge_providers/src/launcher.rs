//! Hands resolved URLs to the operating system's default handler.

use std::sync::Mutex;

use tracing::info;

use crate::error::{ProviderError, Result};

pub trait Launcher: Send + Sync {
    fn launch(&self, url: &str) -> Result<()>;
}

/// Opens URLs with the desktop's registered browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, url: &str) -> Result<()> {
        info!("opening {}", url);
        open::that(url).map_err(|err| ProviderError::Launch {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

/// Records launched URLs instead of opening them. Used by headless hosts and tests.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    opened: Mutex<Vec<String>>,
}

impl RecordingLauncher {
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, url: &str) -> Result<()> {
        let mut opened = self
            .opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        opened.push(url.to_string());
        Ok(())
    }
}
