//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save through a rename are still picked up. Only validated
//! configurations whose text actually changed are forwarded; a broken edit is
//! logged and the running configuration stays in place.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{parse_config, ConfigError};
use crate::config::schema::PipelineConfig;

/// Watches one configuration file and forwards validated updates.
pub struct ConfigWatcher {
    path: PathBuf,
    file_name: Option<OsString>,
    last_text: Mutex<Option<String>>,
    update_tx: mpsc::UnboundedSender<PipelineConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for reloaded configurations.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<PipelineConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            file_name: path.file_name().map(|n| n.to_os_string()),
            // The text loaded at startup counts as already applied.
            last_text: Mutex::new(std::fs::read_to_string(path).ok()),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if (event.kind.is_modify() || event.kind.is_create()) && self.concerns(&event) {
                        self.reload();
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }

    fn concerns(&self, event: &Event) -> bool {
        event
            .paths
            .iter()
            .any(|p| p.file_name().map(|n| n.to_os_string()) == self.file_name)
    }

    /// Re-read the file and forward it when it changed and validates.
    fn reload(&self) {
        match self.check() {
            Ok(Some(config)) => {
                tracing::info!(path = ?self.path, candidates = config.endpoints.candidates.len(), "Config reloaded");
                let _ = self.update_tx.send(config);
            }
            Ok(None) => tracing::trace!(path = ?self.path, "Config text unchanged"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            }
        }
    }

    fn check(&self) -> Result<Option<PipelineConfig>, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(ConfigError::Io)?;
        let mut last = self.last_text.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_deref() == Some(text.as_str()) {
            return Ok(None);
        }
        let config = parse_config(&text)?;
        *last = Some(text);
        Ok(Some(config))
    }
}
