//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GatewayConfig;

/// Quiet period after the last change event before the file is re-read, so a
/// half-written file is never parsed.
const DEBOUNCE: Duration = Duration::from_millis(300);

/// A watcher that monitors the configuration file for changes.
///
/// Emits fully loaded and validated configurations; a change that fails to
/// load keeps the current configuration in place.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file. Must be called from a tokio runtime context.
    ///
    /// The returned watcher handle must stay alive for events to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<()>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        let _ = event_tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        let path = self.path.clone();
        let tx = self.update_tx.clone();
        tokio::spawn(async move {
            while event_rx.recv().await.is_some() {
                // A config write usually arrives as a burst of events; absorb
                // the burst, then read once.
                loop {
                    match tokio::time::timeout(DEBOUNCE, event_rx.recv()).await {
                        Ok(Some(())) => continue,
                        _ => break,
                    }
                }

                tracing::info!(path = ?path, "Config file change detected, reloading");
                match load_config(&path) {
                    Ok(new_config) => {
                        let _ = tx.send(new_config);
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to reload config: {}. Keeping current configuration.",
                            e
                        );
                    }
                }
            }
        });

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
