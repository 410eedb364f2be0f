//! Plugin hot reload via file system watching
//!
//! Only the user folders are watched. Each debounced change is routed to
//! the loader whose folder contains the path.

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind, Debouncer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::discovery::is_plugin_file;
use super::loader::{Reload, ReloadOutcome};
use crate::application::errors::BotError;

/// Debounced watcher over a set of folders
pub struct PluginWatcher {
    debouncer: Debouncer<RecommendedWatcher>,
    changes: mpsc::UnboundedReceiver<PathBuf>,
    watched_dirs: Vec<PathBuf>,
}

impl PluginWatcher {
    pub fn new(dirs: &[PathBuf], debounce: Duration) -> Result<Self, BotError> {
        let (tx, changes) = mpsc::unbounded_channel();

        let debouncer = new_debouncer(debounce, move |result: Result<Vec<DebouncedEvent>, notify::Error>| {
            match result {
                Ok(events) => {
                    for event in events {
                        if !matches!(event.kind, DebouncedEventKind::Any) || !is_plugin_file(&event.path) {
                            continue;
                        }
                        if let Err(e) = tx.send(event.path) {
                            error!("Failed to forward plugin change: {}", e);
                        }
                    }
                }
                Err(e) => error!("File watcher error: {}", e),
            }
        })
        .map_err(|e| BotError::Internal(format!("Failed to create file watcher: {}", e)))?;

        let mut watcher = Self {
            debouncer,
            changes,
            watched_dirs: Vec::new(),
        };
        for dir in dirs {
            match watcher.watch_directory(dir) {
                Ok(()) => watcher.watched_dirs.push(dir.clone()),
                Err(e) => warn!("Could not watch {}: {}", dir.display(), e),
            }
        }
        Ok(watcher)
    }

    fn watch_directory(&mut self, path: &Path) -> Result<(), BotError> {
        if !path.exists() {
            std::fs::create_dir_all(path)
                .map_err(|e| BotError::Internal(format!("Failed to create {}: {}", path.display(), e)))?;
        }
        self.debouncer
            .watcher()
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| BotError::Internal(format!("Failed to watch directory: {}", e)))?;
        info!("Watching plugin folder: {}", path.display());
        Ok(())
    }

    /// Next changed plugin file
    pub async fn next_change(&mut self) -> Option<PathBuf> {
        self.changes.recv().await
    }

    pub fn watched_dirs(&self) -> &[PathBuf] {
        &self.watched_dirs
    }
}

/// Background task feeding watcher changes into the loaders
pub struct HotReloader {
    task: JoinHandle<()>,
    watched_dirs: Vec<PathBuf>,
}

impl HotReloader {
    pub fn start(loaders: Vec<Arc<dyn Reload>>, debounce: Duration) -> Result<Self, BotError> {
        let dirs: Vec<PathBuf> = loaders.iter().map(|l| l.watched_root()).collect();
        let mut watcher = PluginWatcher::new(&dirs, debounce)?;
        let watched_dirs = watcher.watched_dirs().to_vec();

        let task = tokio::spawn(async move {
            while let Some(path) = watcher.next_change().await {
                route(&loaders, &path).await;
            }
            debug!("Plugin watcher channel closed");
        });

        Ok(Self { task, watched_dirs })
    }

    pub fn watched_dirs(&self) -> &[PathBuf] {
        &self.watched_dirs
    }

    pub fn stop(self) {
        self.task.abort();
        info!("Hot reload stopped");
    }
}

/// Hand a changed path to every loader; the ones that do not own it ignore it
pub async fn route(loaders: &[Arc<dyn Reload>], path: &Path) -> Vec<ReloadOutcome> {
    let mut outcomes = Vec::new();
    for loader in loaders {
        let outcome = loader.reload_file(path).await;
        if outcome != ReloadOutcome::Ignored {
            debug!("{} -> {:?}", path.display(), outcome);
            outcomes.push(outcome);
        }
    }
    outcomes
}
