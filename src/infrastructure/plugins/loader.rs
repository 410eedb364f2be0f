//! Plugin loaders
//!
//! A load pass discovers both folders of one kind, prepares every file
//! concurrently (read manifest, resolve factory, construct handler) and then
//! registers the prepared handlers one by one in listing order. A bad file is
//! logged and skipped; it never aborts the pass.

use async_trait::async_trait;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::catalog::{PluginCatalog, PluginOptions};
use super::discovery::{self, DiscoveredFile, PluginRoots};
use super::manifest::PluginManifest;
use crate::application::errors::{BotError, LoadError};
use crate::application::managers::{CommandManager, EventManager, ModuleManager};
use crate::domain::entities::IntentSet;
use crate::domain::traits::Client;
use crate::infrastructure::storage::SlashCommandStore;
use crate::plugins::trait_def::{CommandHandler, EventHandler, ModuleInstance, PluginKind};

/// One file that could not be loaded
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub is_core: bool,
    pub error: String,
}

/// Result of a load pass
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Registered names, in registration order
    pub loaded: Vec<String>,
    /// Disabled files
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<LoadFailure>,
}

impl LoadReport {
    /// Failures among the built-in files
    pub fn core_failures(&self) -> Vec<&LoadFailure> {
        self.failed.iter().filter(|f| f.is_core).collect()
    }
}

/// What a single-file reload did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Added(String),
    Replaced(String),
    Removed,
    /// The old entry, if any, stays registered
    Failed(String),
    /// Not a plugin file of this loader
    Ignored,
}

#[async_trait]
pub trait Loader: Send + Sync {
    type Prepared: Send + 'static;

    fn kind(&self) -> PluginKind;

    fn roots(&self) -> &PluginRoots;

    /// Read and construct without touching any registry
    async fn prepare(&self, file: &DiscoveredFile) -> Result<Self::Prepared, LoadError>;

    /// Registry checks a prepared handler must pass before an existing entry
    /// is retired for it
    fn validate(&self, _file: &DiscoveredFile, _prepared: &Self::Prepared) -> Result<(), BotError> {
        Ok(())
    }

    /// Register a prepared handler, returning the name it was registered as
    fn commit(&self, file: &DiscoveredFile, prepared: Self::Prepared) -> Result<String, BotError>;

    /// Unregister whatever was loaded from `file`
    async fn retire(&self, file: &DiscoveredFile) -> bool;

    /// Built-in files first, then user files
    async fn discover(&self) -> Vec<DiscoveredFile> {
        let grouped = self.kind().grouped();
        let mut files = discovery::discover(&self.roots().builtin, grouped, true).await;
        files.extend(discovery::discover(&self.roots().user, grouped, false).await);
        files
    }

    async fn load(&self) -> LoadReport {
        let kind = self.kind();
        let files = self.discover().await;
        let prepared = join_all(files.iter().map(|file| self.prepare(file))).await;

        let mut report = LoadReport::default();
        for (file, result) in files.iter().zip(prepared) {
            let outcome = match result {
                Ok(prepared) => self.commit(file, prepared),
                Err(LoadError::Disabled { path }) => {
                    debug!("Skipping disabled {} {}", kind, path.display());
                    report.skipped.push(path);
                    continue;
                }
                Err(e) => Err(e.into()),
            };
            match outcome {
                Ok(name) => {
                    debug!("Loaded {} '{}' from {}", kind, name, file.path.display());
                    report.loaded.push(name);
                }
                Err(e) => {
                    error!("Failed to load {} {}: {}", kind, file.path.display(), e);
                    report.failed.push(LoadFailure {
                        path: file.path.clone(),
                        is_core: file.is_core,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Loaded {} {}(s), {} skipped, {} failed",
            report.loaded.len(),
            kind,
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    /// Called after a reload changed the registry
    async fn reloaded(&self, _outcome: &ReloadOutcome) {}

    /// Re-read one user file and swap its registry entry
    async fn reload(&self, path: &Path) -> ReloadOutcome {
        let outcome = self.apply_reload(path).await;
        if matches!(
            outcome,
            ReloadOutcome::Added(_) | ReloadOutcome::Replaced(_) | ReloadOutcome::Removed
        ) {
            self.reloaded(&outcome).await;
        }
        outcome
    }

    async fn apply_reload(&self, path: &Path) -> ReloadOutcome {
        let kind = self.kind();
        let Some(relative) = self.roots().user_relative(path) else {
            return ReloadOutcome::Ignored;
        };
        let Some(file) = discovery::describe(&self.roots().user, &relative, kind.grouped(), false) else {
            return ReloadOutcome::Ignored;
        };

        if tokio::fs::metadata(&file.path).await.is_err() {
            return if self.retire(&file).await {
                info!("Removed {} {}", kind, file.path.display());
                ReloadOutcome::Removed
            } else {
                ReloadOutcome::Ignored
            };
        }

        let prepared = match self.prepare(&file).await {
            Ok(prepared) => prepared,
            Err(LoadError::Disabled { .. }) => {
                return if self.retire(&file).await {
                    info!("Disabled {} {}", kind, file.path.display());
                    ReloadOutcome::Removed
                } else {
                    ReloadOutcome::Ignored
                };
            }
            Err(e) => {
                error!("Failed to reload {} {}: {}", kind, file.path.display(), e);
                return ReloadOutcome::Failed(e.to_string());
            }
        };

        if let Err(e) = self.validate(&file, &prepared) {
            error!("Rejected reload of {} {}: {}", kind, file.path.display(), e);
            return ReloadOutcome::Failed(e.to_string());
        }

        let existed = self.retire(&file).await;
        match self.commit(&file, prepared) {
            Ok(name) if existed => {
                info!("Reloaded {} '{}'", kind, name);
                ReloadOutcome::Replaced(name)
            }
            Ok(name) => {
                info!("Loaded new {} '{}'", kind, name);
                ReloadOutcome::Added(name)
            }
            Err(e) => {
                error!("Failed to register reloaded {} {}: {}", kind, file.path.display(), e);
                ReloadOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Object-safe view of a loader for the hot reloader
#[async_trait]
pub trait Reload: Send + Sync {
    fn watched_root(&self) -> PathBuf;

    async fn reload_file(&self, path: &Path) -> ReloadOutcome;
}

#[async_trait]
impl<L: Loader> Reload for L {
    fn watched_root(&self) -> PathBuf {
        self.roots().user.clone()
    }

    async fn reload_file(&self, path: &Path) -> ReloadOutcome {
        self.reload(path).await
    }
}

/// Manifest, factory key and factory options for one file
async fn read_plugin(file: &DiscoveredFile) -> Result<(String, PluginOptions), LoadError> {
    let manifest = PluginManifest::read(&file.path).await?;
    if !manifest.enabled {
        return Err(LoadError::Disabled {
            path: file.path.clone(),
        });
    }
    let key = manifest.factory_key(&file.name);
    let options = PluginOptions::new(file.name.clone()).with_values(manifest.options);
    Ok((key, options))
}

struct SlashSync {
    store: SlashCommandStore,
    client: Arc<dyn Client>,
}

pub struct CommandLoader {
    roots: PluginRoots,
    catalog: Arc<PluginCatalog>,
    manager: Arc<CommandManager>,
    slash: Option<SlashSync>,
}

impl CommandLoader {
    pub fn new(roots: PluginRoots, catalog: Arc<PluginCatalog>, manager: Arc<CommandManager>) -> Self {
        Self {
            roots,
            catalog,
            manager,
            slash: None,
        }
    }

    /// Keep the platform's slash commands and the persisted registry in step
    /// with this loader's registry
    pub fn with_slash_sync(mut self, store: SlashCommandStore, client: Arc<dyn Client>) -> Self {
        self.slash = Some(SlashSync { store, client });
        self
    }

    /// Push the current slash definitions. Failures are logged only.
    pub async fn sync_slash(&self) {
        let Some(slash) = &self.slash else {
            return;
        };
        match slash
            .store
            .sync(slash.client.as_ref(), &self.manager.slash_definitions())
            .await
        {
            Ok(summary) => debug!("Slash command sync: {:?}", summary),
            Err(e) => warn!("Slash command sync failed: {}", e),
        }
    }
}

#[async_trait]
impl Loader for CommandLoader {
    type Prepared = CommandHandler;

    fn kind(&self) -> PluginKind {
        PluginKind::Command
    }

    fn roots(&self) -> &PluginRoots {
        &self.roots
    }

    async fn prepare(&self, file: &DiscoveredFile) -> Result<CommandHandler, LoadError> {
        let (key, options) = read_plugin(file).await?;
        self.catalog.build_command(&key, &options)
    }

    fn validate(&self, file: &DiscoveredFile, handler: &CommandHandler) -> Result<(), BotError> {
        self.manager.check(handler, &file.source(), file.is_core).map(|_| ())
    }

    fn commit(&self, file: &DiscoveredFile, handler: CommandHandler) -> Result<String, BotError> {
        self.manager
            .register(handler, &file.source(), &file.group, file.is_core)
            .map(|cmd| cmd.name.clone())
    }

    async fn reloaded(&self, _outcome: &ReloadOutcome) {
        self.sync_slash().await;
    }

    async fn retire(&self, file: &DiscoveredFile) -> bool {
        match self.manager.find_by_source(&file.source()) {
            Some(cmd) => self.manager.unregister(&cmd.name).await,
            None => false,
        }
    }
}

pub struct EventLoader {
    roots: PluginRoots,
    catalog: Arc<PluginCatalog>,
    manager: Arc<EventManager>,
}

impl EventLoader {
    pub fn new(roots: PluginRoots, catalog: Arc<PluginCatalog>, manager: Arc<EventManager>) -> Self {
        Self { roots, catalog, manager }
    }

    /// Intents every enabled event file needs, without constructing any
    /// handler. Unreadable files are skipped here; the full load reports them.
    pub async fn preload_intents(&self) -> IntentSet {
        let mut intents = IntentSet::new();
        for file in self.discover().await {
            let manifest = match PluginManifest::read(&file.path).await {
                Ok(m) if m.enabled => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Intent preload skipped {}: {}", file.path.display(), e);
                    continue;
                }
            };
            if let Some(declared) = self.catalog.event_intents(&manifest.factory_key(&file.name)) {
                intents.extend(declared.iter().copied());
            }
            match manifest.intents(&file.path) {
                Ok(extra) => intents.extend(extra),
                Err(e) => warn!("{}", e),
            }
        }
        debug!("Preloaded intents: {:?}", intents);
        intents
    }
}

#[async_trait]
impl Loader for EventLoader {
    type Prepared = EventHandler;

    fn kind(&self) -> PluginKind {
        PluginKind::Event
    }

    fn roots(&self) -> &PluginRoots {
        &self.roots
    }

    async fn prepare(&self, file: &DiscoveredFile) -> Result<EventHandler, LoadError> {
        let (key, options) = read_plugin(file).await?;
        let handler = self.catalog.build_event(&key, &options)?;
        if handler.is_core() != file.is_core {
            return Err(LoadError::KindMismatch {
                key,
                expected: if file.is_core { "core" } else { "custom" },
                found: handler.kind(),
            });
        }
        Ok(handler)
    }

    fn commit(&self, file: &DiscoveredFile, handler: EventHandler) -> Result<String, BotError> {
        let event = self
            .manager
            .register(handler, &file.name, &file.source(), file.is_core)?;
        self.manager.ensure_subscribed(&event.name);
        Ok(event.name.clone())
    }

    async fn retire(&self, file: &DiscoveredFile) -> bool {
        let registered = if file.is_core {
            self.manager.get_core(&file.name)
        } else {
            self.manager.get_custom(&file.name)
        };
        match registered {
            Some(event) if event.source == file.source() => {
                self.manager.unregister_partition(&file.name, file.is_core).await
            }
            _ => false,
        }
    }
}

pub struct ModuleLoader {
    roots: PluginRoots,
    catalog: Arc<PluginCatalog>,
    manager: Arc<ModuleManager>,
}

impl ModuleLoader {
    pub fn new(roots: PluginRoots, catalog: Arc<PluginCatalog>, manager: Arc<ModuleManager>) -> Self {
        Self { roots, catalog, manager }
    }
}

#[async_trait]
impl Loader for ModuleLoader {
    type Prepared = ModuleInstance;

    fn kind(&self) -> PluginKind {
        PluginKind::Module
    }

    fn roots(&self) -> &PluginRoots {
        &self.roots
    }

    async fn prepare(&self, file: &DiscoveredFile) -> Result<ModuleInstance, LoadError> {
        let (key, options) = read_plugin(file).await?;
        self.catalog.build_module(&key, &options)
    }

    fn commit(&self, file: &DiscoveredFile, instance: ModuleInstance) -> Result<String, BotError> {
        self.manager
            .register(instance, &file.name, &file.source(), &file.group, file.is_core)
            .map(|m| m.name.clone())
    }

    async fn retire(&self, file: &DiscoveredFile) -> bool {
        self.manager.unregister_source(&file.source()).await
    }
}
