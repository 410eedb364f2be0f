//! Core orchestrator: startup sequencing and graceful shutdown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::application::context::{Services, Settings};
use crate::application::errors::{BotError, StartupError};
use crate::application::managers::{CommandManager, EventManager, ModuleManager};
use crate::domain::traits::{Client, ClientOptions};
use crate::infrastructure::config::Config;
use crate::infrastructure::plugins::{
    CommandLoader, EventLoader, HotReloader, LoadReport, Loader, ModuleLoader, PluginCatalog, PluginRoots, Reload,
};
use crate::infrastructure::storage::SlashCommandStore;
use crate::plugins::trait_def::PluginKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    Uninitialized,
    Loading,
    Running,
    ShuttingDown,
    Terminated,
}

/// Owns the managers and the client for the lifetime of the process
pub struct Core {
    config: Config,
    catalog: Arc<PluginCatalog>,
    commands: Arc<CommandManager>,
    events: Arc<EventManager>,
    modules: Arc<ModuleManager>,
    state: RwLock<CoreState>,
    shutting_down: AtomicBool,
    services: OnceLock<Services>,
    reloader: Mutex<Option<HotReloader>>,
}

impl Core {
    pub fn new(config: Config, catalog: PluginCatalog) -> Self {
        Self {
            config,
            catalog: Arc::new(catalog),
            commands: Arc::new(CommandManager::new()),
            events: Arc::new(EventManager::new()),
            modules: Arc::new(ModuleManager::new()),
            state: RwLock::new(CoreState::Uninitialized),
            shutting_down: AtomicBool::new(false),
            services: OnceLock::new(),
            reloader: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CoreState {
        self.state.read().map(|s| *s).unwrap_or(CoreState::Terminated)
    }

    fn set_state(&self, next: CoreState) {
        if let Ok(mut state) = self.state.write() {
            debug!("Core state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    pub fn commands(&self) -> &Arc<CommandManager> {
        &self.commands
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    pub fn modules(&self) -> &Arc<ModuleManager> {
        &self.modules
    }

    /// Available once the client has been built
    pub fn services(&self) -> Option<&Services> {
        self.services.get()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn roots(&self, kind: PluginKind) -> PluginRoots {
        PluginRoots::for_kind(&self.config.paths.builtin_root(), &self.config.paths.user_root(), kind)
    }

    /// Create the plugin folders and the slash registry's parent. Failures are
    /// logged only.
    fn ensure_folders(&self) {
        let mut folders = Vec::new();
        for kind in [PluginKind::Command, PluginKind::Event, PluginKind::Module] {
            let roots = self.roots(kind);
            folders.push(roots.builtin);
            folders.push(roots.user);
        }
        if let Some(parent) = self.config.paths.slash_registry_path().parent() {
            folders.push(parent.to_path_buf());
        }
        for folder in folders {
            if let Err(e) = std::fs::create_dir_all(&folder) {
                warn!("Could not create {}: {}", folder.display(), e);
            }
        }
    }

    /// Bring the bot up: preload intents, build the client, load modules,
    /// commands and events in that order, attach events, sync slash commands,
    /// start hot reload and log in. A failure after loading has begun runs
    /// the exit hooks of whatever was registered before returning.
    pub async fn start<F>(&self, build_client: F) -> Result<Arc<dyn Client>, StartupError>
    where
        F: FnOnce(ClientOptions) -> Result<Arc<dyn Client>, BotError>,
    {
        if self.state() != CoreState::Uninitialized {
            return Err(StartupError::AlreadyStarted);
        }
        let token = self.config.token().ok_or(StartupError::MissingCredential)?.to_string();

        self.set_state(CoreState::Loading);
        match self.boot(&token, build_client).await {
            Ok(client) => Ok(client),
            Err(e) => {
                error!("Startup failed, shutting down: {}", e);
                self.shutdown(true).await;
                Err(e)
            }
        }
    }

    async fn boot<F>(&self, token: &str, build_client: F) -> Result<Arc<dyn Client>, StartupError>
    where
        F: FnOnce(ClientOptions) -> Result<Arc<dyn Client>, BotError>,
    {
        info!("Starting {}", self.config.bot.name);
        self.ensure_folders();

        let module_loader = Arc::new(ModuleLoader::new(
            self.roots(PluginKind::Module),
            self.catalog.clone(),
            self.modules.clone(),
        ));
        let event_loader = Arc::new(EventLoader::new(
            self.roots(PluginKind::Event),
            self.catalog.clone(),
            self.events.clone(),
        ));

        let mut intents = self
            .config
            .intents()
            .map_err(|e| StartupError::Load(BotError::Config(e)))?;
        intents.extend(event_loader.preload_intents().await);
        let privileged: Vec<String> = intents
            .iter()
            .filter(|i| i.is_privileged())
            .map(|i| i.to_string())
            .collect();
        if !privileged.is_empty() {
            info!("Privileged intents requested: {}", privileged.join(", "));
        }

        let client = build_client(ClientOptions { intents }).map_err(StartupError::Login)?;
        let settings = Settings {
            prefix: self.config.bot.prefix.clone(),
            production: self.config.bot.production,
        };
        let services = Services::new(client.clone(), self.commands.clone(), self.modules.clone(), settings);
        if self.services.set(services.clone()).is_err() {
            return Err(StartupError::AlreadyStarted);
        }

        let command_loader = Arc::new(
            CommandLoader::new(self.roots(PluginKind::Command), self.catalog.clone(), self.commands.clone())
                .with_slash_sync(SlashCommandStore::new(self.config.paths.slash_registry_path()), client.clone()),
        );

        let reports = [
            ("module", module_loader.load().await),
            ("command", command_loader.load().await),
            ("event", event_loader.load().await),
        ];
        check_core_failures(&reports)?;

        self.events.attach(services);
        command_loader.sync_slash().await;

        if self.config.hot_reload.enabled {
            let loaders: Vec<Arc<dyn Reload>> = vec![
                module_loader as Arc<dyn Reload>,
                command_loader as Arc<dyn Reload>,
                event_loader as Arc<dyn Reload>,
            ];
            let debounce = Duration::from_millis(self.config.hot_reload.debounce_ms);
            match HotReloader::start(loaders, debounce) {
                Ok(reloader) => {
                    if let Ok(mut slot) = self.reloader.lock() {
                        *slot = Some(reloader);
                    }
                }
                Err(e) => warn!("Hot reload unavailable: {}", e),
            }
        } else {
            info!("Hot reload disabled");
        }

        client.login(token).await.map_err(StartupError::Login)?;
        self.set_state(CoreState::Running);
        info!(
            "{} running: {} commands, {} events, {} modules",
            self.config.bot.name,
            self.commands.len(),
            self.events.len(),
            self.modules.len()
        );
        Ok(client)
    }

    /// Run every exit hook, stop hot reload and disconnect. Only the first
    /// call does anything; later calls return `false`.
    pub async fn shutdown(&self, waitable: bool) -> bool {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.set_state(CoreState::ShuttingDown);
        info!("Shutting down{}", if waitable { " (waiting for exit hooks)" } else { "" });

        tokio::join!(
            self.modules.exit(waitable),
            self.commands.exit(waitable),
            self.events.exit(waitable),
        );

        let reloader = self.reloader.lock().ok().and_then(|mut slot| slot.take());
        if let Some(reloader) = reloader {
            reloader.stop();
        }

        if let Some(services) = self.services.get() {
            if let Err(e) = services.client.destroy().await {
                error!("Failed to destroy client: {}", e);
            }
        }

        self.set_state(CoreState::Terminated);
        info!("Shutdown complete");
        true
    }
}

/// Built-in plugins are the critical path: any failure among them aborts
/// startup. User plugin failures were already logged by the loaders.
fn check_core_failures(reports: &[(&str, LoadReport)]) -> Result<(), StartupError> {
    let failures: Vec<String> = reports
        .iter()
        .flat_map(|(kind, report)| {
            report
                .core_failures()
                .into_iter()
                .map(move |f| format!("{} {}: {}", kind, f.path.display(), f.error))
        })
        .collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(StartupError::Load(BotError::Internal(format!(
            "{} built-in plugin(s) failed to load: {}",
            failures.len(),
            failures.join("; ")
        ))))
    }
}
