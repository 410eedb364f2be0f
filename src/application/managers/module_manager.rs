//! Module registry: passive services looked up by name

use futures::future::join_all;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info};

use crate::application::errors::BotError;
use crate::plugins::trait_def::ModuleInstance;

#[derive(Debug)]
pub struct RegisteredModule {
    pub name: String,
    pub group: String,
    pub is_core: bool,
    pub source: String,
    pub instance: ModuleInstance,
}

/// Which modules [`ModuleManager::get_modules`] returns
#[derive(Debug, Clone, Default)]
pub struct ModuleFilter {
    pub is_core: Option<bool>,
    pub group: Option<String>,
}

impl ModuleFilter {
    pub fn core() -> Self {
        Self { is_core: Some(true), group: None }
    }

    pub fn custom() -> Self {
        Self { is_core: Some(false), group: None }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into().to_lowercase());
        self
    }

    fn matches(&self, module: &RegisteredModule) -> bool {
        self.is_core.map_or(true, |c| c == module.is_core)
            && self.group.as_ref().map_or(true, |g| g == &module.group)
    }
}

#[derive(Default)]
struct ModuleRegistry {
    core: HashMap<String, Arc<RegisteredModule>>,
    custom: HashMap<String, Arc<RegisteredModule>>,
}

/// Owns core and custom modules
#[derive(Default)]
pub struct ModuleManager {
    registry: RwLock<ModuleRegistry>,
}

impl ModuleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        instance: ModuleInstance,
        name: &str,
        filename: &str,
        group: &str,
        is_core: bool,
    ) -> Result<Arc<RegisteredModule>, BotError> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(BotError::validation(format!("Module in {} has no name", filename)));
        }
        let module = Arc::new(RegisteredModule {
            name: name.clone(),
            group: if group.is_empty() { "default".to_string() } else { group.to_lowercase() },
            is_core,
            source: filename.to_string(),
            instance,
        });

        let mut registry = self.registry.write().map_err(|_| BotError::poisoned())?;
        let partition = if is_core { &mut registry.core } else { &mut registry.custom };
        if let Some(previous) = partition.insert(name.clone(), module.clone()) {
            info!("Replacing module '{}' (was from {})", name, previous.source);
        }
        debug!("Registered {} module '{}' from {}", if is_core { "core" } else { "custom" }, name, filename);
        Ok(module)
    }

    /// Remove a module, core first, awaiting its `exit` hook
    pub async fn unregister(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        let removed = match self.registry.write() {
            Ok(mut registry) => registry
                .core
                .remove(&name)
                .or_else(|| registry.custom.remove(&name)),
            Err(_) => {
                error!("Module registry lock poisoned");
                return false;
            }
        };
        match removed {
            Some(module) => {
                if let Err(e) = module.instance.handler().exit().await {
                    error!("Module '{}' failed to exit: {}", module.name, e);
                }
                info!("Unregistered module: {}", module.name);
                true
            }
            None => false,
        }
    }

    /// Core module if present, otherwise the custom one
    pub fn get(&self, name: &str) -> Option<Arc<RegisteredModule>> {
        self.get_core_module(name).or_else(|| self.get_custom_module(name))
    }

    pub fn get_core_module(&self, name: &str) -> Option<Arc<RegisteredModule>> {
        self.registry.read().ok()?.core.get(&name.to_lowercase()).cloned()
    }

    pub fn get_custom_module(&self, name: &str) -> Option<Arc<RegisteredModule>> {
        self.registry.read().ok()?.custom.get(&name.to_lowercase()).cloned()
    }

    /// Typed lookup, core first
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).and_then(|m| m.instance.downcast::<T>())
    }

    /// Modules matching the filter, sorted by name
    pub fn get_modules(&self, filter: &ModuleFilter) -> Vec<Arc<RegisteredModule>> {
        let Ok(registry) = self.registry.read() else {
            return Vec::new();
        };
        let mut modules: Vec<Arc<RegisteredModule>> = registry
            .core
            .values()
            .chain(registry.custom.values())
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name).then(b.is_core.cmp(&a.is_core)));
        modules
    }

    pub fn find_by_source(&self, source: &str) -> Option<Arc<RegisteredModule>> {
        let registry = self.registry.read().ok()?;
        let found = registry
            .core
            .values()
            .chain(registry.custom.values())
            .find(|m| m.source == source)
            .cloned();
        found
    }

    /// Remove the module loaded from `source`, awaiting its `exit` hook
    pub async fn unregister_source(&self, source: &str) -> bool {
        let removed = match self.registry.write() {
            Ok(mut registry) => {
                let hit = registry
                    .core
                    .iter()
                    .chain(registry.custom.iter())
                    .find(|(_, m)| m.source == source)
                    .map(|(name, m)| (name.clone(), m.is_core));
                hit.and_then(|(name, is_core)| {
                    if is_core {
                        registry.core.remove(&name)
                    } else {
                        registry.custom.remove(&name)
                    }
                })
            }
            Err(_) => None,
        };
        match removed {
            Some(module) => {
                if let Err(e) = module.instance.handler().exit().await {
                    error!("Module '{}' failed to exit: {}", module.name, e);
                }
                info!("Unregistered module: {}", module.name);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.registry
            .read()
            .map(|r| r.core.len() + r.custom.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every module's `exit` hook, waiting for all of them when `waitable`
    pub async fn exit(&self, waitable: bool) {
        let modules: Vec<Arc<RegisteredModule>> = match self.registry.read() {
            Ok(registry) => registry
                .core
                .values()
                .chain(registry.custom.values())
                .cloned()
                .collect(),
            Err(_) => return,
        };

        if waitable {
            let results = join_all(modules.iter().map(|m| m.instance.handler().exit())).await;
            for (module, result) in modules.iter().zip(results) {
                if let Err(e) = result {
                    error!("Module '{}' failed to exit: {}", module.name, e);
                }
            }
        } else {
            for module in modules {
                tokio::spawn(async move {
                    if let Err(e) = module.instance.handler().exit().await {
                        error!("Module '{}' failed to exit: {}", module.name, e);
                    }
                });
            }
        }
    }
}
