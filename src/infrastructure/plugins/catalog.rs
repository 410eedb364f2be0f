//! Factory catalog
//!
//! Maps the factory keys manifests refer to onto constructors. The program
//! fills the catalog once at startup; loaders only read from it.

use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::application::errors::{BotError, LoadError};
use crate::domain::entities::{Intent, IntentSet};
use crate::plugins::trait_def::{CommandHandler, EventHandler, ModuleInstance, PluginKind};

/// What a factory receives: the plugin name and the manifest's `options`
#[derive(Debug, Clone)]
pub struct PluginOptions {
    pub name: String,
    pub values: serde_yaml::Value,
}

impl PluginOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: serde_yaml::Value::Null,
        }
    }

    pub fn with_values(mut self, values: serde_yaml::Value) -> Self {
        self.values = values;
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.values.get(key).and_then(|v| v.as_u64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(|v| v.as_bool())
    }

    /// Deserialize the whole options block, using `T::default()` when absent
    pub fn parse<T: DeserializeOwned + Default>(&self) -> Result<T, BotError> {
        if self.values.is_null() {
            return Ok(T::default());
        }
        serde_yaml::from_value(self.values.clone())
            .map_err(|e| BotError::validation(format!("Invalid options for '{}': {}", self.name, e)))
    }
}

pub type CommandFactory = Arc<dyn Fn(&PluginOptions) -> Result<CommandHandler, BotError> + Send + Sync>;
pub type EventFactory = Arc<dyn Fn(&PluginOptions) -> Result<EventHandler, BotError> + Send + Sync>;
pub type ModuleFactory = Arc<dyn Fn(&PluginOptions) -> Result<ModuleInstance, BotError> + Send + Sync>;

#[derive(Clone)]
struct EventEntry {
    factory: EventFactory,
    intents: IntentSet,
}

/// Registered factories by kind and key
#[derive(Clone, Default)]
pub struct PluginCatalog {
    commands: HashMap<String, CommandFactory>,
    events: HashMap<String, EventEntry>,
    modules: HashMap<String, ModuleFactory>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command<F>(&mut self, key: &str, factory: F) -> &mut Self
    where
        F: Fn(&PluginOptions) -> Result<CommandHandler, BotError> + Send + Sync + 'static,
    {
        self.commands.insert(key.to_lowercase(), Arc::new(factory));
        self
    }

    /// Register an event factory together with the intents its handler needs
    pub fn event<F, I>(&mut self, key: &str, intents: I, factory: F) -> &mut Self
    where
        F: Fn(&PluginOptions) -> Result<EventHandler, BotError> + Send + Sync + 'static,
        I: IntoIterator<Item = Intent>,
    {
        self.events.insert(
            key.to_lowercase(),
            EventEntry {
                factory: Arc::new(factory),
                intents: intents.into_iter().collect(),
            },
        );
        self
    }

    pub fn module<F>(&mut self, key: &str, factory: F) -> &mut Self
    where
        F: Fn(&PluginOptions) -> Result<ModuleInstance, BotError> + Send + Sync + 'static,
    {
        self.modules.insert(key.to_lowercase(), Arc::new(factory));
        self
    }

    pub fn build_command(&self, key: &str, options: &PluginOptions) -> Result<CommandHandler, LoadError> {
        let factory = self.commands.get(key).ok_or_else(|| unknown(PluginKind::Command, key))?;
        factory(options).map_err(|e| construct(key, e))
    }

    pub fn build_event(&self, key: &str, options: &PluginOptions) -> Result<EventHandler, LoadError> {
        let entry = self.events.get(key).ok_or_else(|| unknown(PluginKind::Event, key))?;
        (entry.factory)(options).map_err(|e| construct(key, e))
    }

    pub fn build_module(&self, key: &str, options: &PluginOptions) -> Result<ModuleInstance, LoadError> {
        let factory = self.modules.get(key).ok_or_else(|| unknown(PluginKind::Module, key))?;
        factory(options).map_err(|e| construct(key, e))
    }

    /// Intents declared for an event factory
    pub fn event_intents(&self, key: &str) -> Option<&IntentSet> {
        self.events.get(key).map(|e| &e.intents)
    }

    pub fn contains(&self, kind: PluginKind, key: &str) -> bool {
        match kind {
            PluginKind::Command => self.commands.contains_key(key),
            PluginKind::Event => self.events.contains_key(key),
            PluginKind::Module => self.modules.contains_key(key),
        }
    }

    /// Sorted factory keys of one kind
    pub fn keys(&self, kind: PluginKind) -> Vec<String> {
        let keys: BTreeSet<&String> = match kind {
            PluginKind::Command => self.commands.keys().collect(),
            PluginKind::Event => self.events.keys().collect(),
            PluginKind::Module => self.modules.keys().collect(),
        };
        keys.into_iter().cloned().collect()
    }
}

fn unknown(kind: PluginKind, key: &str) -> LoadError {
    LoadError::UnknownFactory {
        kind: kind.as_str(),
        key: key.to_string(),
    }
}

fn construct(key: &str, source: BotError) -> LoadError {
    LoadError::Construct {
        key: key.to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::trait_def::Module;
    use serde::Deserialize;

    struct Counter {
        start: u64,
    }
    impl Module for Counter {}

    #[derive(Deserialize, Default)]
    #[serde(rename_all = "kebab-case", default)]
    struct CounterOptions {
        start_at: u64,
    }

    fn catalog() -> PluginCatalog {
        let mut catalog = PluginCatalog::new();
        catalog
            .module("Counter", |opts| {
                let parsed: CounterOptions = opts.parse()?;
                Ok(ModuleInstance::new(Counter { start: parsed.start_at }))
            })
            .module("broken", |_| Err(BotError::Internal("no database".into())));
        catalog
    }

    #[test]
    fn test_build_with_options() {
        let values: serde_yaml::Value = serde_yaml::from_str("start-at: 7").unwrap();
        let options = PluginOptions::new("counter").with_values(values);
        let module = catalog().build_module("counter", &options).unwrap();
        assert_eq!(module.downcast::<Counter>().unwrap().start, 7);
        assert_eq!(options.get_u64("start-at"), Some(7));
    }

    #[test]
    fn test_unknown_and_failing_factories() {
        let catalog = catalog();
        let options = PluginOptions::new("x");
        assert!(matches!(
            catalog.build_module("missing", &options),
            Err(LoadError::UnknownFactory { kind: "module", .. })
        ));
        assert!(matches!(
            catalog.build_module("broken", &options),
            Err(LoadError::Construct { .. })
        ));
        assert!(matches!(
            catalog.build_command("counter", &options),
            Err(LoadError::UnknownFactory { kind: "command", .. })
        ));
    }

    #[test]
    fn test_keys() {
        let catalog = catalog();
        assert_eq!(catalog.keys(PluginKind::Module), vec!["broken", "counter"]);
        assert!(catalog.contains(PluginKind::Module, "counter"));
        assert!(catalog.event_intents("counter").is_none());
    }
}
