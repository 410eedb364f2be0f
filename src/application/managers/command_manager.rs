//! Command registry: canonical names, aliases and groups

use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

use crate::application::errors::BotError;
use crate::domain::entities::{CommandConfig, CommandHelp, SlashDefinition};
use crate::plugins::trait_def::CommandHandler;

/// Group used when a command file sits directly in its root
pub const DEFAULT_GROUP: &str = "default";

/// A command as stored in the registry
#[derive(Debug)]
pub struct RegisteredCommand {
    pub name: String,
    pub aliases: Vec<String>,
    pub help: CommandHelp,
    pub config: CommandConfig,
    pub group: String,
    pub is_core: bool,
    /// File (or label) the command was registered from
    pub source: String,
    pub handler: CommandHandler,
}

impl RegisteredCommand {
    pub fn is_hidden(&self) -> bool {
        self.config.hidden
    }

    pub fn is_slash(&self) -> bool {
        matches!(self.handler, CommandHandler::Slash(_))
    }

    /// Label used when listing commands by group
    pub fn display_group(&self) -> &str {
        if self.is_core {
            "core"
        } else if self.group == DEFAULT_GROUP {
            "misc"
        } else {
            &self.group
        }
    }
}

#[derive(Default)]
struct CommandRegistry {
    core: HashMap<String, Arc<RegisteredCommand>>,
    custom: HashMap<String, Arc<RegisteredCommand>>,
    /// alias -> canonical name
    aliases: HashMap<String, String>,
    groups: Vec<String>,
}

impl CommandRegistry {
    fn partition(&mut self, is_core: bool) -> &mut HashMap<String, Arc<RegisteredCommand>> {
        if is_core {
            &mut self.core
        } else {
            &mut self.custom
        }
    }

    fn primary(&self, name: &str) -> Option<&Arc<RegisteredCommand>> {
        self.core.get(name).or_else(|| self.custom.get(name))
    }

    fn resolve(&self, name: &str) -> Option<&Arc<RegisteredCommand>> {
        self.primary(name).or_else(|| {
            self.aliases
                .get(name)
                .and_then(|canonical| self.primary(canonical))
        })
    }

    fn drop_aliases_of(&mut self, command: &RegisteredCommand) {
        for alias in &command.aliases {
            if self.aliases.get(alias) == Some(&command.name) {
                self.aliases.remove(alias);
            }
        }
    }

    fn remove(&mut self, name: &str) -> Option<Arc<RegisteredCommand>> {
        let removed = self.core.remove(name).or_else(|| self.custom.remove(name))?;
        self.drop_aliases_of(&removed);
        Some(removed)
    }

    /// A name may not cross partitions, and a custom name may not take a
    /// core alias
    fn check_collisions(&self, name: &str, filename: &str, is_core: bool) -> Result<(), BotError> {
        let other = if is_core { &self.custom } else { &self.core };
        if other.contains_key(name) {
            return Err(BotError::validation(format!(
                "Command '{}' from {} collides with a {} command",
                name,
                filename,
                if is_core { "custom" } else { "core" }
            )));
        }
        if !is_core {
            if let Some(owner) = self.aliases.get(name).filter(|owner| self.core.contains_key(*owner)) {
                return Err(BotError::validation(format!(
                    "Command '{}' from {} collides with an alias of core command '{}'",
                    name, filename, owner
                )));
            }
        }
        Ok(())
    }

    fn all(&self) -> impl Iterator<Item = &Arc<RegisteredCommand>> {
        self.core.values().chain(self.custom.values())
    }
}

/// Owns every registered command
#[derive(Default)]
pub struct CommandManager {
    registry: RwLock<CommandRegistry>,
}

impl CommandManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructed command handler.
    ///
    /// The canonical name is the first declared name, the rest become
    /// aliases. Registering a name again in the same partition replaces the
    /// previous entry together with its aliases. A custom command may not
    /// take a core command's name or alias, and its aliases never displace a
    /// core alias.
    pub fn register(
        &self,
        handler: CommandHandler,
        filename: &str,
        group: &str,
        is_core: bool,
    ) -> Result<Arc<RegisteredCommand>, BotError> {
        let help = handler.help();
        let config = handler.config();
        let (primary, declared_aliases) = help.name.split();
        let name = canonical_name(primary, filename)?;
        let group = if group.trim().is_empty() {
            DEFAULT_GROUP.to_string()
        } else {
            group.trim().to_lowercase()
        };

        let mut registry = self.registry.write().map_err(|_| BotError::poisoned())?;
        registry.check_collisions(&name, filename, is_core)?;

        if let Some(previous) = registry.partition(is_core).remove(&name) {
            info!("Replacing command '{}' (was from {})", name, previous.source);
            registry.drop_aliases_of(&previous);
        }

        // A primary name always wins over an alias of the same spelling
        if let Some(owner) = registry.aliases.remove(&name) {
            warn!("Command '{}' shadows an alias of '{}'", name, owner);
            if let Some(owner_cmd) = registry.primary(&owner).cloned() {
                let trimmed = clone_without_alias(&owner_cmd, &name);
                let owner_core = owner_cmd.is_core;
                registry.partition(owner_core).insert(owner, Arc::new(trimmed));
            }
        }

        let mut aliases = Vec::new();
        for alias in declared_aliases {
            if alias.is_empty() || alias == name || aliases.contains(&alias) {
                continue;
            }
            if registry.primary(&alias).is_some() {
                warn!("Alias '{}' of '{}' is already a command name, skipping", alias, name);
                continue;
            }
            if let Some(owner) = registry.aliases.get(&alias) {
                if !is_core && registry.core.contains_key(owner) {
                    warn!("Alias '{}' of '{}' belongs to core command '{}', skipping", alias, name, owner);
                    continue;
                }
                warn!("Alias '{}' moves from '{}' to '{}'", alias, owner, name);
            }
            registry.aliases.insert(alias.clone(), name.clone());
            aliases.push(alias);
        }

        if !registry.groups.contains(&group) {
            registry.groups.push(group.clone());
        }

        let command = Arc::new(RegisteredCommand {
            name: name.clone(),
            aliases,
            help,
            config,
            group,
            is_core,
            source: filename.to_string(),
            handler,
        });
        registry.partition(is_core).insert(name.clone(), command.clone());

        debug!(
            "Registered {} {} command '{}' from {}",
            if is_core { "core" } else { "custom" },
            command.handler.kind(),
            name,
            filename
        );
        Ok(command)
    }

    /// Run the checks `register` would run, without registering. Returns the
    /// canonical name.
    pub fn check(&self, handler: &CommandHandler, filename: &str, is_core: bool) -> Result<String, BotError> {
        let (primary, _) = handler.help().name.split();
        let name = canonical_name(primary, filename)?;
        let registry = self.registry.read().map_err(|_| BotError::poisoned())?;
        registry.check_collisions(&name, filename, is_core)?;
        Ok(name)
    }

    /// Remove a command by canonical name, awaiting its `exit` hook.
    /// Returns whether a command existed.
    pub async fn unregister(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        let removed = match self.registry.write() {
            Ok(mut registry) => registry.remove(&name),
            Err(_) => {
                error!("Command registry lock poisoned");
                return false;
            }
        };

        match removed {
            Some(command) => {
                if let Err(e) = command.handler.exit().await {
                    error!("Command '{}' failed to exit: {}", command.name, e);
                }
                info!("Unregistered command: {}", command.name);
                true
            }
            None => false,
        }
    }

    /// Resolve a name or alias. Hidden commands only come back when
    /// `include_hidden` is set.
    pub fn get_command(&self, name: &str, include_hidden: bool) -> Option<Arc<RegisteredCommand>> {
        let name = name.to_lowercase();
        let registry = self.registry.read().ok()?;
        registry
            .resolve(&name)
            .filter(|cmd| include_hidden || !cmd.is_hidden())
            .cloned()
    }

    /// Commands by display group, each list sorted by name
    pub fn get_commands_grouped(&self, include_hidden: bool) -> BTreeMap<String, Vec<Arc<RegisteredCommand>>> {
        let mut grouped: BTreeMap<String, Vec<Arc<RegisteredCommand>>> = BTreeMap::new();
        let Ok(registry) = self.registry.read() else {
            return grouped;
        };
        for cmd in registry.all() {
            if cmd.is_hidden() && !include_hidden {
                continue;
            }
            grouped
                .entry(cmd.display_group().to_string())
                .or_default()
                .push(cmd.clone());
        }
        for list in grouped.values_mut() {
            list.sort_by(|a, b| a.name.cmp(&b.name));
        }
        grouped
    }

    /// Command registered from the given file, if any
    pub fn find_by_source(&self, source: &str) -> Option<Arc<RegisteredCommand>> {
        let registry = self.registry.read().ok()?;
        let found = registry.all().find(|cmd| cmd.source == source).cloned();
        found
    }

    /// Known group names, in first-seen order
    pub fn groups(&self) -> Vec<String> {
        self.registry
            .read()
            .map(|r| r.groups.clone())
            .unwrap_or_default()
    }

    /// Definitions of every slash command, sorted by name
    pub fn slash_definitions(&self) -> Vec<SlashDefinition> {
        let Ok(registry) = self.registry.read() else {
            return Vec::new();
        };
        let mut defs: Vec<SlashDefinition> = registry
            .all()
            .filter_map(|cmd| cmd.handler.slash_definition())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
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

    /// Run every command's `exit` hook. With `waitable` the call returns once
    /// all hooks have finished; otherwise the hooks are spawned and left
    /// running.
    pub async fn exit(&self, waitable: bool) {
        let handlers: Vec<(String, CommandHandler)> = match self.registry.read() {
            Ok(registry) => registry
                .all()
                .map(|cmd| (cmd.name.clone(), cmd.handler.clone()))
                .collect(),
            Err(_) => return,
        };

        if waitable {
            let results = join_all(handlers.iter().map(|(_, h)| h.exit())).await;
            for ((name, _), result) in handlers.iter().zip(results) {
                if let Err(e) = result {
                    error!("Command '{}' failed to exit: {}", name, e);
                }
            }
        } else {
            for (name, handler) in handlers {
                tokio::spawn(async move {
                    if let Err(e) = handler.exit().await {
                        error!("Command '{}' failed to exit: {}", name, e);
                    }
                });
            }
        }
    }
}

fn canonical_name(primary: Option<String>, filename: &str) -> Result<String, BotError> {
    let name = primary
        .filter(|n| !n.is_empty())
        .ok_or_else(|| BotError::validation(format!("Command in {} has no name", filename)))?;
    if name.chars().any(char::is_whitespace) {
        return Err(BotError::validation(format!(
            "Command name '{}' in {} contains whitespace",
            name, filename
        )));
    }
    Ok(name)
}

fn clone_without_alias(command: &RegisteredCommand, alias: &str) -> RegisteredCommand {
    RegisteredCommand {
        name: command.name.clone(),
        aliases: command.aliases.iter().filter(|a| *a != alias).cloned().collect(),
        help: command.help.clone(),
        config: command.config.clone(),
        group: command.group.clone(),
        is_core: command.is_core,
        source: command.source.clone(),
        handler: command.handler.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::CommandContext;
    use crate::domain::entities::CommandName;
    use crate::plugins::trait_def::TextCommand;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Stub {
        name: CommandName,
        config: CommandConfig,
        exits: Arc<AtomicUsize>,
    }

    impl Stub {
        fn named(name: impl Into<CommandName>) -> Self {
            Self {
                name: name.into(),
                config: CommandConfig::default(),
                exits: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn hidden(mut self) -> Self {
            self.config.hidden = true;
            self
        }
    }

    #[async_trait]
    impl TextCommand for Stub {
        fn help(&self) -> CommandHelp {
            CommandHelp::new(self.name.clone()).with_description("stub")
        }

        fn config(&self) -> CommandConfig {
            self.config.clone()
        }

        async fn run(&self, _ctx: &CommandContext) -> Result<(), BotError> {
            Ok(())
        }

        async fn exit(&self) -> Result<(), BotError> {
            self.exits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn text(stub: Stub) -> CommandHandler {
        CommandHandler::text(stub)
    }

    #[test]
    fn test_aliases_resolve_to_same_registration() {
        let manager = CommandManager::new();
        manager
            .register(text(Stub::named(vec!["foo", "bar", "baz"])), "foo.yaml", "default", false)
            .unwrap();

        let foo = manager.get_command("foo", false).unwrap();
        let bar = manager.get_command("bar", false).unwrap();
        let baz = manager.get_command("BAZ", false).unwrap();
        assert!(Arc::ptr_eq(&foo, &bar));
        assert!(Arc::ptr_eq(&foo, &baz));
        assert_eq!(foo.aliases, vec!["bar".to_string(), "baz".to_string()]);
    }

    #[test]
    fn test_register_rejects_missing_name() {
        let manager = CommandManager::new();
        let err = manager
            .register(text(Stub::named("  ")), "blank.yaml", "default", false)
            .unwrap_err();
        assert!(matches!(err, BotError::Validation(_)));

        let err = manager
            .register(text(Stub::named(CommandName::Many(vec![]))), "empty.yaml", "default", false)
            .unwrap_err();
        assert!(matches!(err, BotError::Validation(_)));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_reregister_replaces_and_drops_old_aliases() {
        let manager = CommandManager::new();
        manager
            .register(text(Stub::named(vec!["foo", "old"])), "a.yaml", "default", false)
            .unwrap();
        let second = manager
            .register(text(Stub::named(vec!["foo", "new"])), "b.yaml", "default", false)
            .unwrap();

        assert_eq!(manager.len(), 1);
        assert!(Arc::ptr_eq(&manager.get_command("foo", false).unwrap(), &second));
        assert!(manager.get_command("new", false).is_some());
        assert!(manager.get_command("old", false).is_none());
    }

    #[test]
    fn test_custom_cannot_shadow_core() {
        let manager = CommandManager::new();
        manager
            .register(text(Stub::named("help")), "src/commands/help.yaml", "default", true)
            .unwrap();
        let err = manager
            .register(text(Stub::named("help")), "commands/help.yaml", "default", false)
            .unwrap_err();
        assert!(matches!(err, BotError::Validation(_)));
        assert!(manager.get_command("help", false).unwrap().is_core);
    }

    #[test]
    fn test_alias_never_collides_with_primary() {
        let manager = CommandManager::new();
        manager
            .register(text(Stub::named("ping")), "ping.yaml", "default", false)
            .unwrap();
        let cmd = manager
            .register(text(Stub::named(vec!["pong", "ping"])), "pong.yaml", "default", false)
            .unwrap();
        assert!(cmd.aliases.is_empty());
        assert_eq!(manager.get_command("ping", false).unwrap().name, "ping");

        // A later primary takes the name back from an alias
        manager
            .register(text(Stub::named(vec!["stats", "info"])), "stats.yaml", "default", false)
            .unwrap();
        manager
            .register(text(Stub::named("info")), "info.yaml", "default", false)
            .unwrap();
        assert_eq!(manager.get_command("info", false).unwrap().name, "info");
        assert!(manager.get_command("stats", false).unwrap().aliases.is_empty());
    }

    #[test]
    fn test_custom_alias_cannot_take_core_alias() {
        let manager = CommandManager::new();
        let help = manager
            .register(text(Stub::named(vec!["help", "h"])), "src/commands/help.yaml", "default", true)
            .unwrap();
        let evil = manager
            .register(text(Stub::named(vec!["evil", "h"])), "commands/evil.yaml", "default", false)
            .unwrap();

        assert!(evil.aliases.is_empty());
        let resolved = manager.get_command("h", false).unwrap();
        assert!(Arc::ptr_eq(&resolved, &help));
        assert!(resolved.is_core);
    }

    #[test]
    fn test_custom_name_cannot_take_core_alias() {
        let manager = CommandManager::new();
        let help = manager
            .register(text(Stub::named(vec!["help", "h"])), "src/commands/help.yaml", "default", true)
            .unwrap();
        let err = manager
            .register(text(Stub::named("h")), "commands/h.yaml", "default", false)
            .unwrap_err();

        assert!(matches!(err, BotError::Validation(_)));
        assert_eq!(manager.len(), 1);
        let core = manager.get_command("help", false).unwrap();
        assert!(Arc::ptr_eq(&core, &help));
        assert_eq!(core.aliases, vec!["h".to_string()]);
        assert!(Arc::ptr_eq(&manager.get_command("h", false).unwrap(), &help));
    }

    #[test]
    fn test_hidden_filter() {
        let manager = CommandManager::new();
        manager
            .register(text(Stub::named("secret").hidden()), "secret.yaml", "default", false)
            .unwrap();

        assert!(manager.get_command("secret", false).is_none());
        assert!(manager.get_command("secret", true).is_some());
        assert!(manager.get_commands_grouped(false).is_empty());
        assert_eq!(manager.get_commands_grouped(true)["misc"].len(), 1);
    }

    #[test]
    fn test_grouping_labels() {
        let manager = CommandManager::new();
        manager.register(text(Stub::named("help")), "h.yaml", "default", true).unwrap();
        manager.register(text(Stub::named("roll")), "r.yaml", "Fun", false).unwrap();
        manager.register(text(Stub::named("coin")), "c.yaml", "fun", false).unwrap();
        manager.register(text(Stub::named("misc1")), "m.yaml", "default", false).unwrap();

        let grouped = manager.get_commands_grouped(false);
        let keys: Vec<&String> = grouped.keys().collect();
        assert_eq!(keys, vec!["core", "fun", "misc"]);
        let fun: Vec<&str> = grouped["fun"].iter().map(|c| c.name.as_str()).collect();
        assert_eq!(fun, vec!["coin", "roll"]);
        assert_eq!(manager.groups(), vec!["default".to_string(), "fun".to_string()]);
    }

    #[tokio::test]
    async fn test_unregister_removes_name_and_aliases() {
        let manager = CommandManager::new();
        let stub = Stub::named(vec!["foo", "f"]);
        let exits = stub.exits.clone();
        manager.register(text(stub), "foo.yaml", "default", false).unwrap();

        assert!(manager.unregister("foo").await);
        assert_eq!(exits.load(Ordering::SeqCst), 1);
        assert!(manager.get_command("foo", true).is_none());
        assert!(manager.get_command("f", true).is_none());
        assert!(!manager.unregister("foo").await);
    }

    #[tokio::test]
    async fn test_exit_waitable_runs_every_hook() {
        let manager = CommandManager::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for name in ["a", "b", "c"] {
            let mut stub = Stub::named(name);
            stub.exits = counter.clone();
            manager.register(text(stub), name, "default", false).unwrap();
        }
        manager.exit(true).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
