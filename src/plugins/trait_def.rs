//! Plugin contracts
//!
//! Every command, event and module plugin implements one of the traits below.
//! The loaders never look at method presence: each handler is wrapped in a
//! tagged enum when it is constructed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::application::context::{CommandContext, EventContext, InteractionContext};
use crate::application::errors::BotError;
use crate::domain::entities::{CommandConfig, CommandHelp, SlashDefinition};

/// Text command invoked with the configured prefix
#[async_trait]
pub trait TextCommand: Send + Sync {
    /// Name, aliases, usage and flags
    fn help(&self) -> CommandHelp;

    fn config(&self) -> CommandConfig {
        CommandConfig::default()
    }

    async fn run(&self, ctx: &CommandContext) -> Result<(), BotError>;

    /// Called before the command is unloaded or the process exits
    async fn exit(&self) -> Result<(), BotError> {
        Ok(())
    }
}

/// Slash command registered with the platform
#[async_trait]
pub trait SlashCommand: Send + Sync {
    fn definition(&self) -> SlashDefinition;

    fn config(&self) -> CommandConfig {
        CommandConfig::default()
    }

    async fn execute(&self, ctx: &InteractionContext) -> Result<(), BotError>;

    async fn exit(&self) -> Result<(), BotError> {
        Ok(())
    }
}

/// Built-in event handler
#[async_trait]
pub trait CoreEvent: Send + Sync {
    /// Runs on every occurrence. Returning `true` tells a wrapping custom
    /// handler to skip its `after` hook.
    async fn every(&self, ctx: &EventContext) -> Result<bool, BotError>;

    /// Retire the handler after its first invocation
    fn once(&self) -> bool {
        false
    }

    async fn exit(&self) -> Result<(), BotError> {
        Ok(())
    }
}

/// User-supplied event handler that wraps the built-in one
#[async_trait]
pub trait CustomEvent: Send + Sync {
    /// Returning `true` vetoes the core handler and `after`
    async fn before(&self, ctx: &EventContext) -> Result<bool, BotError>;

    /// Whether `after` is implemented. The core handler only runs through a
    /// custom handler that has one.
    fn has_after(&self) -> bool {
        true
    }

    async fn after(&self, _ctx: &EventContext) -> Result<(), BotError> {
        Ok(())
    }

    async fn exit(&self) -> Result<(), BotError> {
        Ok(())
    }
}

/// Passive service looked up by name
#[async_trait]
pub trait Module: Send + Sync {
    async fn exit(&self) -> Result<(), BotError> {
        Ok(())
    }
}

/// Kinds of plugin the loaders know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Command,
    Event,
    Module,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Command => "command",
            PluginKind::Event => "event",
            PluginKind::Module => "module",
        }
    }

    /// Folder name under both the built-in and the user root
    pub fn dir_name(&self) -> &'static str {
        match self {
            PluginKind::Command => "commands",
            PluginKind::Event => "events",
            PluginKind::Module => "modules",
        }
    }

    /// Commands and modules allow one level of group folders
    pub fn grouped(&self) -> bool {
        !matches!(self, PluginKind::Event)
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A constructed command handler, tagged by variant
#[derive(Clone)]
pub enum CommandHandler {
    Text(Arc<dyn TextCommand>),
    Slash(Arc<dyn SlashCommand>),
}

impl CommandHandler {
    pub fn text<T: TextCommand + 'static>(command: T) -> Self {
        CommandHandler::Text(Arc::new(command))
    }

    pub fn slash<T: SlashCommand + 'static>(command: T) -> Self {
        CommandHandler::Slash(Arc::new(command))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CommandHandler::Text(_) => "text",
            CommandHandler::Slash(_) => "slash",
        }
    }

    pub fn help(&self) -> CommandHelp {
        match self {
            CommandHandler::Text(cmd) => cmd.help(),
            CommandHandler::Slash(cmd) => cmd.definition().to_help(),
        }
    }

    pub fn config(&self) -> CommandConfig {
        match self {
            CommandHandler::Text(cmd) => cmd.config(),
            CommandHandler::Slash(cmd) => cmd.config(),
        }
    }

    pub fn slash_definition(&self) -> Option<SlashDefinition> {
        match self {
            CommandHandler::Slash(cmd) => Some(cmd.definition()),
            CommandHandler::Text(_) => None,
        }
    }

    pub async fn exit(&self) -> Result<(), BotError> {
        match self {
            CommandHandler::Text(cmd) => cmd.exit().await,
            CommandHandler::Slash(cmd) => cmd.exit().await,
        }
    }
}

impl fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandHandler::{}", self.kind())
    }
}

/// A constructed event handler, tagged by variant
#[derive(Clone)]
pub enum EventHandler {
    Core(Arc<dyn CoreEvent>),
    Custom(Arc<dyn CustomEvent>),
}

impl EventHandler {
    pub fn core<T: CoreEvent + 'static>(handler: T) -> Self {
        EventHandler::Core(Arc::new(handler))
    }

    pub fn custom<T: CustomEvent + 'static>(handler: T) -> Self {
        EventHandler::Custom(Arc::new(handler))
    }

    pub fn is_core(&self) -> bool {
        matches!(self, EventHandler::Core(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EventHandler::Core(_) => "core",
            EventHandler::Custom(_) => "custom",
        }
    }

    pub async fn exit(&self) -> Result<(), BotError> {
        match self {
            EventHandler::Core(h) => h.exit().await,
            EventHandler::Custom(h) => h.exit().await,
        }
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler::{}", self.kind())
    }
}

/// A constructed module, kept both as a trait object and as `Any` for
/// typed lookup
#[derive(Clone)]
pub struct ModuleInstance {
    handler: Arc<dyn Module>,
    any: Arc<dyn Any + Send + Sync>,
}

impl ModuleInstance {
    pub fn new<M: Module + 'static>(module: M) -> Self {
        let module = Arc::new(module);
        Self {
            handler: module.clone(),
            any: module,
        }
    }

    pub fn handler(&self) -> &Arc<dyn Module> {
        &self.handler
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.any.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModuleInstance")
    }
}
