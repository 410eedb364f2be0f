//! Shared handles passed into every handler invocation

use std::sync::Arc;

use crate::application::errors::BotError;
use crate::application::managers::{CommandManager, ModuleManager, RegisteredCommand};
use crate::application::messaging::parser::ParsedArgs;
use crate::domain::entities::{Event, Interaction, Message};
use crate::domain::traits::Client;

/// Runtime settings handlers may read
#[derive(Debug, Clone)]
pub struct Settings {
    pub prefix: String,
    pub production: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            production: false,
        }
    }
}

/// Everything a handler can reach. Built once at startup and cloned into
/// dispatch tasks.
#[derive(Clone)]
pub struct Services {
    pub client: Arc<dyn Client>,
    pub commands: Arc<CommandManager>,
    pub modules: Arc<ModuleManager>,
    pub settings: Arc<Settings>,
}

impl Services {
    pub fn new(
        client: Arc<dyn Client>,
        commands: Arc<CommandManager>,
        modules: Arc<ModuleManager>,
        settings: Settings,
    ) -> Self {
        Self {
            client,
            commands,
            modules,
            settings: Arc::new(settings),
        }
    }
}

/// Context for one event occurrence
#[derive(Clone)]
pub struct EventContext {
    pub services: Services,
    pub event: Arc<Event>,
}

impl EventContext {
    pub fn new(services: Services, event: Arc<Event>) -> Self {
        Self { services, event }
    }
}

/// Context for one text command invocation
pub struct CommandContext {
    pub services: Services,
    pub message: Message,
    pub args: ParsedArgs,
    pub command: Arc<RegisteredCommand>,
}

impl CommandContext {
    /// Send text back to the channel the command came from
    pub async fn reply(&self, text: &str) -> Result<String, BotError> {
        self.services
            .client
            .send_message(&self.message.channel_id, text)
            .await
    }

    pub fn prefix(&self) -> &str {
        &self.services.settings.prefix
    }
}

/// Context for one slash command invocation
pub struct InteractionContext {
    pub services: Services,
    pub interaction: Interaction,
    pub command: Arc<RegisteredCommand>,
}

impl InteractionContext {
    pub async fn reply(&self, text: &str) -> Result<(), BotError> {
        self.services
            .client
            .reply_interaction(&self.interaction, text)
            .await
    }
}
