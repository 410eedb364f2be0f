//! Command dispatcher - routes prefixed messages and slash interactions to
//! registered commands

use std::time::Duration;
use tracing::{debug, error, warn};

use super::help::{render_command_help, render_usage};
use super::parser::{parse_args, MessageParser};
use crate::application::context::{CommandContext, InteractionContext, Services};
use crate::application::errors::CommandError;
use crate::application::managers::RegisteredCommand;
use crate::domain::entities::{Interaction, Message};
use crate::plugins::builtin::cooldowns::{CooldownModule, COOLDOWN_MODULE};
use crate::plugins::trait_def::CommandHandler;

/// What happened to one incoming message or interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Bot author, missing prefix or empty name
    NotACommand,
    Unknown(String),
    /// Help text was sent instead of running
    Help,
    /// Usage was sent because the command needs arguments
    Usage,
    /// Refused before running; the reason was sent to the user
    Refused(String),
    Ran,
    Failed(String),
}

pub struct CommandDispatcher {
    parser: MessageParser,
}

impl CommandDispatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            parser: MessageParser::new(prefix),
        }
    }

    pub fn from_services(services: &Services) -> Self {
        Self::new(services.settings.prefix.clone())
    }

    pub async fn handle_message(&self, services: &Services, message: &Message) -> CommandOutcome {
        if message.is_from_bot() {
            return CommandOutcome::NotACommand;
        }
        let Some(invocation) = self.parser.parse(&message.content) else {
            return CommandOutcome::NotACommand;
        };

        let Some(command) = services.commands.get_command(&invocation.name, true) else {
            debug!("Unknown command: {}", invocation.name);
            return CommandOutcome::Unknown(invocation.name);
        };
        let CommandHandler::Text(handler) = &command.handler else {
            debug!("'{}' is a slash command, ignoring text invocation", command.name);
            return CommandOutcome::Unknown(invocation.name);
        };

        if command.config.guild_only && message.guild_id.is_none() {
            return self.refuse(services, message, CommandError::GuildOnly).await;
        }

        let args = match parse_args(&invocation.rest, &command.help.flags) {
            Ok(args) => args,
            Err(e) => return self.refuse(services, message, e).await,
        };

        if args.wants_help() {
            let text = render_command_help(&command, self.parser.prefix());
            self.send(services, message, &text).await;
            return CommandOutcome::Help;
        }
        if command.config.usage_if_not_set && args.is_empty() {
            let text = format!("Usage: {}", render_usage(&command, self.parser.prefix()));
            self.send(services, message, &text).await;
            return CommandOutcome::Usage;
        }

        if let Some(user) = message.author_id() {
            if let Err(e) = check_cooldown(services, &command, user) {
                return self.refuse(services, message, e).await;
            }
        }

        let handler = handler.clone();
        let ctx = CommandContext {
            services: services.clone(),
            message: message.clone(),
            args,
            command: command.clone(),
        };
        match handler.run(&ctx).await {
            Ok(()) => CommandOutcome::Ran,
            Err(e) => {
                error!("Command '{}' failed: {:?}", command.name, e);
                let text = format!("Command execution error: {}", e);
                self.send(services, message, &text).await;
                CommandOutcome::Failed(e.to_string())
            }
        }
    }

    pub async fn handle_interaction(&self, services: &Services, interaction: &Interaction) -> CommandOutcome {
        let Some(command) = services.commands.get_command(&interaction.command_name, true) else {
            warn!("Interaction for unknown command: {}", interaction.command_name);
            return CommandOutcome::Unknown(interaction.command_name.clone());
        };
        let CommandHandler::Slash(handler) = &command.handler else {
            warn!("'{}' is not a slash command", command.name);
            return CommandOutcome::Unknown(interaction.command_name.clone());
        };

        if command.config.guild_only && interaction.guild_id.is_none() {
            let reason = CommandError::GuildOnly.to_string();
            reply_interaction(services, interaction, &reason).await;
            return CommandOutcome::Refused(reason);
        }
        if let Err(e) = check_cooldown(services, &command, &interaction.user.id) {
            let reason = e.to_string();
            reply_interaction(services, interaction, &reason).await;
            return CommandOutcome::Refused(reason);
        }

        let handler = handler.clone();
        let ctx = InteractionContext {
            services: services.clone(),
            interaction: interaction.clone(),
            command: command.clone(),
        };
        match handler.execute(&ctx).await {
            Ok(()) => CommandOutcome::Ran,
            Err(e) => {
                error!("Slash command '{}' failed: {:?}", command.name, e);
                let text = format!("Command execution error: {}", e);
                reply_interaction(services, interaction, &text).await;
                CommandOutcome::Failed(e.to_string())
            }
        }
    }

    async fn refuse(&self, services: &Services, message: &Message, reason: CommandError) -> CommandOutcome {
        let text = reason.to_string();
        self.send(services, message, &text).await;
        CommandOutcome::Refused(text)
    }

    async fn send(&self, services: &Services, message: &Message, text: &str) {
        if let Err(e) = services.client.send_message(&message.channel_id, text).await {
            error!("Failed to reply in {}: {}", message.channel_id, e);
        }
    }
}

async fn reply_interaction(services: &Services, interaction: &Interaction, text: &str) {
    if let Err(e) = services.client.reply_interaction(interaction, text).await {
        error!("Failed to answer interaction {}: {}", interaction.id, e);
    }
}

fn check_cooldown(services: &Services, command: &RegisteredCommand, user: &str) -> Result<(), CommandError> {
    let Some(seconds) = command.config.cooldown.filter(|s| *s > 0) else {
        return Ok(());
    };
    let Some(cooldowns) = services.modules.get_as::<CooldownModule>(COOLDOWN_MODULE) else {
        return Ok(());
    };
    match cooldowns.check(user, &command.name, Duration::from_secs(seconds)) {
        Some(remaining) => Err(CommandError::Cooldown(remaining)),
        None => Ok(()),
    }
}
