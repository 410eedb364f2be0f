//! `ping` command

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::application::context::CommandContext;
use crate::application::errors::BotError;
use crate::domain::entities::{CommandConfig, CommandHelp, FlagDef};
use crate::infrastructure::plugins::PluginOptions;
use crate::plugins::trait_def::{CommandHandler, TextCommand};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PingOptions {
    pub response: String,
    /// Seconds between uses per user
    pub cooldown: Option<u64>,
}

impl Default for PingOptions {
    fn default() -> Self {
        Self {
            response: "Pong!".to_string(),
            cooldown: Some(3),
        }
    }
}

pub struct PingCommand {
    options: PingOptions,
}

impl PingCommand {
    pub fn new(options: PingOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl TextCommand for PingCommand {
    fn help(&self) -> CommandHelp {
        CommandHelp::new("ping")
            .with_description("Check that the bot is responding")
            .with_example("ping")
            .with_example("ping --verbose")
            .with_flag(FlagDef::new("verbose", "Include latency and connection details").with_short('v'))
    }

    fn config(&self) -> CommandConfig {
        CommandConfig {
            cooldown: self.options.cooldown,
            ..Default::default()
        }
    }

    async fn run(&self, ctx: &CommandContext) -> Result<(), BotError> {
        if !ctx.args.has_flag("verbose") {
            ctx.reply(&self.options.response).await?;
            return Ok(());
        }
        let latency = (Utc::now() - ctx.message.timestamp).num_milliseconds().max(0);
        let info = ctx.services.client.info();
        let text = format!(
            "{} latency {}ms, connected as {}, {} commands loaded",
            self.options.response,
            latency,
            info.username,
            ctx.services.commands.len()
        );
        ctx.reply(&text).await?;
        Ok(())
    }
}

pub fn factory(options: &PluginOptions) -> Result<CommandHandler, BotError> {
    Ok(CommandHandler::text(PingCommand::new(options.parse()?)))
}
