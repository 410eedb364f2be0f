//! `help` command

use async_trait::async_trait;

use crate::application::context::CommandContext;
use crate::application::errors::BotError;
use crate::application::messaging::help::{render_command_help, render_overview};
use crate::domain::entities::{CommandConfig, CommandHelp};
use crate::infrastructure::plugins::PluginOptions;
use crate::plugins::trait_def::{CommandHandler, TextCommand};

pub struct HelpCommand;

#[async_trait]
impl TextCommand for HelpCommand {
    fn help(&self) -> CommandHelp {
        CommandHelp::new(vec!["help", "h", "commands"])
            .with_description("List commands, or show help for one")
            .with_usage("[command]")
            .with_example("help")
            .with_example("help ping")
    }

    fn config(&self) -> CommandConfig {
        CommandConfig {
            hide_flags: true,
            ..Default::default()
        }
    }

    async fn run(&self, ctx: &CommandContext) -> Result<(), BotError> {
        let commands = &ctx.services.commands;
        let text = match ctx.args.arg(0) {
            Some(name) => {
                let name = name.trim_start_matches(ctx.prefix()).trim_start_matches('/');
                match commands.get_command(name, false) {
                    Some(cmd) => render_command_help(&cmd, ctx.prefix()),
                    None => format!("Unknown command: {}", name),
                }
            }
            None => render_overview(&commands.get_commands_grouped(false), ctx.prefix()),
        };
        ctx.reply(&text).await?;
        Ok(())
    }
}

pub fn factory(_options: &PluginOptions) -> Result<CommandHandler, BotError> {
    Ok(CommandHandler::text(HelpCommand))
}
