//! `/about` slash command

use async_trait::async_trait;

use crate::application::context::InteractionContext;
use crate::application::errors::BotError;
use crate::application::managers::ModuleFilter;
use crate::domain::entities::SlashDefinition;
use crate::infrastructure::plugins::PluginOptions;
use crate::plugins::trait_def::{CommandHandler, SlashCommand};

pub struct AboutCommand;

#[async_trait]
impl SlashCommand for AboutCommand {
    fn definition(&self) -> SlashDefinition {
        SlashDefinition::new("about", "Show what this bot is running")
    }

    async fn execute(&self, ctx: &InteractionContext) -> Result<(), BotError> {
        let services = &ctx.services;
        let info = services.client.info();
        let modules = services.modules.get_modules(&ModuleFilter::default());
        let text = format!(
            "{} v{} ({}): {} commands, {} modules [{}]",
            info.name,
            env!("CARGO_PKG_VERSION"),
            info.username,
            services.commands.len(),
            modules.len(),
            modules.iter().map(|m| m.name.as_str()).collect::<Vec<_>>().join(", ")
        );
        ctx.reply(&text).await
    }
}

pub fn factory(_options: &PluginOptions) -> Result<CommandHandler, BotError> {
    Ok(CommandHandler::slash(AboutCommand))
}
