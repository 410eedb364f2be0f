//! Core `interaction` event: slash command dispatch

use async_trait::async_trait;

use crate::application::context::EventContext;
use crate::application::errors::BotError;
use crate::application::messaging::CommandDispatcher;
use crate::infrastructure::plugins::PluginOptions;
use crate::plugins::trait_def::{CoreEvent, EventHandler};

pub struct InteractionEvent;

#[async_trait]
impl CoreEvent for InteractionEvent {
    async fn every(&self, ctx: &EventContext) -> Result<bool, BotError> {
        if let Some(interaction) = ctx.event.as_interaction() {
            CommandDispatcher::from_services(&ctx.services)
                .handle_interaction(&ctx.services, interaction)
                .await;
        }
        Ok(false)
    }
}

pub fn factory(_options: &PluginOptions) -> Result<EventHandler, BotError> {
    Ok(EventHandler::core(InteractionEvent))
}
