//! Core `message` event: text command dispatch

use async_trait::async_trait;

use crate::application::context::EventContext;
use crate::application::errors::BotError;
use crate::application::messaging::CommandDispatcher;
use crate::infrastructure::plugins::PluginOptions;
use crate::plugins::trait_def::{CoreEvent, EventHandler};

pub struct MessageEvent;

#[async_trait]
impl CoreEvent for MessageEvent {
    async fn every(&self, ctx: &EventContext) -> Result<bool, BotError> {
        if let Some(message) = ctx.event.as_message() {
            CommandDispatcher::from_services(&ctx.services)
                .handle_message(&ctx.services, message)
                .await;
        }
        Ok(false)
    }
}

pub fn factory(_options: &PluginOptions) -> Result<EventHandler, BotError> {
    Ok(EventHandler::core(MessageEvent))
}
