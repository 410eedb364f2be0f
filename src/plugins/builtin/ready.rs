//! Core `ready` event

use async_trait::async_trait;
use tracing::info;

use crate::application::context::EventContext;
use crate::application::errors::BotError;
use crate::domain::entities::EventPayload;
use crate::infrastructure::plugins::PluginOptions;
use crate::plugins::trait_def::{CoreEvent, EventHandler};

pub struct ReadyEvent;

#[async_trait]
impl CoreEvent for ReadyEvent {
    async fn every(&self, ctx: &EventContext) -> Result<bool, BotError> {
        if let EventPayload::Ready(info) = &ctx.event.payload {
            info!(
                "Connected as {} ({}) with {} commands, prefix '{}'",
                info.username,
                info.id,
                ctx.services.commands.len(),
                ctx.services.settings.prefix
            );
        }
        Ok(false)
    }

    fn once(&self) -> bool {
        true
    }
}

pub fn factory(_options: &PluginOptions) -> Result<EventHandler, BotError> {
    Ok(EventHandler::core(ReadyEvent))
}
