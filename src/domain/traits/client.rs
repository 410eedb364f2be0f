use async_trait::async_trait;
use std::sync::Arc;
use crate::domain::entities::{Event, Interaction, IntentSet, SlashDefinition};
use crate::application::errors::BotError;

/// Callback registered for one named event
pub type Listener = Arc<dyn Fn(Event) + Send + Sync>;

/// Client trait - abstraction over the chat platform SDK
#[async_trait]
pub trait Client: Send + Sync {
    /// Subscribe to a named event. Multiple listeners per name are allowed.
    fn on(&self, event: &str, listener: Listener);

    /// Authenticate and start receiving events
    async fn login(&self, token: &str) -> Result<(), BotError>;

    /// Send a message to a channel, returning the new message id
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BotError>;

    /// Respond to a slash command invocation
    async fn reply_interaction(&self, interaction: &Interaction, text: &str) -> Result<(), BotError>;

    /// Register an application command, returning its platform id
    async fn create_application_command(&self, definition: &SlashDefinition) -> Result<String, BotError>;

    async fn edit_application_command(&self, id: &str, definition: &SlashDefinition) -> Result<(), BotError>;

    async fn delete_application_command(&self, id: &str) -> Result<(), BotError>;

    /// Disconnect and release resources
    async fn destroy(&self) -> Result<(), BotError> {
        Ok(())
    }

    /// Get client identity
    fn info(&self) -> ClientInfo;

    /// Intents the client was constructed with
    fn intents(&self) -> IntentSet;
}

/// Client identity
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}

/// Options a client is constructed with
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub intents: IntentSet,
}
