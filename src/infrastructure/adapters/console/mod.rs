//! Console client for development/testing
//!
//! Implements [`Client`] without a network: messages typed on stdin become
//! `message` events, replies are printed and kept in an outbox.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::application::errors::BotError;
use crate::domain::entities::{
    Event, IntentSet, Interaction, Intent, Message, SlashDefinition, User,
};
use crate::domain::traits::{Client, ClientInfo, ClientOptions, Listener};

/// Channel the console session talks in
pub const CONSOLE_CHANNEL: &str = "console";

/// Something the client sent back to the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel_id: String,
    pub text: String,
}

/// Console client for local development
pub struct ConsoleClient {
    info: ClientInfo,
    intents: IntentSet,
    echo: bool,
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    sent: Mutex<Vec<SentMessage>>,
    commands: Mutex<BTreeMap<String, SlashDefinition>>,
    logged_in: Mutex<bool>,
}

impl ConsoleClient {
    pub fn new() -> Self {
        Self::with_options(ClientOptions {
            intents: Intent::defaults(),
        })
    }

    pub fn with_options(options: ClientOptions) -> Self {
        Self {
            info: ClientInfo {
                id: "console".to_string(),
                name: "tether-bot".to_string(),
                username: "console".to_string(),
            },
            intents: options.intents,
            echo: false,
            listeners: RwLock::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            commands: Mutex::new(BTreeMap::new()),
            logged_in: Mutex::new(false),
        }
    }

    /// Print outgoing messages to stdout
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Deliver an event to every listener for its name. Returns how many
    /// listeners were called.
    pub fn emit(&self, event: Event) -> usize {
        let listeners: Vec<Listener> = match self.listeners.read() {
            Ok(map) => map.get(&event.name).cloned().unwrap_or_default(),
            Err(_) => return 0,
        };
        for listener in &listeners {
            listener(event.clone());
        }
        listeners.len()
    }

    /// Messages sent so far, oldest first
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Application commands currently registered, keyed by id
    pub fn application_commands(&self) -> BTreeMap<String, SlashDefinition> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.lock().map(|l| *l).unwrap_or(false)
    }

    /// Read stdin until EOF, emitting each line as a `message` event. Lines
    /// starting with `/` become interactions.
    pub async fn run_stdin(&self, user: User) -> Result<(), BotError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| BotError::platform(format!("stdin: {}", e)))?
        {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.strip_prefix('/') {
                Some(slash) if !slash.is_empty() => {
                    let mut parts = slash.split_whitespace();
                    let name = parts.next().unwrap_or_default().to_lowercase();
                    let mut interaction = Interaction::new(CONSOLE_CHANNEL, user.clone(), name);
                    for part in parts {
                        if let Some((key, value)) = part.split_once('=') {
                            interaction = interaction.with_option(key, serde_json::Value::String(value.to_string()));
                        }
                    }
                    self.emit(Event::interaction(interaction));
                }
                _ => {
                    let message = Message::new(CONSOLE_CHANNEL, line).with_author(user.clone());
                    self.emit(Event::message(message));
                }
            }
        }
        Ok(())
    }

    fn record(&self, channel_id: &str, text: &str) {
        if self.echo {
            println!("[BOT] {}", text);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMessage {
                channel_id: channel_id.to_string(),
                text: text.to_string(),
            });
        }
    }
}

impl Default for ConsoleClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Client for ConsoleClient {
    fn on(&self, event: &str, listener: Listener) {
        match self.listeners.write() {
            Ok(mut map) => map.entry(event.to_lowercase()).or_default().push(listener),
            Err(_) => warn!("Console listener table poisoned, dropping subscription to '{}'", event),
        }
    }

    async fn login(&self, token: &str) -> Result<(), BotError> {
        if token.trim().is_empty() {
            return Err(BotError::platform("Empty token"));
        }
        if let Ok(mut logged_in) = self.logged_in.lock() {
            *logged_in = true;
        }
        info!("Console client logged in as {}", self.info.username);
        self.emit(Event::ready(self.info.clone()));
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BotError> {
        self.record(channel_id, text);
        Ok(uuid::Uuid::new_v4().to_string())
    }

    async fn reply_interaction(&self, interaction: &Interaction, text: &str) -> Result<(), BotError> {
        self.record(&interaction.channel_id, text);
        Ok(())
    }

    async fn create_application_command(&self, definition: &SlashDefinition) -> Result<String, BotError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.commands
            .lock()
            .map_err(|_| BotError::poisoned())?
            .insert(id.clone(), definition.clone());
        debug!("Created application command /{} ({})", definition.name, id);
        Ok(id)
    }

    async fn edit_application_command(&self, id: &str, definition: &SlashDefinition) -> Result<(), BotError> {
        let mut commands = self.commands.lock().map_err(|_| BotError::poisoned())?;
        match commands.get_mut(id) {
            Some(existing) => {
                *existing = definition.clone();
                Ok(())
            }
            None => Err(BotError::NotFound(format!("application command {}", id))),
        }
    }

    async fn delete_application_command(&self, id: &str) -> Result<(), BotError> {
        self.commands
            .lock()
            .map_err(|_| BotError::poisoned())?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BotError::NotFound(format!("application command {}", id)))
    }

    async fn destroy(&self) -> Result<(), BotError> {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.clear();
        }
        if let Ok(mut logged_in) = self.logged_in.lock() {
            *logged_in = false;
        }
        info!("Console client destroyed");
        Ok(())
    }

    fn info(&self) -> ClientInfo {
        self.info.clone()
    }

    fn intents(&self) -> IntentSet {
        self.intents.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::EventPayload;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_login_emits_ready() {
        let client = ConsoleClient::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        client.on(
            "ready",
            Arc::new(move |event: Event| {
                assert!(matches!(event.payload, EventPayload::Ready(_)));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        client.login("token").await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(client.is_logged_in());
        assert!(client.login("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_outbox_records_replies() {
        let client = ConsoleClient::new();
        client.send_message("general", "hello").await.unwrap();
        let sent = client.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel_id, "general");
        assert_eq!(sent[0].text, "hello");
    }

    #[tokio::test]
    async fn test_application_command_lifecycle() {
        let client = ConsoleClient::new();
        let def = SlashDefinition::new("about", "About the bot");
        let id = client.create_application_command(&def).await.unwrap();
        let edited = SlashDefinition::new("about", "Changed");
        client.edit_application_command(&id, &edited).await.unwrap();
        assert_eq!(client.application_commands()[&id].description, "Changed");
        client.delete_application_command(&id).await.unwrap();
        assert!(client.delete_application_command(&id).await.is_err());
    }

    #[test]
    fn test_emit_without_listeners() {
        let client = ConsoleClient::new();
        assert_eq!(client.emit(Event::new("message", EventPayload::Empty)), 0);
    }
}
