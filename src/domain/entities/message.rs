use super::User;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A chat message received from the platform
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    /// `None` for direct messages
    pub guild_id: Option<String>,
    pub author: Option<User>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub raw: Option<serde_json::Value>,
}

impl Message {
    pub fn new(channel_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel_id: channel_id.into(),
            guild_id: None,
            author: None,
            content: content.into(),
            timestamp: Utc::now(),
            raw: None,
        }
    }

    pub fn with_author(mut self, user: User) -> Self {
        self.author = Some(user);
        self
    }

    pub fn in_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn is_from_bot(&self) -> bool {
        self.author.as_ref().map(|u| u.is_bot).unwrap_or(false)
    }

    pub fn author_id(&self) -> Option<&str> {
        self.author.as_ref().map(|u| u.id.as_str())
    }
}

/// A slash command invocation
#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub user: User,
    pub command_name: String,
    pub options: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl Interaction {
    pub fn new(channel_id: impl Into<String>, user: User, command_name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel_id: channel_id.into(),
            guild_id: None,
            user,
            command_name: command_name.into(),
            options: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn in_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(name.into(), value);
        self
    }

    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.options.get(name).and_then(|v| v.as_str())
    }
}
