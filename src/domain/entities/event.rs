use super::{Interaction, Message, User};
use crate::domain::traits::ClientInfo;

/// Well-known platform event names
pub mod names {
    pub const READY: &str = "ready";
    pub const MESSAGE: &str = "message";
    pub const INTERACTION: &str = "interaction";
    pub const MEMBER_JOIN: &str = "member_join";
    pub const RAW: &str = "raw";
    pub const DEBUG: &str = "debug";

    /// Wire-level noise that is never fanned out to plugins
    pub const IGNORED: [&str; 2] = [RAW, DEBUG];

    pub fn is_ignored(name: &str) -> bool {
        IGNORED.contains(&name)
    }
}

/// Event data carried to handlers
#[derive(Debug, Clone)]
pub enum EventPayload {
    Ready(ClientInfo),
    Message(Message),
    Interaction(Interaction),
    MemberJoin { guild_id: String, user: User },
    Raw(serde_json::Value),
    Empty,
}

/// One occurrence of a named platform event
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            name: name.into().to_lowercase(),
            payload,
        }
    }

    pub fn message(message: Message) -> Self {
        Self::new(names::MESSAGE, EventPayload::Message(message))
    }

    pub fn interaction(interaction: Interaction) -> Self {
        Self::new(names::INTERACTION, EventPayload::Interaction(interaction))
    }

    pub fn ready(info: ClientInfo) -> Self {
        Self::new(names::READY, EventPayload::Ready(info))
    }

    pub fn as_message(&self) -> Option<&Message> {
        match &self.payload {
            EventPayload::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_interaction(&self) -> Option<&Interaction> {
        match &self.payload {
            EventPayload::Interaction(i) => Some(i),
            _ => None,
        }
    }
}
