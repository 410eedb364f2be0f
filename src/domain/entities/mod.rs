//! Domain entities - Core business objects with no external dependencies

pub mod user;
pub mod message;
pub mod command;
pub mod event;
pub mod intent;

pub use user::User;
pub use message::{Message, Interaction};
pub use command::{
    CommandConfig, CommandHelp, CommandName, FlagDef, SlashDefinition, SlashOption, SlashOptionKind,
};
pub use event::{names as event_names, Event, EventPayload};
pub use intent::{Intent, IntentSet};
