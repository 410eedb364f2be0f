//! Registries for commands, events and modules
//!
//! Each manager keeps a core and a custom partition keyed by lowercase name.
//! Managers are constructed once at startup and shared through `Arc`.

pub mod command_manager;
pub mod event_manager;
pub mod module_manager;

pub use command_manager::{CommandManager, RegisteredCommand, DEFAULT_GROUP};
pub use event_manager::{DispatchOutcome, EventManager, RegisteredEvent};
pub use module_manager::{ModuleFilter, ModuleManager, RegisteredModule};
