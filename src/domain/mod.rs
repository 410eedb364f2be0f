//! Domain layer - Core business objects
//!
//! This layer contains:
//! - Entities: messages, events, command metadata, intents
//! - Traits: the platform client abstraction

pub mod entities;
pub mod traits;
