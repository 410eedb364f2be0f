//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Managers: command, event and module registries
//! - Messaging: prefix parsing, argument parsing, help and dispatch
//! - Services: the core orchestrator
//! - Errors: error types and exit codes

pub mod context;
pub mod errors;
pub mod managers;
pub mod messaging;
pub mod services;
