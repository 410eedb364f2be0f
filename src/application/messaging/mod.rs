//! Message handling - prefix parsing, argument parsing, help and dispatch

pub mod dispatcher;
pub mod help;
pub mod parser;

pub use dispatcher::{CommandDispatcher, CommandOutcome};
pub use parser::{MessageParser, ParsedArgs};
