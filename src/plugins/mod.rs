//! Plugin contracts and the built-in plugins
//!
//! Commands, events and modules are resolved from YAML manifests through the
//! `PluginCatalog`; this module defines what a factory must produce.

pub mod builtin;
pub mod trait_def;

pub use trait_def::{
    CommandHandler, CoreEvent, CustomEvent, EventHandler, Module, ModuleInstance, PluginKind, SlashCommand,
    TextCommand,
};
