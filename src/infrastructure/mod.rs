//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: configuration file and environment overlay
//! - Logging: tracing subscriber setup
//! - Plugins: plugin discovery, loading and hot reload
//! - Storage: persisted slash command ids
//! - Adapters: platform clients

pub mod adapters;
pub mod config;
pub mod logging;
pub mod plugins;
pub mod storage;
