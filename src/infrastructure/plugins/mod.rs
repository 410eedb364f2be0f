//! Plugin files: discovery, manifests, factory catalog, loaders and hot reload
//!
//! Plugins are YAML manifests resolved against a [`PluginCatalog`] of
//! factories compiled into the binary.

pub mod catalog;
pub mod discovery;
pub mod loader;
pub mod manifest;
pub mod watcher;

pub use catalog::{PluginCatalog, PluginOptions};
pub use discovery::{DiscoveredFile, PluginRoots};
pub use loader::{CommandLoader, EventLoader, LoadReport, Loader, ModuleLoader, Reload, ReloadOutcome};
pub use manifest::PluginManifest;
pub use watcher::{HotReloader, PluginWatcher};
