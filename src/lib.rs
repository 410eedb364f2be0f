//! tether-bot: a chat bot framework built around hot-reloadable plugins

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;
