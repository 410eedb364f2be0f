//! Plugins shipped with the bot
//!
//! Their manifests live under `src/commands`, `src/events` and `src/modules`.

pub mod about;
pub mod cooldowns;
pub mod help;
pub mod interaction;
pub mod message;
pub mod ping;
pub mod ready;

use crate::domain::entities::Intent;
use crate::infrastructure::plugins::PluginCatalog;

/// Add every built-in factory to the catalog
pub fn register_builtins(catalog: &mut PluginCatalog) {
    catalog
        .command("help", help::factory)
        .command("ping", ping::factory)
        .command("about", about::factory)
        .event("ready", [Intent::Guilds], ready::factory)
        .event(
            "message",
            [Intent::GuildMessages, Intent::DirectMessages, Intent::MessageContent],
            message::factory,
        )
        .event("interaction", [Intent::Guilds], interaction::factory)
        .module(cooldowns::COOLDOWN_MODULE, cooldowns::factory);
}

/// Catalog holding only the built-ins
pub fn catalog() -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    register_builtins(&mut catalog);
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::{Services, Settings};
    use crate::application::managers::{CommandManager, ModuleManager};
    use crate::application::messaging::{CommandDispatcher, CommandOutcome};
    use crate::domain::entities::{Interaction, Message, User};
    use crate::infrastructure::adapters::console::ConsoleClient;
    use crate::infrastructure::plugins::PluginOptions;
    use crate::plugins::trait_def::PluginKind;
    use std::sync::Arc;

    fn setup() -> (Arc<ConsoleClient>, Services) {
        let catalog = catalog();
        let options = PluginOptions::new("builtin");
        let commands = Arc::new(CommandManager::new());
        for key in ["help", "ping", "about"] {
            let handler = catalog.build_command(key, &options).unwrap();
            commands.register(handler, key, "default", true).unwrap();
        }
        let modules = Arc::new(ModuleManager::new());
        let cooldowns = catalog.build_module("cooldowns", &options).unwrap();
        modules.register(cooldowns, "cooldowns", "cooldowns", "default", true).unwrap();

        let client = Arc::new(ConsoleClient::new());
        let services = Services::new(client.clone(), commands, modules, Settings::default());
        (client, services)
    }

    fn from_user(text: &str) -> Message {
        Message::new("general", text).with_author(User::new("u1"))
    }

    #[test]
    fn test_catalog_contents() {
        let catalog = catalog();
        assert_eq!(catalog.keys(PluginKind::Command), vec!["about", "help", "ping"]);
        assert!(catalog.event_intents("message").unwrap().contains(&Intent::MessageContent));
        assert!(catalog.contains(PluginKind::Module, "cooldowns"));
    }

    #[tokio::test]
    async fn test_help_alias_lists_commands() {
        let (client, services) = setup();
        let dispatcher = CommandDispatcher::from_services(&services);

        let outcome = dispatcher.handle_message(&services, &from_user("!commands")).await;
        assert_eq!(outcome, CommandOutcome::Ran);
        let reply = &client.sent()[0].text;
        assert!(reply.contains("[core]"));
        assert!(reply.contains("!ping"));
        assert!(reply.contains("/about"));
    }

    #[tokio::test]
    async fn test_ping_and_cooldown() {
        let (client, services) = setup();
        let dispatcher = CommandDispatcher::from_services(&services);

        assert_eq!(dispatcher.handle_message(&services, &from_user("!ping")).await, CommandOutcome::Ran);
        let second = dispatcher.handle_message(&services, &from_user("!ping -v")).await;
        assert!(matches!(second, CommandOutcome::Refused(_)));

        let sent = client.sent();
        assert_eq!(sent[0].text, "Pong!");
        assert!(sent[1].text.starts_with("Slow down"));
    }

    #[tokio::test]
    async fn test_about_is_slash_only() {
        let (client, services) = setup();
        let dispatcher = CommandDispatcher::from_services(&services);

        let text = dispatcher.handle_message(&services, &from_user("!about")).await;
        assert_eq!(text, CommandOutcome::Unknown("about".into()));

        let interaction = Interaction::new("general", User::new("u1"), "about");
        let outcome = dispatcher.handle_interaction(&services, &interaction).await;
        assert_eq!(outcome, CommandOutcome::Ran);
        assert!(client.sent()[0].text.contains("3 commands, 1 modules [cooldowns]"));
    }
}
