use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tether_bot::application::context::CommandContext;
use tether_bot::application::errors::BotError;
use tether_bot::application::managers::{CommandManager, EventManager, ModuleManager};
use tether_bot::domain::entities::{CommandHelp, Intent};
use tether_bot::infrastructure::adapters::ConsoleClient;
use tether_bot::infrastructure::plugins::{
    CommandLoader, EventLoader, Loader, ModuleLoader, PluginCatalog, PluginOptions, PluginRoots, ReloadOutcome,
};
use tether_bot::infrastructure::storage::SlashCommandStore;
use tether_bot::plugins::{builtin, CommandHandler, EventHandler, Module, ModuleInstance, PluginKind, TextCommand};

/// Command named after its file, replying with a configurable greeting
struct Named {
    name: String,
    greeting: String,
}

#[async_trait]
impl TextCommand for Named {
    fn help(&self) -> CommandHelp {
        CommandHelp::new(self.name.as_str()).with_description(self.greeting.clone())
    }

    async fn run(&self, ctx: &CommandContext) -> Result<(), BotError> {
        ctx.reply(&self.greeting).await?;
        Ok(())
    }
}

struct Counter {
    start: u64,
}

impl Module for Counter {}

fn catalog() -> Arc<PluginCatalog> {
    let mut catalog = PluginCatalog::new();
    builtin::register_builtins(&mut catalog);
    catalog
        .command("named", |options: &PluginOptions| {
            Ok(CommandHandler::text(Named {
                name: options.get_str("name").unwrap_or(&options.name).to_string(),
                greeting: options.get_str("greeting").unwrap_or("hi").to_string(),
            }))
        })
        .command("broken", |_options: &PluginOptions| {
            Err(BotError::Internal("factory exploded".into()))
        })
        .event("greeter", [Intent::GuildMembers], |_options: &PluginOptions| {
            Ok(EventHandler::core(builtin::ready::ReadyEvent))
        })
        .module("counter", |options: &PluginOptions| {
            Ok(ModuleInstance::new(Counter {
                start: options.get_u64("start").unwrap_or(0),
            }))
        });
    Arc::new(catalog)
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn roots(dir: &Path, kind: PluginKind) -> PluginRoots {
    PluginRoots::for_kind(&dir.join("src"), dir, kind)
}

#[tokio::test]
async fn test_bad_files_do_not_abort_the_pass() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("src/commands/hello.yaml"), "handler: named\n");
    write(&root.join("commands/wave.yaml"), "handler: named\n");
    write(&root.join("commands/fun/jump.yaml"), "handler: named\n");
    write(&root.join("commands/bad.yaml"), "handler: broken\n");
    write(&root.join("commands/off.yaml"), "handler: named\nenabled: false\n");
    write(&root.join("commands/_draft.yaml"), "handler: named\n");
    write(&root.join("commands/notes.txt"), "not a plugin");

    let manager = Arc::new(CommandManager::new());
    let loader = CommandLoader::new(roots(root, PluginKind::Command), catalog(), manager.clone());
    let report = loader.load().await;

    let mut loaded = report.loaded.clone();
    loaded.sort();
    assert_eq!(loaded, vec!["hello", "jump", "wave"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("factory exploded"));
    assert!(report.core_failures().is_empty());

    assert!(manager.get_command("hello", false).unwrap().is_core);
    assert_eq!(manager.get_command("jump", false).unwrap().group, "fun");
    assert!(manager.get_command("draft", true).is_none());
    assert!(manager.get_command("off", true).is_none());
}

#[tokio::test]
async fn test_missing_folders_load_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(ModuleManager::new());
    let loader = ModuleLoader::new(roots(&dir.path().join("absent"), PluginKind::Module), catalog(), manager.clone());

    let report = loader.load().await;
    assert!(report.loaded.is_empty());
    assert!(report.failed.is_empty());
    assert!(manager.is_empty());
}

#[tokio::test]
async fn test_modules_are_typed() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("modules/stats/counter.yaml"), "options:\n  start: 7\n");

    let manager = Arc::new(ModuleManager::new());
    let loader = ModuleLoader::new(roots(dir.path(), PluginKind::Module), catalog(), manager.clone());
    loader.load().await;

    let counter = manager.get_as::<Counter>("counter").unwrap();
    assert_eq!(counter.start, 7);
    assert_eq!(manager.get("counter").unwrap().group, "stats");
}

#[tokio::test]
async fn test_reload_adds_replaces_and_removes() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let wave = root.join("commands/wave.yaml");
    write(&wave, "handler: named\noptions:\n  greeting: hello\n");

    let manager = Arc::new(CommandManager::new());
    let loader = CommandLoader::new(roots(root, PluginKind::Command), catalog(), manager.clone());
    loader.load().await;
    assert_eq!(manager.get_command("wave", false).unwrap().help.description.as_deref(), Some("hello"));

    write(&wave, "handler: named\noptions:\n  greeting: howdy\n");
    assert_eq!(loader.reload(&wave).await, ReloadOutcome::Replaced("wave".into()));
    assert_eq!(manager.get_command("wave", false).unwrap().help.description.as_deref(), Some("howdy"));

    let fresh = root.join("commands/fresh.yaml");
    write(&fresh, "handler: named\n");
    assert_eq!(loader.reload(&fresh).await, ReloadOutcome::Added("fresh".into()));

    write(&fresh, "handler: broken\n");
    assert!(matches!(loader.reload(&fresh).await, ReloadOutcome::Failed(_)));
    assert!(manager.get_command("fresh", false).is_some());

    write(&fresh, "handler: named\nenabled: false\n");
    assert_eq!(loader.reload(&fresh).await, ReloadOutcome::Removed);
    assert!(manager.get_command("fresh", false).is_none());

    fs::remove_file(&wave).unwrap();
    assert_eq!(loader.reload(&wave).await, ReloadOutcome::Removed);
    assert!(manager.get_command("wave", false).is_none());

    assert_eq!(loader.reload(&root.join("elsewhere/x.yaml")).await, ReloadOutcome::Ignored);
    assert_eq!(loader.reload(&root.join("commands/_draft.yaml")).await, ReloadOutcome::Ignored);
}

#[tokio::test]
async fn test_preload_intents_without_constructing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("src/events/greeter.yaml"), "intents: [guild_presences]\n");
    write(&root.join("events/off.yaml"), "handler: message\nenabled: false\n");

    let loader = EventLoader::new(roots(root, PluginKind::Event), catalog(), Arc::new(EventManager::new()));
    let intents = loader.preload_intents().await;

    assert!(intents.contains(&Intent::GuildMembers));
    assert!(intents.contains(&Intent::GuildPresences));
    assert!(!intents.contains(&Intent::MessageContent));
}

#[tokio::test]
async fn test_core_handler_in_user_folder_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("events/message.yaml"), "");

    let manager = Arc::new(EventManager::new());
    let loader = EventLoader::new(roots(root, PluginKind::Event), catalog(), manager.clone());
    let report = loader.load().await;

    assert!(report.loaded.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert!(!report.failed[0].is_core);
    assert!(report.failed[0].error.contains("custom handler is required"));
    assert!(manager.get_core("message").is_none());
    assert!(manager.get_custom("message").is_none());
}

#[tokio::test]
async fn test_rejected_reload_keeps_old_entry() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("src/commands/help.yaml"), "");
    let wave = root.join("commands/wave.yaml");
    write(&wave, "handler: named\n");

    let manager = Arc::new(CommandManager::new());
    let loader = CommandLoader::new(roots(root, PluginKind::Command), catalog(), manager.clone());
    let report = loader.load().await;
    assert_eq!(report.loaded.len(), 2);
    let before = manager.get_command("wave", false).unwrap();

    write(&wave, "handler: named\noptions:\n  name: help\n");
    assert!(matches!(loader.reload(&wave).await, ReloadOutcome::Failed(_)));

    let after = manager.get_command("wave", false).unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert!(manager.get_command("help", false).unwrap().is_core);
}

#[tokio::test]
async fn test_reload_resyncs_slash_commands() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let client = Arc::new(ConsoleClient::new());
    let store_path = root.join("data/slash-commands.json");

    let manager = Arc::new(CommandManager::new());
    let loader = CommandLoader::new(roots(root, PluginKind::Command), catalog(), manager.clone())
        .with_slash_sync(SlashCommandStore::new(&store_path), client.clone());
    loader.load().await;
    loader.sync_slash().await;
    assert!(client.application_commands().is_empty());

    let about = root.join("commands/about.yaml");
    write(&about, "");
    assert_eq!(loader.reload(&about).await, ReloadOutcome::Added("about".into()));
    assert!(client.application_commands().values().any(|d| d.name == "about"));
    let stored = SlashCommandStore::new(&store_path).load().await.unwrap();
    assert!(stored.commands.contains_key("about"));

    fs::remove_file(&about).unwrap();
    assert_eq!(loader.reload(&about).await, ReloadOutcome::Removed);
    assert!(client.application_commands().is_empty());
}
