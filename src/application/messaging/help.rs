//! Plain-text help rendering

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use crate::application::managers::RegisteredCommand;

/// Full help for one command
pub fn render_command_help(command: &RegisteredCommand, prefix: &str) -> String {
    let mut out = String::new();
    let invoke = if command.is_slash() { "/" } else { prefix };

    let _ = writeln!(
        out,
        "{}{} - {}",
        invoke,
        command.name,
        command.help.description.as_deref().unwrap_or("No description")
    );
    let _ = writeln!(out, "Usage: {}", render_usage(command, prefix));
    if !command.aliases.is_empty() {
        let _ = writeln!(out, "Aliases: {}", command.aliases.join(", "));
    }
    if !command.help.examples.is_empty() {
        let _ = writeln!(out, "Examples:");
        for example in &command.help.examples {
            let _ = writeln!(out, "  {}{}", invoke, example);
        }
    }
    if !command.config.hide_flags && !command.help.flags.is_empty() {
        let _ = writeln!(out, "Flags:");
        for flag in &command.help.flags {
            let short = flag.short.map(|c| format!("-{}, ", c)).unwrap_or_default();
            let value = if flag.takes_value { " <value>" } else { "" };
            let _ = writeln!(out, "  {}--{}{}  {}", short, flag.name, value, flag.description);
        }
    }
    if command.config.guild_only {
        let _ = writeln!(out, "Only available in servers.");
    }
    out.trim_end().to_string()
}

/// One-line usage, e.g. `!roll <sides> [count]`
pub fn render_usage(command: &RegisteredCommand, prefix: &str) -> String {
    let invoke = if command.is_slash() { "/" } else { prefix };
    match command.help.usage.as_deref() {
        Some(usage) if !usage.is_empty() => format!("{}{} {}", invoke, command.name, usage),
        _ => format!("{}{}", invoke, command.name),
    }
}

/// Overview of every visible command, one section per group
pub fn render_overview(grouped: &BTreeMap<String, Vec<Arc<RegisteredCommand>>>, prefix: &str) -> String {
    if grouped.is_empty() {
        return "No commands available.".to_string();
    }
    let mut out = String::from("Available commands:\n");
    for (group, commands) in grouped {
        let _ = writeln!(out, "\n[{}]", group);
        for cmd in commands {
            let invoke = if cmd.is_slash() { "/" } else { prefix };
            let _ = writeln!(
                out,
                "  {}{} - {}",
                invoke,
                cmd.name,
                cmd.help.description.as_deref().unwrap_or("")
            );
        }
    }
    let _ = write!(out, "\nUse {}help <command> or {}<command> --help for details.", prefix, prefix);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::managers::CommandManager;
    use crate::application::context::CommandContext;
    use crate::application::errors::BotError;
    use crate::domain::entities::{CommandConfig, CommandHelp, FlagDef};
    use crate::plugins::trait_def::{CommandHandler, TextCommand};
    use async_trait::async_trait;

    struct Roll {
        hide_flags: bool,
    }

    #[async_trait]
    impl TextCommand for Roll {
        fn help(&self) -> CommandHelp {
            CommandHelp::new(vec!["roll", "dice"])
                .with_description("Roll dice")
                .with_usage("<sides> [count]")
                .with_example("roll 6 2")
                .with_flag(FlagDef::new("sum", "Add the results").with_short('s'))
        }

        fn config(&self) -> CommandConfig {
            CommandConfig { hide_flags: self.hide_flags, ..Default::default() }
        }

        async fn run(&self, _ctx: &CommandContext) -> Result<(), BotError> {
            Ok(())
        }
    }

    #[test]
    fn test_command_help_sections() {
        let manager = CommandManager::new();
        let cmd = manager
            .register(CommandHandler::text(Roll { hide_flags: false }), "roll.yaml", "fun", false)
            .unwrap();
        let help = render_command_help(&cmd, "!");
        assert!(help.starts_with("!roll - Roll dice"));
        assert!(help.contains("Usage: !roll <sides> [count]"));
        assert!(help.contains("Aliases: dice"));
        assert!(help.contains("!roll 6 2"));
        assert!(help.contains("-s, --sum"));
    }

    #[test]
    fn test_hide_flags() {
        let manager = CommandManager::new();
        let cmd = manager
            .register(CommandHandler::text(Roll { hide_flags: true }), "roll.yaml", "fun", false)
            .unwrap();
        assert!(!render_command_help(&cmd, "!").contains("--sum"));
    }

    #[test]
    fn test_overview_lists_groups() {
        let manager = CommandManager::new();
        manager
            .register(CommandHandler::text(Roll { hide_flags: false }), "roll.yaml", "fun", false)
            .unwrap();
        let overview = render_overview(&manager.get_commands_grouped(false), "?");
        assert!(overview.contains("[fun]"));
        assert!(overview.contains("?roll - Roll dice"));
    }
}
