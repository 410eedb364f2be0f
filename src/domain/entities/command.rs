//! Command metadata shared by text and slash commands

use serde::{Deserialize, Serialize};

/// Declared command name: one name, or a list where the first entry is
/// canonical and the rest are aliases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandName {
    Single(String),
    Many(Vec<String>),
}

impl CommandName {
    /// Canonical name and aliases, lowercased and trimmed
    pub fn split(&self) -> (Option<String>, Vec<String>) {
        let normalize = |s: &String| s.trim().to_lowercase();
        match self {
            CommandName::Single(name) => (Some(normalize(name)), Vec::new()),
            CommandName::Many(names) => {
                let mut iter = names.iter().map(normalize);
                let primary = iter.next();
                (primary, iter.collect())
            }
        }
    }
}

impl From<&str> for CommandName {
    fn from(name: &str) -> Self {
        CommandName::Single(name.to_string())
    }
}

impl From<Vec<&str>> for CommandName {
    fn from(names: Vec<&str>) -> Self {
        CommandName::Many(names.into_iter().map(String::from).collect())
    }
}

/// A flag a text command understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDef {
    pub name: String,
    pub short: Option<char>,
    pub description: String,
    #[serde(default)]
    pub takes_value: bool,
}

impl FlagDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short: None,
            description: description.into(),
            takes_value: false,
        }
    }

    pub fn with_short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn with_value(mut self) -> Self {
        self.takes_value = true;
        self
    }
}

/// Help metadata a command declares about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandHelp {
    pub name: CommandName,
    pub description: Option<String>,
    pub usage: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub flags: Vec<FlagDef>,
}

impl CommandHelp {
    pub fn new(name: impl Into<CommandName>) -> Self {
        Self {
            name: name.into(),
            description: None,
            usage: None,
            examples: Vec::new(),
            flags: Vec::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    pub fn with_flag(mut self, flag: FlagDef) -> Self {
        self.flags.push(flag);
        self
    }
}

/// Behaviour switches a command declares
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CommandConfig {
    /// Left out of listings unless explicitly requested
    pub hidden: bool,
    /// Show usage instead of running when called without arguments
    pub usage_if_not_set: bool,
    /// Leave flags out of rendered help
    pub hide_flags: bool,
    /// Refuse to run outside a guild
    pub guild_only: bool,
    /// Per-user cooldown in seconds
    pub cooldown: Option<u64>,
}

/// Option type of a slash command parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlashOptionKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashOption {
    pub name: String,
    pub description: String,
    pub kind: SlashOptionKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

/// Definition pushed to the platform's command registration API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashDefinition {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub options: Vec<SlashOption>,
}

impl SlashDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
        }
    }

    pub fn with_option(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        kind: SlashOptionKind,
        required: bool,
    ) -> Self {
        self.options.push(SlashOption {
            name: name.into(),
            description: description.into(),
            kind,
            required,
            choices: Vec::new(),
        });
        self
    }

    /// Help metadata derived from the definition
    pub fn to_help(&self) -> CommandHelp {
        let usage = self
            .options
            .iter()
            .map(|o| {
                if o.required {
                    format!("<{}>", o.name)
                } else {
                    format!("[{}]", o.name)
                }
            })
            .collect::<Vec<_>>();
        let mut help = CommandHelp::new(self.name.as_str()).with_description(self.description.clone());
        if !usage.is_empty() {
            help = help.with_usage(usage.join(" "));
        }
        help
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_many_names() {
        let name = CommandName::from(vec!["Foo", "bar", " BAZ "]);
        let (primary, aliases) = name.split();
        assert_eq!(primary.as_deref(), Some("foo"));
        assert_eq!(aliases, vec!["bar".to_string(), "baz".to_string()]);
    }

    #[test]
    fn test_split_empty_list() {
        let (primary, aliases) = CommandName::Many(vec![]).split();
        assert!(primary.is_none());
        assert!(aliases.is_empty());
    }

    #[test]
    fn test_command_name_deserializes_both_shapes() {
        let one: CommandName = serde_yaml::from_str("ping").unwrap();
        assert_eq!(one, CommandName::Single("ping".into()));
        let many: CommandName = serde_yaml::from_str("[help, h]").unwrap();
        assert_eq!(many, CommandName::from(vec!["help", "h"]));
    }

    #[test]
    fn test_slash_to_help_usage() {
        let def = SlashDefinition::new("ban", "Ban a user")
            .with_option("user", "Who", SlashOptionKind::User, true)
            .with_option("reason", "Why", SlashOptionKind::String, false);
        let help = def.to_help();
        assert_eq!(help.usage.as_deref(), Some("<user> [reason]"));
        assert_eq!(help.description.as_deref(), Some("Ban a user"));
    }
}
