use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Capability flag a platform client declares when it connects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Guilds,
    GuildMembers,
    GuildMessages,
    GuildPresences,
    MessageContent,
    DirectMessages,
    GuildMessageReactions,
    GuildVoiceStates,
}

/// Set of intents, ordered so logs and comparisons are stable
pub type IntentSet = BTreeSet<Intent>;

impl Intent {
    pub const ALL: [Intent; 8] = [
        Intent::Guilds,
        Intent::GuildMembers,
        Intent::GuildMessages,
        Intent::GuildPresences,
        Intent::MessageContent,
        Intent::DirectMessages,
        Intent::GuildMessageReactions,
        Intent::GuildVoiceStates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Guilds => "guilds",
            Intent::GuildMembers => "guild_members",
            Intent::GuildMessages => "guild_messages",
            Intent::GuildPresences => "guild_presences",
            Intent::MessageContent => "message_content",
            Intent::DirectMessages => "direct_messages",
            Intent::GuildMessageReactions => "guild_message_reactions",
            Intent::GuildVoiceStates => "guild_voice_states",
        }
    }

    /// Privileged intents must be enabled for the application on the platform side
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Intent::GuildMembers | Intent::GuildPresences | Intent::MessageContent
        )
    }

    /// Intents every client gets regardless of plugins
    pub fn defaults() -> IntentSet {
        [Intent::Guilds, Intent::GuildMessages, Intent::DirectMessages]
            .into_iter()
            .collect()
    }

    /// Parse a comma separated list, skipping blanks
    pub fn parse_list(input: &str) -> Result<IntentSet, String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Intent::from_str)
            .collect()
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Intent::ALL
            .into_iter()
            .find(|i| i.as_str() == normalized)
            .ok_or_else(|| format!("Unknown intent: {}", s))
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let set = Intent::parse_list("guild_members, message-content,,Guilds").unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&Intent::GuildMembers));
        assert!(set.contains(&Intent::MessageContent));
        assert!(set.contains(&Intent::Guilds));
    }

    #[test]
    fn test_parse_list_rejects_unknown() {
        assert!(Intent::parse_list("guilds,telepathy").is_err());
    }

    #[test]
    fn test_privileged() {
        assert!(Intent::MessageContent.is_privileged());
        assert!(!Intent::Guilds.is_privileged());
    }
}
