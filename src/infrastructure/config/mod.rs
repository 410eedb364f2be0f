//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::errors::ConfigError;
use crate::domain::entities::{Intent, IntentSet};

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub paths: PathsConfig,
    pub hot_reload: HotReloadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    pub prefix: String,
    /// Usually supplied through `BOT_TOKEN` instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Extra intents on top of the defaults and what event plugins declare
    pub intents: Vec<String>,
    pub production: bool,
    pub debug: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "tether-bot".to_string(),
            prefix: "!".to_string(),
            token: None,
            intents: Vec::new(),
            production: false,
            debug: false,
        }
    }
}

/// Plugin folders. Relative paths resolve against `root`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PathsConfig {
    pub root: PathBuf,
    /// Root of the built-in `commands/`, `events/` and `modules/` folders
    pub builtin: PathBuf,
    /// Root of the user `commands/`, `events/` and `modules/` folders
    pub user: PathBuf,
    pub slash_registry: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            builtin: PathBuf::from("src"),
            user: PathBuf::from("."),
            slash_registry: PathBuf::from("data/slash-commands.json"),
        }
    }
}

impl PathsConfig {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn builtin_root(&self) -> PathBuf {
        self.resolve(&self.builtin)
    }

    pub fn user_root(&self) -> PathBuf {
        self.resolve(&self.user)
    }

    pub fn slash_registry_path(&self) -> PathBuf {
        self.resolve(&self.slash_registry)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HotReloadConfig {
    pub enabled: bool,
    pub debounce_ms: u64,
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 500,
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    /// Defaults overlaid with the environment
    pub fn load_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Overlay environment variables on top of file values
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var("BOT_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.bot.token = Some(token);
        }
        if let Some(prefix) = var("BOT_PREFIX").filter(|p| !p.is_empty()) {
            self.bot.prefix = prefix;
        }
        if let Some(intents) = var("BOT_INTENTS") {
            self.bot.intents.extend(
                intents
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from),
            );
        }
        if let Some(root) = var("BOT_ROOT").filter(|r| !r.is_empty()) {
            self.paths.root = PathBuf::from(root);
        }
        if var("DISABLE_HOT_RELOAD").map(|v| is_truthy(&v)).unwrap_or(false) {
            self.hot_reload.enabled = false;
        }
        if var("PRODUCTION").map(|v| is_truthy(&v)).unwrap_or(false) {
            self.bot.production = true;
        }
        if var("DEBUG").map(|v| is_truthy(&v)).unwrap_or(false) {
            self.bot.debug = true;
        }
    }

    /// Token with surrounding whitespace removed, `None` when unset or blank
    pub fn token(&self) -> Option<&str> {
        self.bot
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Configured intents plus the defaults
    pub fn intents(&self) -> Result<IntentSet, ConfigError> {
        let mut set = Intent::defaults();
        for name in &self.bot.intents {
            let intent = name
                .parse::<Intent>()
                .map_err(|e| ConfigError::InvalidValue(format!("intent '{}': {}", name, e)))?;
            set.insert(intent);
        }
        Ok(set)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue("bot.prefix must not be empty".into()));
        }
        if self.bot.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue("bot.prefix must not contain whitespace".into()));
        }
        self.intents()?;
        Ok(())
    }

    /// Default configuration as YAML, for `init-config`
    pub fn default_yaml() -> Result<String, ConfigError> {
        serde_yaml::to_string(&Config::default())
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "" | "0" | "false" | "no" | "off")
}
