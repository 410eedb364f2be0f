//! Plugin manifest definition
//!
//! A plugin file is a YAML document. Its file stem is the plugin name and
//! every field is optional:
//!
//! ```yaml
//! handler: echo        # factory key, defaults to the file stem
//! description: Repeats what you say
//! enabled: true
//! intents: [message_content]   # event plugins only
//! options:
//!   max-length: 200
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::application::errors::LoadError;
use crate::domain::entities::{Intent, IntentSet};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PluginManifest {
    pub handler: Option<String>,
    pub description: Option<String>,
    pub enabled: bool,
    pub intents: Vec<String>,
    pub options: serde_yaml::Value,
}

impl Default for PluginManifest {
    fn default() -> Self {
        Self {
            handler: None,
            description: None,
            enabled: true,
            intents: Vec::new(),
            options: serde_yaml::Value::Null,
        }
    }
}

impl PluginManifest {
    /// Parse manifest text. An empty or comment-only file is a valid manifest.
    pub fn parse(content: &str, path: &Path) -> Result<Self, LoadError> {
        let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| LoadError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value).map_err(|e| LoadError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub async fn read(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Catalog key this manifest resolves to
    pub fn factory_key(&self, stem: &str) -> String {
        self.handler
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(stem)
            .to_lowercase()
    }

    pub fn intents(&self, path: &Path) -> Result<IntentSet, LoadError> {
        self.intents
            .iter()
            .map(|name| {
                name.parse::<Intent>().map_err(|message| LoadError::Manifest {
                    path: path.to_path_buf(),
                    message,
                })
            })
            .collect()
    }
}
