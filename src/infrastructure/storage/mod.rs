//! File-based storage for registered slash commands
//!
//! The platform assigns an id to every application command. The ids are kept
//! in a JSON file so a restart can edit or delete commands instead of
//! creating duplicates:
//!
//! ```json
//! { "commands": { "about": { "id": "123", "definition": { ... } } } }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::application::errors::StorageError;
use crate::domain::entities::SlashDefinition;
use crate::domain::traits::Client;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCommand {
    pub id: String,
    pub definition: SlashDefinition,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashRegistry {
    #[serde(default)]
    pub commands: BTreeMap<String, StoredCommand>,
}

/// One step needed to bring the platform in line with the loaded commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Create(SlashDefinition),
    Update { id: String, definition: SlashDefinition },
    Delete { name: String, id: String },
    Unchanged(String),
}

/// Counts of what a sync did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Actions turning `stored` into `current`, ordered by command name
pub fn plan(stored: &SlashRegistry, current: &[SlashDefinition]) -> Vec<SyncAction> {
    let mut actions = Vec::new();
    let mut seen = BTreeSet::new();

    let mut current: Vec<&SlashDefinition> = current.iter().collect();
    current.sort_by(|a, b| a.name.cmp(&b.name));
    for def in current {
        if !seen.insert(def.name.clone()) {
            continue;
        }
        match stored.commands.get(&def.name) {
            None => actions.push(SyncAction::Create(def.clone())),
            Some(entry) if entry.definition == *def => actions.push(SyncAction::Unchanged(def.name.clone())),
            Some(entry) => actions.push(SyncAction::Update {
                id: entry.id.clone(),
                definition: def.clone(),
            }),
        }
    }

    for (name, entry) in &stored.commands {
        if !seen.contains(name) {
            actions.push(SyncAction::Delete {
                name: name.clone(),
                id: entry.id.clone(),
            });
        }
    }
    actions
}

/// JSON file holding the slash registry
pub struct SlashCommandStore {
    path: PathBuf,
}

impl SlashCommandStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored registry, empty when the file does not exist yet
    pub async fn load(&self) -> Result<SlashRegistry, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(SlashRegistry::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SlashRegistry::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, registry: &SlashRegistry) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(registry)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Apply the plan through the client and save the result. A failed step
    /// leaves that entry as it was stored.
    pub async fn sync(&self, client: &dyn Client, current: &[SlashDefinition]) -> Result<SyncSummary, StorageError> {
        let mut registry = self.load().await?;
        let mut summary = SyncSummary::default();

        for action in plan(&registry, current) {
            match action {
                SyncAction::Unchanged(name) => {
                    debug!("Slash command /{} unchanged", name);
                    summary.unchanged += 1;
                }
                SyncAction::Create(definition) => match client.create_application_command(&definition).await {
                    Ok(id) => {
                        info!("Created slash command /{}", definition.name);
                        registry
                            .commands
                            .insert(definition.name.clone(), StoredCommand { id, definition });
                        summary.created += 1;
                    }
                    Err(e) => {
                        error!("Failed to create slash command /{}: {}", definition.name, e);
                        summary.failed += 1;
                    }
                },
                SyncAction::Update { id, definition } => {
                    match client.edit_application_command(&id, &definition).await {
                        Ok(()) => {
                            info!("Updated slash command /{}", definition.name);
                            registry
                                .commands
                                .insert(definition.name.clone(), StoredCommand { id, definition });
                            summary.updated += 1;
                        }
                        Err(e) => {
                            error!("Failed to update slash command /{}: {}", definition.name, e);
                            summary.failed += 1;
                        }
                    }
                }
                SyncAction::Delete { name, id } => match client.delete_application_command(&id).await {
                    Ok(()) => {
                        info!("Deleted slash command /{}", name);
                        registry.commands.remove(&name);
                        summary.deleted += 1;
                    }
                    Err(e) => {
                        error!("Failed to delete slash command /{}: {}", name, e);
                        summary.failed += 1;
                    }
                },
            }
        }

        self.save(&registry).await?;
        Ok(summary)
    }
}
