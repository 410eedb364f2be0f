//! Plugin file discovery
//!
//! Each plugin kind has a built-in folder and a user folder. Commands and
//! modules may sit one level deep in a group folder; events are flat.

use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use crate::application::managers::DEFAULT_GROUP;
use crate::plugins::trait_def::PluginKind;

/// The two folders one loader reads from
#[derive(Debug, Clone)]
pub struct PluginRoots {
    pub builtin: PathBuf,
    pub user: PathBuf,
}

impl PluginRoots {
    /// `<builtin_root>/<kind>` and `<user_root>/<kind>`
    pub fn for_kind(builtin_root: &Path, user_root: &Path, kind: PluginKind) -> Self {
        Self {
            builtin: builtin_root.join(kind.dir_name()),
            user: user_root.join(kind.dir_name()),
        }
    }

    /// Path of `path` below the user folder, if it is inside it. Also
    /// matches when one side is absolute and the other relative.
    pub fn user_relative(&self, path: &Path) -> Option<PathBuf> {
        if let Ok(rel) = path.strip_prefix(&self.user) {
            return Some(rel.to_path_buf());
        }
        let root = self.user.canonicalize().ok()?;
        let parent = path.parent()?.canonicalize().ok()?;
        let rel_parent = parent.strip_prefix(&root).ok()?;
        Some(rel_parent.join(path.file_name()?))
    }
}

/// A plugin file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// File stem, lowercased
    pub name: String,
    pub group: String,
    pub is_core: bool,
}

impl DiscoveredFile {
    /// Label stored as the registry entry's source
    pub fn source(&self) -> String {
        self.path.display().to_string()
    }
}

/// Names starting with `_` or `.` are private
pub fn is_private(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

/// A visible `.yaml`/`.yml` file
pub fn is_plugin_file(path: &Path) -> bool {
    let visible = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| !is_private(n))
        .unwrap_or(false);
    let yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);
    visible && yaml
}

/// Describe a file relative to its folder. `None` for anything that is not
/// a plugin file or sits deeper than the kind allows.
pub fn describe(root: &Path, relative: &Path, grouped: bool, is_core: bool) -> Option<DiscoveredFile> {
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    let group = match parts.as_slice() {
        [_file] => DEFAULT_GROUP.to_string(),
        [group, _file] if grouped && !is_private(group) => group.to_lowercase(),
        _ => return None,
    };
    let path = root.join(relative);
    if !is_plugin_file(&path) {
        return None;
    }
    let name = path.file_stem()?.to_str()?.to_lowercase();
    Some(DiscoveredFile {
        path,
        name,
        group,
        is_core,
    })
}

async fn list_dir(dir: &Path) -> std::io::Result<Vec<(String, PathBuf, bool)>> {
    let mut entries = Vec::new();
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        entries.push((name, entry.path(), is_dir));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// List every plugin file under `dir`. A missing folder is a warning, any
/// other read error is logged and yields nothing.
pub async fn discover(dir: &Path, grouped: bool, is_core: bool) -> Vec<DiscoveredFile> {
    let entries = match list_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Plugin folder {} does not exist", dir.display());
            return Vec::new();
        }
        Err(e) => {
            error!("Failed to read plugin folder {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for (name, path, is_dir) in entries {
        if is_private(&name) {
            debug!("Skipping private entry {}", path.display());
            continue;
        }
        if !is_dir {
            files.extend(describe(dir, Path::new(&name), grouped, is_core));
            continue;
        }
        if !grouped {
            debug!("Ignoring folder {} in a flat plugin root", path.display());
            continue;
        }
        match list_dir(&path).await {
            Ok(children) => {
                for (child, _, child_is_dir) in children {
                    if child_is_dir {
                        continue;
                    }
                    let relative = Path::new(&name).join(&child);
                    files.extend(describe(dir, &relative, grouped, is_core));
                }
            }
            Err(e) => error!("Failed to read group folder {}: {}", path.display(), e),
        }
    }
    files
}
