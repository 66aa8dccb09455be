//! Island identifiers.
//!
//! An island is keyed everywhere (registry, interception hook, marker runtime)
//! by its project-relative, forward-slash path. All of those call sites go
//! through [`IslandId::from_path`] so the key is derived in exactly one place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// File extension shared by island and page sources.
pub const SOURCE_EXTENSION: &str = "zen";

/// Stable registry key for an island.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IslandId(String);

impl IslandId {
    /// Derive the identifier of `path` relative to `project_root`.
    ///
    /// Both paths are normalized lexically (`.` dropped, `..` folded) so an
    /// import written as `../islands/./Counter.zen` and the discovered file
    /// `islands/Counter.zen` agree. Paths outside the project keep their
    /// normalized absolute form.
    pub fn from_path(project_root: &Path, path: &Path) -> Self {
        let root = normalize_path(project_root);
        let full = if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&root.join(path))
        };

        let relative = full.strip_prefix(&root).unwrap_or(&full);
        let joined = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");

        IslandId(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File stem of the island (`islands/ui/Counter.zen` → `Counter`).
    pub fn stem(&self) -> &str {
        let file = self.0.rsplit('/').next().unwrap_or(&self.0);
        match file.rsplit_once('.') {
            Some((stem, ext)) if ext == SOURCE_EXTENSION => stem,
            _ => file,
        }
    }
}

impl fmt::Display for IslandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IslandId {
    fn from(value: &str) -> Self {
        IslandId(value.replace('\\', "/"))
    }
}

/// Whether `path` follows the island naming convention: a `.zen` file
/// located under `islands_root`.
pub fn is_island_path(islands_root: &Path, path: &Path) -> bool {
    let has_ext = path
        .extension()
        .map(|ext| ext == SOURCE_EXTENSION)
        .unwrap_or(false);
    has_ext && normalize_path(path).starts_with(normalize_path(islands_root))
}

/// Lexical path normalization; never touches the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
