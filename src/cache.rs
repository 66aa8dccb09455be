use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::compiler::CompiledIsland;
use crate::ident::IslandId;

/// Hex SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// First 8 hex digits of [`content_hash`], used in output file names.
pub fn short_hash(content: &str) -> String {
    content_hash(content)[..8].to_string()
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    source_hash: String,
    /// Build settings the artifacts were produced with.
    settings: String,
    /// Hash of every styling import read while compiling.
    dependencies: BTreeMap<PathBuf, String>,
    island: CompiledIsland,
}

/// On-disk cache of compiled islands.
///
/// An entry is reused only when it belongs to the same island, was built
/// with the same settings, and the island source and every file it read
/// still hash the same.
pub struct ArtifactCache {
    cache_dir: PathBuf,
    settings: String,
}

impl ArtifactCache {
    /// `settings` fingerprints whatever build options shape the artifacts.
    pub fn new(cache_dir: impl Into<PathBuf>, settings: impl Into<String>) -> Self {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).ok();
        }
        Self {
            cache_dir,
            settings: settings.into(),
        }
    }

    /// `<stem>-<hash of id>.json`; the hash keeps distinct ids apart.
    fn entry_path(&self, id: &IslandId) -> PathBuf {
        self.cache_dir
            .join(format!("{}-{}.json", id.stem(), short_hash(id.as_str())))
    }

    pub fn get(&self, id: &IslandId, source: &str) -> Option<CompiledIsland> {
        let entry_path = self.entry_path(id);
        let data = fs::read_to_string(&entry_path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(island = %id, error = %e, "discarding corrupt cache entry");
                fs::remove_file(entry_path).ok();
                return None;
            }
        };

        if entry.island.id != *id || entry.settings != self.settings {
            debug!(island = %id, "cache entry belongs to another island or build");
            return None;
        }
        if entry.source_hash != content_hash(source) {
            return None;
        }
        let deps_fresh = entry
            .dependencies
            .iter()
            .all(|(path, hash)| hash_file(path).as_deref() == Some(hash.as_str()));
        if !deps_fresh {
            debug!(island = %id, "cache entry has stale dependencies");
            return None;
        }

        Some(entry.island)
    }

    /// Store `island`. Failures only cost a recompile later.
    pub fn set(&self, island: &CompiledIsland) {
        let dependencies = island
            .dependencies
            .iter()
            .filter_map(|path| hash_file(path).map(|hash| (path.clone(), hash)))
            .collect();
        let entry = CacheEntry {
            source_hash: island.source_hash.clone(),
            settings: self.settings.clone(),
            dependencies,
            island: island.clone(),
        };

        match serde_json::to_string(&entry) {
            Ok(data) => {
                if let Err(e) = fs::write(self.entry_path(&island.id), data) {
                    warn!(island = %island.id, error = %e, "failed to write cache entry");
                }
            }
            Err(e) => warn!(island = %island.id, error = %e, "failed to encode cache entry"),
        }
    }
}

fn hash_file(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|content| content_hash(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::OxcBundler;
    use crate::compiler::compile;
    use crate::config::IslandsConfig;

    fn setup() -> (tempfile::TempDir, IslandsConfig, ArtifactCache) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("islands")).unwrap();
        let config = IslandsConfig::new(dir.path());
        let cache = ArtifactCache::new(dir.path().join(".cache"), config.artifact_settings());
        (dir, config, cache)
    }

    #[test]
    fn test_short_hash_is_eight_hex_digits() {
        let hash = short_hash("export default 1;");
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, short_hash("export default 1;"));
    }

    #[test]
    fn test_hit_requires_same_source() {
        let (dir, config, cache) = setup();
        let path = dir.path().join("islands/A.zen");
        fs::write(&path, "<p>a</p>").unwrap();
        let compiled = compile(&path, &config, &OxcBundler).unwrap();
        cache.set(&compiled);

        assert_eq!(cache.get(&compiled.id, "<p>a</p>"), Some(compiled.clone()));
        assert_eq!(cache.get(&compiled.id, "<p>b</p>"), None);
    }

    #[test]
    fn test_changed_style_import_invalidates() {
        let (dir, config, cache) = setup();
        fs::write(dir.path().join("islands/a.css"), ".a { color: red }").unwrap();
        let source = "<script>import './a.css';</script><p class=\"a\">a</p>";
        let path = dir.path().join("islands/A.zen");
        fs::write(&path, source).unwrap();
        let compiled = compile(&path, &config, &OxcBundler).unwrap();
        cache.set(&compiled);
        assert!(cache.get(&compiled.id, source).is_some());

        fs::write(dir.path().join("islands/a.css"), ".a { color: blue }").unwrap();
        assert!(cache.get(&compiled.id, source).is_none());
    }

    #[test]
    fn test_corrupt_entry_is_removed() {
        let (_dir, _config, cache) = setup();
        let id = IslandId::from("islands/A.zen");
        fs::write(cache.entry_path(&id), "{ not json").unwrap();
        assert!(cache.get(&id, "<p>a</p>").is_none());
        assert!(!cache.entry_path(&id).exists());
    }

    #[test]
    fn test_entries_are_per_island() {
        let (dir, config, cache) = setup();
        fs::create_dir_all(dir.path().join("islands/a")).unwrap();
        let flat = dir.path().join("islands/a_b.zen");
        let nested = dir.path().join("islands/a/b.zen");
        fs::write(&flat, "<p>same</p>").unwrap();
        fs::write(&nested, "<p>same</p>").unwrap();

        let flat_island = compile(&flat, &config, &OxcBundler).unwrap();
        let nested_island = compile(&nested, &config, &OxcBundler).unwrap();
        cache.set(&flat_island);
        cache.set(&nested_island);

        assert_ne!(cache.entry_path(&flat_island.id), cache.entry_path(&nested_island.id));
        assert_eq!(cache.get(&flat_island.id, "<p>same</p>").unwrap().id, flat_island.id);
        assert_eq!(cache.get(&nested_island.id, "<p>same</p>").unwrap().id, nested_island.id);
    }

    #[test]
    fn test_entry_for_another_id_is_a_miss() {
        let (dir, config, cache) = setup();
        let path = dir.path().join("islands/A.zen");
        fs::write(&path, "<p>a</p>").unwrap();
        let compiled = compile(&path, &config, &OxcBundler).unwrap();
        cache.set(&compiled);

        let other = IslandId::from("islands/B.zen");
        fs::copy(cache.entry_path(&compiled.id), cache.entry_path(&other)).unwrap();
        assert_eq!(cache.get(&other, "<p>a</p>"), None);
    }

    #[test]
    fn test_other_build_settings_miss() {
        let (dir, mut config, _) = setup();
        let path = dir.path().join("islands/A.zen");
        fs::write(&path, "<p>a</p>").unwrap();
        let cache_dir = dir.path().join(".cache");

        config.minify = Some(false);
        let dev = ArtifactCache::new(&cache_dir, config.artifact_settings());
        let compiled = compile(&path, &config, &OxcBundler).unwrap();
        dev.set(&compiled);
        assert!(dev.get(&compiled.id, "<p>a</p>").is_some());

        config.minify = Some(true);
        let prod = ArtifactCache::new(&cache_dir, config.artifact_settings());
        assert_eq!(prod.get(&compiled.id, "<p>a</p>"), None);
    }
}
