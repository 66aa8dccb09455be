//! Island registry.
//!
//! A build-lifetime store of compiled islands keyed by [`IslandId`]. The
//! record set is immutable once built: `load()` compiles everything into a
//! fresh set and swaps it in, and readers take an `Arc` snapshot. `load()`
//! holds the write lock throughout, so a page build that snapshots the
//! registry always sees a complete set, old or new.

use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::bundler::{Bundler, OxcBundler};
use crate::cache::ArtifactCache;
use crate::compiler::{compile_source, CompiledIsland};
use crate::config::IslandsConfig;
use crate::discovery::find_zen_files;
use crate::error::{CompileError, RegistryError};
use crate::ident::IslandId;
use crate::server::ServerModule;

/// Output subdirectory for island bundles and stylesheets.
pub const ISLANDS_OUT_DIR: &str = "islands";

#[derive(Debug, Clone)]
pub struct IslandRecord {
    pub id: IslandId,
    pub source_path: PathBuf,
    pub server_module: Arc<ServerModule>,
    /// Public URL of the client bundle.
    pub client_path: String,
    pub style_content: Option<String>,
    /// Public URL of the sibling stylesheet.
    pub style_href: Option<String>,
    pub source_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleEntry {
    pub content: String,
    pub href: String,
}

#[derive(Debug, Default)]
pub struct RecordSet {
    records: BTreeMap<IslandId, Arc<IslandRecord>>,
}

impl RecordSet {
    pub fn from_records(records: impl IntoIterator<Item = IslandRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.id.clone(), Arc::new(record)))
                .collect(),
        }
    }

    pub fn get(&self, id: &IslandId) -> Option<&Arc<IslandRecord>> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &IslandId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &IslandId> {
        self.records.keys()
    }

    /// Stylesheets of every island that has one.
    pub fn style_manifest(&self) -> BTreeMap<IslandId, StyleEntry> {
        self.records
            .values()
            .filter_map(|record| {
                let content = record.style_content.clone()?;
                let href = record.style_href.clone()?;
                Some((record.id.clone(), StyleEntry { content, href }))
            })
            .collect()
    }
}

pub struct IslandRegistry {
    config: IslandsConfig,
    bundler: Arc<dyn Bundler>,
    cache: Option<ArtifactCache>,
    records: RwLock<Arc<RecordSet>>,
}

impl IslandRegistry {
    pub fn new(config: IslandsConfig) -> Self {
        Self::with_bundler(config, Arc::new(OxcBundler))
    }

    pub fn with_bundler(config: IslandsConfig, bundler: Arc<dyn Bundler>) -> Self {
        let cache = config
            .cache_dir
            .as_ref()
            .map(|dir| ArtifactCache::new(config.project_root.join(dir), config.artifact_settings()));
        Self {
            config,
            bundler,
            cache,
            records: RwLock::new(Arc::new(RecordSet::default())),
        }
    }

    pub fn config(&self) -> &IslandsConfig {
        &self.config
    }

    /// Discover, compile and write every island, then replace the record
    /// set. Any failure leaves the previous set in place.
    pub fn load(&self) -> Result<usize, RegistryError> {
        let mut records = self.records.write();

        let root = self.config.islands_root();
        let sources = find_zen_files(&root).map_err(|source| RegistryError::Discovery {
            root: root.clone(),
            source,
        })?;

        let compiled = sources
            .par_iter()
            .map(|path| {
                self.compile_cached(path)
                    .map(|island| (path.clone(), island))
                    .map_err(|source| RegistryError::Compile {
                        path: path.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen: BTreeMap<&IslandId, &PathBuf> = BTreeMap::new();
        for (path, island) in &compiled {
            if let Some(first) = seen.insert(&island.id, path) {
                return Err(RegistryError::DuplicateIsland {
                    id: island.id.clone(),
                    first: first.clone(),
                    second: path.clone(),
                });
            }
        }

        let out_dir = self.config.out_root().join(ISLANDS_OUT_DIR);
        let mut next = Vec::with_capacity(compiled.len());
        for (path, island) in compiled {
            next.push(self.write_island(&out_dir, path, island)?);
        }

        let set = RecordSet::from_records(next);
        let count = set.len();
        *records = Arc::new(set);

        info!(islands = count, root = %root.display(), "island registry loaded");
        Ok(count)
    }

    fn compile_cached(&self, path: &Path) -> Result<CompiledIsland, CompileError> {
        let source = fs::read_to_string(path).map_err(|source| CompileError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(cache) = &self.cache {
            let id = IslandId::from_path(&self.config.project_root, path);
            if let Some(hit) = cache.get(&id, &source) {
                debug!(island = %id, "island cache hit");
                return Ok(hit);
            }
        }

        let island = compile_source(path, &source, &self.config, self.bundler.as_ref())?;
        if let Some(cache) = &self.cache {
            cache.set(&island);
        }
        Ok(island)
    }

    fn write_island(&self, out_dir: &Path, source_path: PathBuf, island: CompiledIsland) -> Result<IslandRecord, RegistryError> {
        write_file(&out_dir.join(&island.client_file), &island.client_code)?;

        let style_href = match (&island.style, &island.style_file) {
            (Some(css), Some(file)) => {
                write_file(&out_dir.join(file), css)?;
                Some(self.public_path(file))
            }
            _ => None,
        };

        Ok(IslandRecord {
            client_path: self.public_path(&island.client_file),
            server_module: Arc::new(island.server),
            style_content: island.style,
            style_href,
            source_hash: island.source_hash,
            source_path,
            id: island.id,
        })
    }

    fn public_path(&self, file: &str) -> String {
        self.config.public_url(&format!("{}/{}", ISLANDS_OUT_DIR, file))
    }

    pub fn is_island(&self, id: &IslandId) -> bool {
        self.records.read().contains(id)
    }

    pub fn get_record(&self, id: &IslandId) -> Option<Arc<IslandRecord>> {
        self.records.read().get(id).cloned()
    }

    /// The current record set. Unaffected by later reloads.
    pub fn snapshot(&self) -> Arc<RecordSet> {
        self.records.read().clone()
    }

    pub fn style_manifest(&self) -> BTreeMap<IslandId, StyleEntry> {
        self.records.read().style_manifest()
    }
}

pub(crate) fn write_file(path: &Path, content: &str) -> Result<(), RegistryError> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)
    };
    write().map_err(|source| RegistryError::Write {
        path: path.to_path_buf(),
        source,
    })
}
