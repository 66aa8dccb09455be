//! Whole-site builds.
//!
//! The registry is loaded once, then every page builds against the same
//! snapshot. Pages build in parallel; each gets its own [`MarkerRuntime`]
//! (inside [`build_page`]) so usage state is never shared.
//!
//! [`MarkerRuntime`]: crate::marker::MarkerRuntime

use rayon::prelude::*;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::cache::short_hash;
use crate::config::IslandsConfig;
use crate::discovery::find_zen_files;
use crate::error::{BuildError, PageError, RegistryError};
use crate::hooks::{page_hooks, HookChain};
use crate::hydration::runtime_script;
use crate::page::{build_page, PageContext, PageOutput};
use crate::registry::{write_file, IslandRegistry, ISLANDS_OUT_DIR};

#[derive(Debug, Clone)]
pub struct SiteReport {
    pub islands: usize,
    pub pages: Vec<PageOutput>,
    /// Public URL of the hydration runtime.
    pub runtime_href: String,
}

impl SiteReport {
    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.pages.iter().map(|p| p.out_path.clone()).collect()
    }
}

pub struct SiteBuilder {
    config: IslandsConfig,
    registry: Arc<IslandRegistry>,
    hooks: HookChain,
    page_data: Map<String, Value>,
}

impl SiteBuilder {
    pub fn new(config: IslandsConfig) -> Self {
        let registry = Arc::new(IslandRegistry::new(config.clone()));
        Self::with_registry(config, registry)
    }

    /// Share an existing registry, e.g. one kept alive across watch rebuilds.
    pub fn with_registry(config: IslandsConfig, registry: Arc<IslandRegistry>) -> Self {
        let hooks = page_hooks(&config.project_root, &config.islands_root());
        Self {
            config,
            registry,
            hooks,
            page_data: Map::new(),
        }
    }

    /// Values every page expression can read.
    pub fn with_page_data(mut self, data: Map<String, Value>) -> Self {
        self.page_data = data;
        self
    }

    pub fn config(&self) -> &IslandsConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<IslandRegistry> {
        &self.registry
    }

    pub fn load(&self) -> Result<usize, RegistryError> {
        self.registry.load()
    }

    /// Write the hydration runtime and return its public URL.
    pub fn write_runtime(&self) -> Result<String, RegistryError> {
        let script = runtime_script();
        let file = format!("{}/runtime-{}.js", ISLANDS_OUT_DIR, short_hash(&script));
        write_file(&self.config.out_root().join(&file), &script)?;
        Ok(self.config.public_url(&file))
    }

    /// Build one page against the currently loaded registry.
    pub fn build_page(&self, path: &Path) -> Result<PageOutput, BuildError> {
        let runtime_href = self.write_runtime()?;
        Ok(self.build_page_with(path, &runtime_href)?)
    }

    fn build_page_with(&self, path: &Path, runtime_href: &str) -> Result<PageOutput, PageError> {
        let ctx = PageContext {
            config: &self.config,
            hooks: &self.hooks,
            records: self.registry.snapshot(),
            runtime_href,
            data: &self.page_data,
        };
        build_page(path, &ctx)
    }

    /// Load the registry, then build every page.
    pub fn build(&self) -> Result<SiteReport, BuildError> {
        let islands = self.load()?;
        let runtime_href = self.write_runtime()?;

        let root = self.config.pages_root();
        let sources = find_zen_files(&root).map_err(|source| BuildError::Discovery {
            root: root.clone(),
            source,
        })?;

        let pages = sources
            .par_iter()
            .map(|path| self.build_page_with(path, &runtime_href))
            .collect::<Result<Vec<_>, _>>()?;

        let hydrated = pages.iter().filter(|p| p.usage.needs_hydration).count();
        info!(
            islands,
            pages = pages.len(),
            hydrated,
            out = %self.config.out_root().display(),
            "site built"
        );

        Ok(SiteReport {
            islands,
            pages,
            runtime_href,
        })
    }
}
