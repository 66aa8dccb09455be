//! Module hooks for the bundling step.
//!
//! A hook can claim an import (`resolve_id`) and provide module text
//! (`load`). Hooks run in order and the first `Some` wins, the same contract
//! as a rolldown plugin's `resolveId`/`load`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::HookError;
use crate::ident::{is_island_path, normalize_path, IslandId, SOURCE_EXTENSION};
use crate::script::is_style_specifier;

/// Prefix of synthetic island proxy ids.
pub const ISLAND_PROXY_PREFIX: &str = "\0island:";
/// Specifier of the shared marker runtime.
pub const RUNTIME_SPECIFIER: &str = "islands:runtime";
/// Prefix of every subsystem-internal specifier.
pub const INTERNAL_PREFIX: &str = "islands:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    pub id: String,
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleMeta {
    Plain,
    /// Empty stand-in module.
    Stub,
    /// The module's content was emitted as an asset.
    Asset,
    /// Proxy for an island import.
    IslandProxy(IslandId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub code: String,
    pub meta: ModuleMeta,
    pub asset: Option<String>,
}

impl LoadedModule {
    pub fn plain(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            meta: ModuleMeta::Plain,
            asset: None,
        }
    }
}

pub trait ModuleHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn resolve_id(&self, _specifier: &str, _importer: &str) -> Result<Option<ResolvedId>, HookError> {
        Ok(None)
    }

    fn load(&self, _id: &str) -> Result<Option<LoadedModule>, HookError> {
        Ok(None)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Box<dyn ModuleHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: impl ModuleHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    /// Resolve `specifier` imported from `importer`. Relative specifiers
    /// nobody claimed resolve against the importer's directory; remote URLs
    /// stay external.
    pub fn resolve(&self, specifier: &str, importer: &str) -> Result<Option<ResolvedId>, HookError> {
        for hook in &self.hooks {
            if let Some(resolved) = hook.resolve_id(specifier, importer)? {
                return Ok(Some(resolved));
            }
        }

        if specifier.starts_with("http://") || specifier.starts_with("https://") {
            return Ok(Some(ResolvedId {
                id: specifier.to_string(),
                external: true,
            }));
        }
        if is_relative(specifier) && !importer.starts_with('\0') {
            let path = resolve_relative(specifier, importer);
            return Ok(Some(ResolvedId {
                id: path.to_string_lossy().into_owned(),
                external: false,
            }));
        }
        Ok(None)
    }

    /// Load `id`; unclaimed ids are read from disk.
    pub fn load(&self, id: &str) -> Result<Option<LoadedModule>, HookError> {
        for hook in &self.hooks {
            if let Some(module) = hook.load(id)? {
                return Ok(Some(module));
            }
        }

        if id.starts_with('\0') {
            return Ok(None);
        }
        let path = Path::new(id);
        if !path.is_file() {
            return Ok(None);
        }
        fs::read_to_string(path)
            .map(|code| Some(LoadedModule::plain(code)))
            .map_err(|e| HookError {
                hook: "fs",
                id: id.to_string(),
                message: e.to_string(),
            })
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// `specifier` relative to the directory of the importing file.
pub fn resolve_relative(specifier: &str, importer: &str) -> PathBuf {
    let base = Path::new(importer).parent().unwrap_or_else(|| Path::new(""));
    let clean = specifier.split(['?', '#']).next().unwrap_or(specifier);
    normalize_path(&base.join(clean))
}

// ═══════════════════════════════════════════════════════════════════════════════
// STYLE HOOKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Server build: every styling import becomes an empty module.
pub struct StyleStubHook;

impl ModuleHook for StyleStubHook {
    fn name(&self) -> &'static str {
        "style-stub"
    }

    fn resolve_id(&self, specifier: &str, importer: &str) -> Result<Option<ResolvedId>, HookError> {
        if !is_style_specifier(specifier) {
            return Ok(None);
        }
        Ok(Some(ResolvedId {
            id: resolve_relative(specifier, importer).to_string_lossy().into_owned(),
            external: false,
        }))
    }

    fn load(&self, id: &str) -> Result<Option<LoadedModule>, HookError> {
        if !is_style_specifier(id) {
            return Ok(None);
        }
        Ok(Some(LoadedModule {
            code: String::new(),
            meta: ModuleMeta::Stub,
            asset: None,
        }))
    }
}

/// Client build: styling imports are read and emitted as a CSS asset.
pub struct StyleExtractHook;

impl ModuleHook for StyleExtractHook {
    fn name(&self) -> &'static str {
        "style-extract"
    }

    fn resolve_id(&self, specifier: &str, importer: &str) -> Result<Option<ResolvedId>, HookError> {
        StyleStubHook.resolve_id(specifier, importer)
    }

    fn load(&self, id: &str) -> Result<Option<LoadedModule>, HookError> {
        if !is_style_specifier(id) {
            return Ok(None);
        }
        let css = fs::read_to_string(id).map_err(|e| HookError {
            hook: self.name(),
            id: id.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(LoadedModule {
            code: String::new(),
            meta: ModuleMeta::Asset,
            asset: Some(css),
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ISLAND INTERCEPTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Replaces every island import with a proxy calling the marker runtime.
pub struct IslandInterceptor {
    project_root: PathBuf,
    islands_root: PathBuf,
}

impl IslandInterceptor {
    pub fn new(project_root: impl Into<PathBuf>, islands_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            islands_root: islands_root.into(),
        }
    }

    /// The island behind a proxy id, if `id` is one.
    pub fn proxied_island(id: &str) -> Option<IslandId> {
        id.strip_prefix(ISLAND_PROXY_PREFIX).map(IslandId::from)
    }

    fn proxy_source(id: &IslandId) -> String {
        let quoted = serde_json::Value::String(id.to_string()).to_string();
        format!(
            "import {{ renderMarker }} from \"{runtime}\";\n\
             export default function Island(props) {{\n  return renderMarker({id}, props);\n}}\n",
            runtime = RUNTIME_SPECIFIER,
            id = quoted
        )
    }
}

impl ModuleHook for IslandInterceptor {
    fn name(&self) -> &'static str {
        "island-interceptor"
    }

    fn resolve_id(&self, specifier: &str, importer: &str) -> Result<Option<ResolvedId>, HookError> {
        // Imports made by a proxy itself are not islands.
        if importer.starts_with(ISLAND_PROXY_PREFIX) {
            return Ok(None);
        }
        if !specifier.ends_with(&format!(".{}", SOURCE_EXTENSION)) {
            return Ok(None);
        }

        let path = if Path::new(specifier).is_absolute() {
            normalize_path(Path::new(specifier))
        } else if is_relative(specifier) {
            resolve_relative(specifier, importer)
        } else {
            normalize_path(&self.project_root.join(specifier))
        };
        if !is_island_path(&self.islands_root, &path) {
            return Ok(None);
        }

        let id = IslandId::from_path(&self.project_root, &path);
        Ok(Some(ResolvedId {
            id: format!("{}{}", ISLAND_PROXY_PREFIX, id),
            external: false,
        }))
    }

    fn load(&self, id: &str) -> Result<Option<LoadedModule>, HookError> {
        Ok(Self::proxied_island(id).map(|island| LoadedModule {
            code: Self::proxy_source(&island),
            meta: ModuleMeta::IslandProxy(island),
            asset: None,
        }))
    }
}

/// Keeps subsystem-internal modules out of every bundle so all pages share
/// one registry and one marker runtime.
pub struct RuntimeExternalHook;

impl ModuleHook for RuntimeExternalHook {
    fn name(&self) -> &'static str {
        "runtime-external"
    }

    fn resolve_id(&self, specifier: &str, _importer: &str) -> Result<Option<ResolvedId>, HookError> {
        Ok(specifier.starts_with(INTERNAL_PREFIX).then(|| ResolvedId {
            id: specifier.to_string(),
            external: true,
        }))
    }
}

/// Hooks for island server builds.
pub fn server_hooks() -> HookChain {
    HookChain::new().with(StyleStubHook).with(RuntimeExternalHook)
}

/// Hooks for island client bundles.
pub fn client_hooks() -> HookChain {
    HookChain::new().with(StyleExtractHook).with(RuntimeExternalHook)
}

/// Hooks for page builds.
pub fn page_hooks(project_root: &Path, islands_root: &Path) -> HookChain {
    HookChain::new()
        .with(IslandInterceptor::new(project_root, islands_root))
        .with(RuntimeExternalHook)
        .with(StyleStubHook)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interceptor() -> IslandInterceptor {
        IslandInterceptor::new("/site", "/site/islands")
    }

    #[test]
    fn test_island_import_becomes_proxy() {
        let resolved = interceptor()
            .resolve_id("../islands/./Counter.zen", "/site/pages/index.zen")
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, "\0island:islands/Counter.zen");

        let loaded = interceptor().load(&resolved.id).unwrap().unwrap();
        assert_eq!(
            loaded.meta,
            ModuleMeta::IslandProxy(IslandId::from("islands/Counter.zen"))
        );
        assert!(loaded.code.contains("renderMarker(\"islands/Counter.zen\", props)"));
        assert!(loaded.code.contains("from \"islands:runtime\""));
    }

    #[test]
    fn test_non_island_components_pass_through() {
        assert_eq!(
            interceptor()
                .resolve_id("../components/Card.zen", "/site/pages/index.zen")
                .unwrap(),
            None
        );
        assert_eq!(
            interceptor().resolve_id("./util.js", "/site/pages/index.zen").unwrap(),
            None
        );
    }

    #[test]
    fn test_resolution_inside_proxy_passes_through() {
        assert_eq!(
            interceptor()
                .resolve_id("../islands/Counter.zen", "\0island:islands/Counter.zen")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_chain_marks_runtime_external() {
        let chain = page_hooks(Path::new("/site"), Path::new("/site/islands"));
        let resolved = chain
            .resolve(RUNTIME_SPECIFIER, "\0island:islands/Counter.zen")
            .unwrap()
            .unwrap();
        assert!(resolved.external);
        assert_eq!(
            chain.names(),
            vec!["island-interceptor", "runtime-external", "style-stub"]
        );
    }

    #[test]
    fn test_style_stub_and_fallback_resolution() {
        let chain = server_hooks();
        let css = chain.resolve("./a.css", "/site/islands/Counter.zen").unwrap().unwrap();
        assert_eq!(css.id, "/site/islands/a.css");
        let stub = chain.load(&css.id).unwrap().unwrap();
        assert_eq!(stub.meta, ModuleMeta::Stub);
        assert!(stub.code.is_empty());

        let js = chain.resolve("./fmt.js", "/site/islands/Counter.zen").unwrap().unwrap();
        assert_eq!(js, ResolvedId { id: "/site/islands/fmt.js".to_string(), external: false });
        assert_eq!(chain.resolve("lodash", "/site/islands/Counter.zen").unwrap(), None);
    }
}
