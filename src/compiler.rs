//! Island compiler.
//!
//! One pass over a `.zen` island produces:
//! - the server artifact ([`ServerModule`]), styling imports stubbed;
//! - the client bundle, named after a hash of its own content;
//! - the optional stylesheet (inline blocks and styling imports).
//!
//! Server rendering failures surface later, at render time; a client bundle
//! failure fails the compile.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::bundler::{BundleInput, Bundler};
use crate::cache::{content_hash, short_hash};
use crate::client::generate_client_source;
use crate::config::IslandsConfig;
use crate::error::{BundleError, CompileError};
use crate::hooks::{client_hooks, server_hooks, HookChain, LoadedModule, ModuleMeta};
use crate::ident::IslandId;
use crate::parse::{declared_props, extract_styles, parse_script, parse_template, ParseMode};
use crate::script::{analyze_script, ScriptAnalysis};
use crate::server::ServerModule;
use crate::style::process_styles;
use crate::template::component_names;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledIsland {
    pub id: IslandId,
    pub server: ServerModule,
    pub client_code: String,
    /// `<Stem>-<hash8>.js`, relative to the islands output directory.
    pub client_file: String,
    pub style: Option<String>,
    /// `<Stem>-<hash8>.css`, present with `style`.
    pub style_file: Option<String>,
    /// Styling imports read while bundling.
    pub dependencies: Vec<PathBuf>,
    pub source_hash: String,
}

/// Read and compile the island at `path`.
pub fn compile(path: &Path, config: &IslandsConfig, bundler: &dyn Bundler) -> Result<CompiledIsland, CompileError> {
    let source = fs::read_to_string(path).map_err(|source| CompileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    compile_source(path, &source, config, bundler)
}

pub fn compile_source(
    path: &Path,
    source: &str,
    config: &IslandsConfig,
    bundler: &dyn Bundler,
) -> Result<CompiledIsland, CompileError> {
    let id = IslandId::from_path(&config.project_root, path);
    let importer = path.to_string_lossy().into_owned();
    let minify = config.should_minify();

    let template = parse_template(source, ParseMode::Fragment).map_err(|message| CompileError::Template {
        path: path.to_path_buf(),
        message,
    })?;
    if let Some(name) = component_names(&template.nodes).into_iter().next() {
        return Err(CompileError::NestedComponent {
            path: path.to_path_buf(),
            name,
        });
    }

    let script = parse_script(source);
    let props = declared_props(script.as_ref());
    let analysis = match &script {
        Some(script) => analyze_script(&script.raw).map_err(|message| CompileError::Script {
            path: path.to_path_buf(),
            message,
        })?,
        None => ScriptAnalysis::default(),
    };

    // Server side
    let (imported, stubbed_styles) =
        server_imports(&analysis, &importer, &server_hooks()).map_err(|source| CompileError::Bundle {
            path: path.to_path_buf(),
            source,
        })?;
    let server = ServerModule {
        template: template.clone(),
        props: props.clone(),
        declarations: analysis.declarations.clone(),
        imported,
        stubbed_styles,
    };

    // Client side
    let client_source = generate_client_source(&analysis, &props, &template);
    let bundle = bundler
        .bundle(
            BundleInput {
                id: &importer,
                code: &client_source,
                minify,
            },
            &client_hooks(),
        )
        .map_err(|source| CompileError::Bundle {
            path: path.to_path_buf(),
            source,
        })?;

    let mut chunks: Vec<String> = bundle.assets.iter().map(|a| a.content.clone()).collect();
    chunks.extend(extract_styles(source));
    let style = process_styles(&chunks, minify).map_err(|message| CompileError::Style {
        path: path.to_path_buf(),
        message,
    })?;

    let stem = id.stem().to_string();
    let client_file = format!("{}-{}.js", stem, short_hash(&bundle.code));
    let style_file = style
        .as_ref()
        .map(|css| format!("{}-{}.css", stem, short_hash(css)));

    debug!(island = %id, client = %client_file, styled = style.is_some(), "compiled island");

    Ok(CompiledIsland {
        id,
        server,
        client_code: bundle.code,
        client_file,
        style,
        style_file,
        dependencies: bundle.assets.into_iter().map(|a| PathBuf::from(a.source_id)).collect(),
        source_hash: content_hash(source),
    })
}

/// Imported binding names, and how many imports the server hooks stubbed.
fn server_imports(
    analysis: &ScriptAnalysis,
    importer: &str,
    hooks: &HookChain,
) -> Result<(Vec<String>, usize), BundleError> {
    let mut imported = Vec::new();
    let mut stubbed = 0;

    for import in &analysis.imports {
        let is_stub = match hooks.resolve(&import.specifier, importer)? {
            Some(resolved) if !resolved.external => matches!(
                hooks.load(&resolved.id)?,
                Some(LoadedModule {
                    meta: ModuleMeta::Stub,
                    ..
                })
            ),
            _ => false,
        };
        if is_stub {
            stubbed += 1;
        } else {
            imported.extend(import.locals.iter().cloned());
        }
    }

    Ok((imported, stubbed))
}
