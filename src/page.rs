//! Page builds.
//!
//! A page is rendered by walking its authored tree once, in document order.
//! Island nodes are replaced with marker runtime output *before*
//! serialization, so no hook is needed inside the serializer.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::assets::{append_to_body, inject, Asset};
use crate::cache::short_hash;
use crate::config::IslandsConfig;
use crate::error::{EvalError, PageError};
use crate::eval::{evaluate, to_display_string, Scope};
use crate::hooks::{HookChain, LoadedModule, ModuleMeta};
use crate::hydration::live_reload_script;
use crate::ident::IslandId;
use crate::marker::{Directive, MarkerRuntime, PageUsage};
use crate::parse::{extract_styles, parse_script, parse_template, ParseMode};
use crate::props::to_camel_case;
use crate::registry::RecordSet;
use crate::render::{to_html, RenderElement, RenderNode};
use crate::script::{analyze_script, ScriptAnalysis};
use crate::server::bind_script;
use crate::style::process_styles;
use crate::template::{significant_roots, AttributeValue, ComponentNode, TemplateNode};

/// Output subdirectory for page stylesheets.
pub const PAGE_ASSETS_DIR: &str = "assets";

/// Everything a page build reads.
pub struct PageContext<'a> {
    pub config: &'a IslandsConfig,
    pub hooks: &'a HookChain,
    pub records: Arc<RecordSet>,
    /// Public URL of the hydration runtime script.
    pub runtime_href: &'a str,
    /// Values page expressions evaluate against.
    pub data: &'a Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct PageOutput {
    pub source_path: PathBuf,
    pub out_path: PathBuf,
    pub html: String,
    pub usage: PageUsage,
    pub assets: Vec<Asset>,
}

/// `pages/a/b.zen` → `<out>/a/b.html`.
pub fn page_out_path(config: &IslandsConfig, path: &Path) -> PathBuf {
    let pages_root = config.pages_root();
    let relative = path
        .strip_prefix(&pages_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));
    config.out_root().join(relative.with_extension("html"))
}

/// Page script imports, sorted by what they turned out to be.
#[derive(Default)]
struct PageImports {
    /// Local component name → island.
    islands: HashMap<String, IslandId>,
    css: Vec<String>,
    /// Imports that stay in the page's browser script.
    browser: Vec<String>,
}

fn resolve_imports(path: &Path, analysis: &ScriptAnalysis, hooks: &HookChain) -> Result<PageImports, PageError> {
    let importer = path.to_string_lossy().into_owned();
    let mut imports = PageImports::default();

    for import in &analysis.imports {
        let import_error = |message: String| PageError::Import {
            path: path.to_path_buf(),
            specifier: import.specifier.clone(),
            message,
        };

        let resolved = hooks
            .resolve(&import.specifier, &importer)
            .map_err(|e| import_error(e.to_string()))?;
        let resolved = match resolved {
            Some(resolved) if !resolved.external => resolved,
            _ => {
                imports.browser.push(import.code.clone());
                continue;
            }
        };

        match hooks.load(&resolved.id).map_err(|e| import_error(e.to_string()))? {
            Some(LoadedModule {
                meta: ModuleMeta::IslandProxy(island),
                ..
            }) => {
                let local = import
                    .default_local
                    .clone()
                    .ok_or_else(|| import_error("islands are imported as a default export".to_string()))?;
                imports.islands.insert(local, island);
            }
            Some(LoadedModule {
                meta: ModuleMeta::Stub,
                ..
            }) if import.is_style() => {
                let css = fs::read_to_string(&resolved.id).map_err(|e| import_error(e.to_string()))?;
                imports.css.push(css);
            }
            _ => imports.browser.push(import.code.clone()),
        }
    }

    Ok(imports)
}

struct PageRenderer<'a> {
    path: &'a Path,
    scope: Scope,
    islands: &'a HashMap<String, IslandId>,
    runtime: MarkerRuntime,
}

impl<'a> PageRenderer<'a> {
    fn eval(&self, code: &str) -> Result<Value, PageError> {
        evaluate(code, &self.scope).map_err(|source: EvalError| PageError::Eval {
            path: self.path.to_path_buf(),
            source,
        })
    }

    fn render(&mut self, nodes: &[TemplateNode], out: &mut Vec<RenderNode>) -> Result<(), PageError> {
        for node in nodes {
            match node {
                TemplateNode::Doctype(doctype) => out.push(RenderNode::Doctype(doctype.name.clone())),
                TemplateNode::Text(text) => out.push(RenderNode::Text(text.value.clone())),
                TemplateNode::Expression(expr) => {
                    let value = self.eval(&expr.expression.code)?;
                    out.push(RenderNode::Text(to_display_string(&value)));
                }
                TemplateNode::Element(element) => {
                    let mut el = RenderElement::new(element.tag.clone());
                    for attr in element.attributes.iter().filter(|a| !a.is_event()) {
                        match &attr.value {
                            AttributeValue::Static(value) => el.attrs.push((attr.name.clone(), Some(value.clone()))),
                            AttributeValue::Flag => el.attrs.push((attr.name.clone(), None)),
                            AttributeValue::Dynamic(expr) => match self.eval(&expr.code)? {
                                Value::Null | Value::Bool(false) => {}
                                Value::Bool(true) => el.attrs.push((attr.name.clone(), None)),
                                value => el.attrs.push((attr.name.clone(), Some(to_display_string(&value)))),
                            },
                        }
                    }
                    self.render(&element.children, &mut el.children)?;
                    out.push(el.into());
                }
                TemplateNode::Component(component) => {
                    let node = self.render_island(component)?;
                    out.push(node);
                }
            }
        }
        Ok(())
    }

    fn render_island(&mut self, component: &ComponentNode) -> Result<RenderNode, PageError> {
        let island = self
            .islands
            .get(&component.name)
            .cloned()
            .ok_or_else(|| PageError::UnknownComponent {
                path: self.path.to_path_buf(),
                name: component.name.clone(),
            })?;

        if !significant_roots(&component.children).is_empty() {
            warn!(page = %self.path.display(), island = %island, "island children are ignored");
        }

        let mut props = Map::new();
        for attr in &component.attributes {
            let key = match Directive::from_token(&attr.name) {
                Some(_) => attr.name.clone(),
                None => to_camel_case(&attr.name),
            };
            let value = match &attr.value {
                AttributeValue::Flag => Value::Bool(true),
                AttributeValue::Static(value) => Value::String(value.clone()),
                AttributeValue::Dynamic(expr) => self.eval(&expr.code)?,
            };
            props.insert(key, value);
        }

        self.runtime
            .render_marker(&island, props)
            .map_err(|source| PageError::Marker {
                path: self.path.to_path_buf(),
                source,
            })
    }
}

fn write_output(path: &Path, content: &str) -> Result<(), PageError> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)
    };
    write().map_err(|source| PageError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Build and write one page.
pub fn build_page(path: &Path, ctx: &PageContext<'_>) -> Result<PageOutput, PageError> {
    let source = fs::read_to_string(path).map_err(|source| PageError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |message: String| PageError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let analysis = match parse_script(&source) {
        Some(script) => analyze_script(&script.raw).map_err(parse_error)?,
        None => ScriptAnalysis::default(),
    };
    let imports = resolve_imports(path, &analysis, ctx.hooks)?;
    let template = parse_template(&source, ParseMode::Document).map_err(parse_error)?;

    let mut scope = Scope::for_props(ctx.data);
    let imported: Vec<String> = analysis
        .imports
        .iter()
        .flat_map(|i| i.locals.iter().cloned())
        .collect();
    bind_script(&mut scope, &imported, &analysis.declarations);

    let mut renderer = PageRenderer {
        path,
        scope,
        islands: &imports.islands,
        runtime: MarkerRuntime::new(Arc::clone(&ctx.records)),
    };
    let mut nodes = Vec::new();
    renderer.render(&template.nodes, &mut nodes)?;
    let usage = renderer.runtime.finish();

    // Page script without its island and style imports runs as a module.
    let mut browser_script = imports.browser.join("\n");
    if !analysis.body.is_empty() {
        if !browser_script.is_empty() {
            browser_script.push('\n');
        }
        browser_script.push_str(&analysis.body);
    }
    if !browser_script.is_empty() {
        append_to_body(&mut nodes, Asset::inline_module(browser_script).to_node());
    }

    let mut assets = Vec::new();

    let mut css_chunks = imports.css;
    css_chunks.extend(extract_styles(&source));
    let page_css = process_styles(&css_chunks, ctx.config.should_minify()).map_err(parse_error)?;
    if let Some(css) = page_css {
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let file = format!("{}/{}-{}.css", PAGE_ASSETS_DIR, stem, short_hash(&css));
        write_output(&ctx.config.out_root().join(&file), &css)?;
        assets.push(Asset::stylesheet(ctx.config.public_url(&file)));
    }

    for id in &usage.used_islands {
        if let Some(href) = ctx.records.get(id).and_then(|r| r.style_href.clone()) {
            assets.push(Asset::stylesheet(href));
        }
    }
    if usage.needs_hydration {
        assets.push(Asset::module_script(ctx.runtime_href));
    }
    if ctx.config.is_dev() {
        assets.push(Asset::inline_module(live_reload_script(&ctx.config.live_reload_endpoint)));
    }

    inject(&mut nodes, &assets);
    let html = to_html(&nodes);
    let out_path = page_out_path(ctx.config, path);
    write_output(&out_path, &html)?;

    debug!(
        page = %path.display(),
        islands = usage.used_islands.len(),
        hydrates = usage.needs_hydration,
        "built page"
    );

    Ok(PageOutput {
        source_path: path.to_path_buf(),
        out_path,
        html,
        usage,
        assets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_path_mirrors_pages_tree() {
        let config = IslandsConfig::new("/site");
        assert_eq!(
            page_out_path(&config, Path::new("/site/pages/a/b.zen")),
            PathBuf::from("/site/dist/a/b.html")
        );
        assert_eq!(
            page_out_path(&config, Path::new("/elsewhere/x.zen")),
            PathBuf::from("/site/dist/x.html")
        );
    }
}
