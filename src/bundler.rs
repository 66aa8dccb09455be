//! Bundler seam.
//!
//! Bundling is a black box taking module text plus a hook chain. The
//! built-in [`OxcBundler`] handles what island client modules need: external
//! imports are kept, stubbed and asset-emitting imports are dropped, and the
//! result is printed with `oxc_codegen`. It does not inline module graphs;
//! any other import is rejected.

use oxc_allocator::Allocator;
use oxc_ast::ast::Statement;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use tracing::debug;

use crate::error::BundleError;
use crate::hooks::{HookChain, ModuleMeta};

#[derive(Debug, Clone, Copy)]
pub struct BundleInput<'a> {
    /// Module id, used as the importer for every import.
    pub id: &'a str,
    pub code: &'a str,
    pub minify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    /// Resolved id of the module that produced the asset.
    pub source_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleOutput {
    pub code: String,
    pub assets: Vec<EmittedAsset>,
    pub externals: Vec<String>,
    pub stubbed: Vec<String>,
}

pub trait Bundler: Send + Sync {
    fn bundle(&self, input: BundleInput<'_>, hooks: &HookChain) -> Result<BundleOutput, BundleError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OxcBundler;

fn source_type() -> SourceType {
    SourceType::default().with_module(true)
}

fn parse_error(id: &str, messages: &[String]) -> BundleError {
    BundleError::Parse {
        id: id.to_string(),
        message: messages.join("; "),
    }
}

impl Bundler for OxcBundler {
    fn bundle(&self, input: BundleInput<'_>, hooks: &HookChain) -> Result<BundleOutput, BundleError> {
        let mut output = BundleOutput::default();
        let mut drops = Vec::new();

        {
            let allocator = Allocator::default();
            let ret = Parser::new(&allocator, input.code, source_type()).parse();
            if !ret.errors.is_empty() {
                let messages: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
                return Err(parse_error(input.id, &messages));
            }

            for stmt in &ret.program.body {
                let (specifier, span) = match stmt {
                    Statement::ImportDeclaration(decl) => (decl.source.value.as_str(), decl.span),
                    Statement::ExportAllDeclaration(decl) => (decl.source.value.as_str(), decl.span),
                    Statement::ExportNamedDeclaration(decl) => match &decl.source {
                        Some(source) => (source.value.as_str(), decl.span),
                        None => continue,
                    },
                    _ => continue,
                };

                let unbundlable = || BundleError::Unbundlable {
                    id: input.id.to_string(),
                    specifier: specifier.to_string(),
                };

                let resolved = hooks.resolve(specifier, input.id)?.ok_or_else(unbundlable)?;
                if resolved.external {
                    output.externals.push(resolved.id);
                    continue;
                }

                let loaded = hooks.load(&resolved.id)?.ok_or_else(unbundlable)?;
                match loaded.meta {
                    ModuleMeta::Asset => {
                        output.assets.push(EmittedAsset {
                            source_id: resolved.id,
                            content: loaded.asset.unwrap_or_default(),
                        });
                    }
                    ModuleMeta::Stub => output.stubbed.push(resolved.id),
                    _ if loaded.code.trim().is_empty() => output.stubbed.push(resolved.id),
                    _ => return Err(unbundlable()),
                }
                drops.push((span.start as usize, span.end as usize));
            }
        }

        let mut code = input.code.to_string();
        for (start, end) in drops.into_iter().rev() {
            code.replace_range(start..end, "");
        }

        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, &code, source_type()).parse();
        if !ret.errors.is_empty() {
            let messages: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
            return Err(parse_error(input.id, &messages));
        }

        let options = CodegenOptions {
            minify: input.minify,
            ..CodegenOptions::default()
        };
        output.code = Codegen::new().with_options(options).build(&ret.program).code;

        debug!(
            module = input.id,
            assets = output.assets.len(),
            externals = output.externals.len(),
            "bundled module"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{client_hooks, page_hooks, IslandInterceptor, ModuleHook};
    use std::fs;
    use std::path::Path;

    #[test]
    fn test_style_import_becomes_asset() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.css"), ".a { color: red }").unwrap();
        let importer = dir.path().join("A.zen");
        let importer = importer.to_string_lossy();

        let out = OxcBundler
            .bundle(
                BundleInput {
                    id: &importer,
                    code: "import \"./a.css\";\nexport default function mount() { return 1; }",
                    minify: false,
                },
                &client_hooks(),
            )
            .unwrap();

        assert_eq!(out.assets.len(), 1);
        assert_eq!(out.assets[0].content, ".a { color: red }");
        assert!(!out.code.contains("a.css"));
        assert!(out.code.contains("export default function mount()"));
    }

    #[test]
    fn test_external_runtime_import_is_kept() {
        let chain = page_hooks(Path::new("/site"), Path::new("/site/islands"));
        let proxy_id = "\0island:islands/Counter.zen";
        let proxy = IslandInterceptor::new("/site", "/site/islands")
            .load(proxy_id)
            .unwrap()
            .unwrap()
            .code;

        let out = OxcBundler
            .bundle(
                BundleInput {
                    id: proxy_id,
                    code: &proxy,
                    minify: true,
                },
                &chain,
            )
            .unwrap();
        assert_eq!(out.externals, vec!["islands:runtime".to_string()]);
        assert!(out.code.contains("islands:runtime"));
        assert!(out.code.contains("renderMarker"));
    }

    #[test]
    fn test_unresolvable_import_is_rejected() {
        let err = OxcBundler
            .bundle(
                BundleInput {
                    id: "/site/islands/A.zen",
                    code: "import confetti from \"canvas-confetti\";",
                    minify: false,
                },
                &client_hooks(),
            )
            .unwrap_err();
        assert!(matches!(err, BundleError::Unbundlable { specifier, .. } if specifier == "canvas-confetti"));
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = OxcBundler
            .bundle(
                BundleInput {
                    id: "broken.js",
                    code: "let = ;",
                    minify: false,
                },
                &client_hooks(),
            )
            .unwrap_err();
        assert!(matches!(err, BundleError::Parse { .. }));
    }
}
