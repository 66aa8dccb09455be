//! Script analysis for `.zen` sources.
//!
//! Lowers `state` declarations to `let`, splits import declarations from the
//! body and records top-level declarations in source order. The same
//! analysis feeds the server module (declaration scope) and the client
//! bundle (hoisted imports + mount body).

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{BindingPattern, ImportDeclarationSpecifier, Statement};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

lazy_static! {
    // `state` only at statement starts, so `const state = 1` or `obj.state` survive.
    static ref STATE_RE: Regex =
        Regex::new(r"(^|[;{}\n])(\s*)state(\s+)([A-Za-z_$][\w$]*)").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    State,
    Let,
    Const,
    Var,
    Function,
    Class,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Initializer source text, if any.
    pub init: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDecl {
    pub specifier: String,
    /// Local binding names (default, named and namespace).
    pub locals: Vec<String>,
    pub default_local: Option<String>,
    /// The declaration as written.
    pub code: String,
}

impl ImportDecl {
    pub fn is_style(&self) -> bool {
        is_style_specifier(&self.specifier)
    }
}

pub fn is_style_specifier(specifier: &str) -> bool {
    let path = specifier.split(['?', '#']).next().unwrap_or(specifier);
    path.ends_with(".css")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptAnalysis {
    pub imports: Vec<ImportDecl>,
    /// Lowered script with import declarations removed.
    pub body: String,
    pub declarations: Vec<Declaration>,
}

impl ScriptAnalysis {
    pub fn style_imports(&self) -> impl Iterator<Item = &ImportDecl> {
        self.imports.iter().filter(|i| i.is_style())
    }
}

/// Replace `state x` with `let x`, returning the lowered text and the state names.
pub fn lower_state(script: &str) -> (String, HashSet<String>) {
    let mut names = HashSet::new();
    for caps in STATE_RE.captures_iter(script) {
        names.insert(caps[4].to_string());
    }
    let lowered = STATE_RE.replace_all(script, "${1}${2}let${3}${4}").to_string();
    (lowered, names)
}

/// Analyze an island or page script.
pub fn analyze_script(raw: &str) -> Result<ScriptAnalysis, String> {
    if raw.trim().is_empty() {
        return Ok(ScriptAnalysis::default());
    }

    let (lowered, state_names) = lower_state(raw);

    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let ret = Parser::new(&allocator, &lowered, source_type).parse();
    if !ret.errors.is_empty() {
        return Err(ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; "));
    }

    let slice = |start: u32, end: u32| lowered[start as usize..end as usize].to_string();

    let mut imports = Vec::new();
    let mut import_spans = Vec::new();
    let mut declarations = Vec::new();

    for stmt in &ret.program.body {
        match stmt {
            Statement::ImportDeclaration(import_decl) => {
                let mut locals = Vec::new();
                let mut default_local = None;
                if let Some(specifiers) = &import_decl.specifiers {
                    for specifier in specifiers {
                        match specifier {
                            ImportDeclarationSpecifier::ImportSpecifier(s) => {
                                locals.push(s.local.name.to_string());
                            }
                            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                                default_local = Some(s.local.name.to_string());
                                locals.push(s.local.name.to_string());
                            }
                            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                                locals.push(s.local.name.to_string());
                            }
                        }
                    }
                }
                let span = import_decl.span;
                imports.push(ImportDecl {
                    specifier: import_decl.source.value.to_string(),
                    locals,
                    default_local,
                    code: slice(span.start, span.end),
                });
                import_spans.push((span.start as usize, span.end as usize));
            }
            Statement::VariableDeclaration(var_decl) => {
                let base_kind = match var_decl.kind {
                    oxc_ast::ast::VariableDeclarationKind::Const => DeclarationKind::Const,
                    oxc_ast::ast::VariableDeclarationKind::Var => DeclarationKind::Var,
                    _ => DeclarationKind::Let,
                };
                for decl in &var_decl.declarations {
                    let init = decl.init.as_ref().map(|init| {
                        let span = init.span();
                        slice(span.start, span.end)
                    });
                    let mut names = Vec::new();
                    collect_binding_names(&decl.id, &mut names);
                    // Destructured bindings have no per-name initializer.
                    let single = names.len() == 1 && matches!(decl.id, BindingPattern::BindingIdentifier(_));
                    for name in names {
                        let kind = if base_kind == DeclarationKind::Let && state_names.contains(&name) {
                            DeclarationKind::State
                        } else {
                            base_kind
                        };
                        declarations.push(Declaration {
                            init: if single { init.clone() } else { None },
                            name,
                            kind,
                        });
                    }
                }
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    declarations.push(Declaration {
                        name: id.name.to_string(),
                        kind: DeclarationKind::Function,
                        init: None,
                    });
                }
            }
            Statement::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    declarations.push(Declaration {
                        name: id.name.to_string(),
                        kind: DeclarationKind::Class,
                        init: None,
                    });
                }
            }
            Statement::ExportNamedDeclaration(_)
            | Statement::ExportDefaultDeclaration(_)
            | Statement::ExportAllDeclaration(_) => {
                return Err("exports are not allowed in component scripts".to_string());
            }
            _ => {}
        }
    }

    let mut body = lowered.clone();
    for (start, end) in import_spans.into_iter().rev() {
        body.replace_range(start..end, "");
    }

    Ok(ScriptAnalysis {
        imports,
        body: body.trim().to_string(),
        declarations,
    })
}

fn collect_binding_names(pattern: &BindingPattern<'_>, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => names.push(id.name.to_string()),
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_names(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_names(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for element in arr.elements.iter().flatten() {
                collect_binding_names(element, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_names(&rest.argument, names);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_state_only_at_statement_start() {
        let (lowered, names) = lower_state("state count = 0;\nconst state = 1;\nobj.state = 2;");
        assert!(lowered.starts_with("let count = 0;"));
        assert!(lowered.contains("const state = 1;"));
        assert!(lowered.contains("obj.state = 2;"));
        assert!(names.contains("count"));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_imports_split_from_body() {
        let analysis = analyze_script(
            "import \"./counter.css\";\nimport { format } from \"./fmt.js\";\nstate count = initial;\nfunction inc() { count += 1; }",
        )
        .unwrap();

        assert_eq!(analysis.imports.len(), 2);
        assert!(analysis.imports[0].is_style());
        assert_eq!(analysis.imports[1].locals, vec!["format".to_string()]);
        assert_eq!(analysis.style_imports().count(), 1);
        assert!(!analysis.body.contains("import"));
        assert!(analysis.body.starts_with("let count = initial;"));
    }

    #[test]
    fn test_declarations_in_source_order() {
        let analysis =
            analyze_script("state count = 1;\nconst double = count * 2;\nfunction inc() {}\nlet { a, b } = obj;")
                .unwrap();
        let summary: Vec<_> = analysis
            .declarations
            .iter()
            .map(|d| (d.name.as_str(), d.kind, d.init.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("count", DeclarationKind::State, Some("1")),
                ("double", DeclarationKind::Const, Some("count * 2")),
                ("inc", DeclarationKind::Function, None),
                ("a", DeclarationKind::Let, None),
                ("b", DeclarationKind::Let, None),
            ]
        );
    }

    #[test]
    fn test_exports_rejected() {
        assert!(analyze_script("export const x = 1;").is_err());
    }

    #[test]
    fn test_style_specifier_with_query() {
        assert!(is_style_specifier("./a.css?inline"));
        assert!(!is_style_specifier("./a.js"));
    }
}
