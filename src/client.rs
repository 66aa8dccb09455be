//! Client module generation.
//!
//! The generated module default-exports `mount(container, props)`. It runs
//! the island script inside the mount closure, so every expression in the
//! `__exprs` table sees the live component state, then hands the table to
//! the binder which attaches to the server-rendered markers in place.

use std::collections::HashSet;

use crate::script::ScriptAnalysis;
use crate::template::TemplateIR;

const BINDER: &str = include_str!("runtime/binder.js");

/// ES module source for an island, before bundling.
pub fn generate_client_source(analysis: &ScriptAnalysis, props: &[String], template: &TemplateIR) -> String {
    let mut out = String::new();

    for import in &analysis.imports {
        out.push_str(&import.code);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(BINDER);
    out.push('\n');

    out.push_str("export default async function mount(container, props) {\n");

    // Props shadowed by a script declaration come from the declaration.
    let declared: HashSet<&str> = analysis
        .declarations
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    let destructured: Vec<&str> = props
        .iter()
        .map(String::as_str)
        .filter(|p| !declared.contains(p) && *p != "props")
        .collect();
    if !destructured.is_empty() {
        out.push_str(&format!("  let {{ {} }} = props;\n", destructured.join(", ")));
    }

    if !analysis.body.is_empty() {
        out.push_str(&analysis.body);
        out.push('\n');
    }

    out.push_str("  const __exprs = [\n");
    for expr in &template.expressions {
        out.push_str(&format!("    () => ({}),\n", expr.code));
    }
    out.push_str("  ];\n");
    out.push_str("  __bind(container, __exprs);\n");
    out.push_str("}\n");

    out
}
