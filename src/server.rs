//! Server artifact of a compiled island.
//!
//! Rendering is synchronous and engine-free: the template is walked once and
//! every expression goes through [`crate::eval`]. The output carries the
//! `data-zx-*` markers the client binder uses to attach to the markup in
//! place instead of re-rendering it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EvalError;
use crate::eval::{evaluate, to_display_string, Scope};
use crate::render::{RenderElement, RenderNode};
use crate::script::{Declaration, DeclarationKind};
use crate::template::{significant_roots, AttributeValue, TemplateIR, TemplateNode, EVENT_PREFIX};

/// Marker on a text expression span: `data-zx-e="N"`.
pub const TEXT_MARKER: &str = "data-zx-e";
/// Marker listing dynamic attributes: `data-zx-a="name:N …"`.
pub const ATTR_MARKER: &str = "data-zx-a";
/// Marker listing event bindings: `data-zx-on="event:N …"`.
pub const EVENT_MARKER: &str = "data-zx-on";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerModule {
    pub template: TemplateIR,
    /// Names from the script's `props` attribute.
    pub props: Vec<String>,
    pub declarations: Vec<Declaration>,
    /// Bindings introduced by non-style imports.
    pub imported: Vec<String>,
    /// Styling imports replaced by an empty module.
    pub stubbed_styles: usize,
}

impl ServerModule {
    /// Render static markup for `props`.
    pub fn render(&self, props: &Map<String, Value>) -> Result<String, EvalError> {
        Ok(self.render_node(props)?.to_html())
    }

    pub fn render_node(&self, props: &Map<String, Value>) -> Result<RenderNode, EvalError> {
        let scope = self.scope(props);

        let roots = significant_roots(&self.template.nodes);
        if let [root] = roots.as_slice() {
            if matches!(root, TemplateNode::Element(_)) {
                let mut out = Vec::new();
                render_node(root, &scope, &mut out)?;
                if let Some(node) = out.pop() {
                    return Ok(node);
                }
            }
        }

        // Zero or several roots: one container element for the client mount.
        let mut wrapper = RenderElement::new("div");
        for node in &self.template.nodes {
            render_node(node, &scope, &mut wrapper.children)?;
        }
        Ok(wrapper.into())
    }

    fn scope(&self, props: &Map<String, Value>) -> Scope {
        let mut scope = Scope::for_props(props);
        for name in &self.props {
            if !props.contains_key(name) {
                scope.define(name, Value::Null);
            }
        }
        bind_script(&mut scope, &self.imported, &self.declarations);
        scope
    }
}

/// Add a script's imports and top-level declarations to `scope`, in source
/// order. A failed initializer makes its name unavailable rather than
/// failing outright.
pub fn bind_script(scope: &mut Scope, imported: &[String], declarations: &[Declaration]) {
    for name in imported {
        scope.mark_unavailable(name, "imported modules are not loaded on the server");
    }
    for decl in declarations {
        match (decl.kind, &decl.init) {
            (DeclarationKind::Function | DeclarationKind::Class, _) => {
                scope.mark_unavailable(&decl.name, "functions only exist in the browser");
            }
            (_, Some(init)) => match evaluate(init, scope) {
                Ok(value) => scope.define(&decl.name, value),
                Err(err) => scope.mark_unavailable(&decl.name, err.to_string()),
            },
            (_, None) => scope.define(&decl.name, Value::Null),
        }
    }
}

fn render_node(node: &TemplateNode, scope: &Scope, out: &mut Vec<RenderNode>) -> Result<(), EvalError> {
    match node {
        TemplateNode::Text(text) => out.push(RenderNode::Text(text.value.clone())),
        TemplateNode::Expression(expr) => {
            let value = evaluate(&expr.expression.code, scope)?;
            let span = RenderElement::new("span")
                .attr(TEXT_MARKER, expr.expression.index.to_string())
                .child(RenderNode::Text(to_display_string(&value)));
            out.push(span.into());
        }
        TemplateNode::Element(element) => {
            let mut el = RenderElement::new(element.tag.clone());
            let mut dynamic = Vec::new();
            let mut events = Vec::new();

            for attr in &element.attributes {
                if let Some(event) = attr.name.strip_prefix(EVENT_PREFIX) {
                    if let AttributeValue::Dynamic(expr) = &attr.value {
                        events.push(format!("{}:{}", event, expr.index));
                    }
                    continue;
                }
                match &attr.value {
                    AttributeValue::Static(value) => {
                        el.attrs.push((attr.name.clone(), Some(value.clone())));
                    }
                    AttributeValue::Flag => el.attrs.push((attr.name.clone(), None)),
                    AttributeValue::Dynamic(expr) => {
                        dynamic.push(format!("{}:{}", attr.name, expr.index));
                        match evaluate(&expr.code, scope)? {
                            Value::Null | Value::Bool(false) => {}
                            Value::Bool(true) => el.attrs.push((attr.name.clone(), None)),
                            value => el
                                .attrs
                                .push((attr.name.clone(), Some(to_display_string(&value)))),
                        }
                    }
                }
            }
            if !dynamic.is_empty() {
                el.attrs.push((ATTR_MARKER.to_string(), Some(dynamic.join(" "))));
            }
            if !events.is_empty() {
                el.attrs.push((EVENT_MARKER.to_string(), Some(events.join(" "))));
            }

            for child in &element.children {
                render_node(child, scope, &mut el.children)?;
            }
            out.push(el.into());
        }
        TemplateNode::Component(component) => {
            return Err(EvalError::Unsupported(format!(
                "component <{}> inside an island",
                component.name
            )));
        }
        TemplateNode::Doctype(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_template, ParseMode};
    use crate::script::analyze_script;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn module(script: &str, props: &[&str], template: &str) -> ServerModule {
        let analysis = analyze_script(script).unwrap();
        ServerModule {
            template: parse_template(template, ParseMode::Fragment).unwrap(),
            props: props.iter().map(|p| p.to_string()).collect(),
            declarations: analysis.declarations,
            imported: Vec::new(),
            stubbed_styles: 0,
        }
    }

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_counter_renders_initial_state() {
        let counter = module(
            "state count = initial;\nfunction inc() { count += 1; }",
            &["initial"],
            r#"<button class="counter" on:click={inc}>{count}</button>"#,
        );
        let html = counter.render(&props(json!({ "initial": 5 }))).unwrap();
        assert_eq!(
            html,
            r#"<button class="counter" data-zx-on="click:0"><span data-zx-e="1">5</span></button>"#
        );
    }

    #[test]
    fn test_dynamic_attributes_are_marked() {
        let link = module("", &["href", "active"], r#"<a href={href} hidden={!active}>go</a>"#);
        let html = link
            .render(&props(json!({ "href": "/docs", "active": true })))
            .unwrap();
        assert_eq!(html, r#"<a href="/docs" data-zx-a="href:0 hidden:1">go</a>"#);
    }

    #[test]
    fn test_multiple_roots_are_wrapped() {
        let pair = module("", &[], "<p>a</p><p>b</p>");
        assert_eq!(pair.render(&Map::new()).unwrap(), "<div><p>a</p><p>b</p></div>");
    }

    #[test]
    fn test_browser_global_fails_render() {
        let width = module("const w = window.innerWidth;", &[], "<p>{w}</p>");
        assert!(matches!(
            width.render(&Map::new()),
            Err(EvalError::Unavailable { name, .. }) if name == "w"
        ));
    }

    #[test]
    fn test_unreferenced_failure_is_harmless() {
        let ok = module("const w = window.innerWidth;", &["label"], "<p>{label}</p>");
        assert_eq!(
            ok.render(&props(json!({ "label": "hi" }))).unwrap(),
            r#"<p><span data-zx-e="0">hi</span></p>"#
        );
    }
}
