//! Template IR shared by islands and pages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute prefix for event bindings (`on:click={handler}`).
pub const EVENT_PREFIX: &str = "on:";

/// Elements that never carry children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

// ═══════════════════════════════════════════════════════════════════════════════
// IR TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionIR {
    /// Position in the template's expression table (document order).
    pub index: usize,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    Static(String),
    Dynamic(ExpressionIR),
    /// Attribute written without a value (`<Counter lenin:awake />`).
    Flag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeIR {
    pub name: String,
    pub value: AttributeValue,
}

impl AttributeIR {
    pub fn is_event(&self) -> bool {
        self.name.starts_with(EVENT_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemplateNode {
    Element(ElementNode),
    Component(ComponentNode),
    Text(TextNode),
    Expression(ExpressionNode),
    Doctype(DoctypeNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    pub attributes: Vec<AttributeIR>,
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentNode {
    pub name: String,
    pub attributes: Vec<AttributeIR>,
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionNode {
    pub expression: ExpressionIR,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctypeNode {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateIR {
    pub nodes: Vec<TemplateNode>,
    pub expressions: Vec<ExpressionIR>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptIR {
    pub raw: String,
    pub attributes: HashMap<String, String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRAVERSAL HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Names of every component tag in `nodes`, depth first.
pub fn component_names(nodes: &[TemplateNode]) -> Vec<String> {
    fn traverse(node: &TemplateNode, names: &mut Vec<String>) {
        match node {
            TemplateNode::Component(comp) => {
                names.push(comp.name.clone());
                for child in &comp.children {
                    traverse(child, names);
                }
            }
            TemplateNode::Element(el) => {
                for child in &el.children {
                    traverse(child, names);
                }
            }
            _ => {}
        }
    }

    let mut names = Vec::new();
    for node in nodes {
        traverse(node, &mut names);
    }
    names
}

/// Top-level nodes that matter for layout: elements, components,
/// expressions and non-blank text.
pub fn significant_roots(nodes: &[TemplateNode]) -> Vec<&TemplateNode> {
    nodes
        .iter()
        .filter(|node| match node {
            TemplateNode::Text(text) => !text.value.trim().is_empty(),
            TemplateNode::Doctype(_) => false,
            _ => true,
        })
        .collect()
}
