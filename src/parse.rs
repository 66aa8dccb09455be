//! Parse Module
//!
//! Splits a `.zen` source into script, styles and template, and parses the
//! template with html5ever into [`TemplateNode`]s. Expressions are swapped
//! for placeholders before html5ever sees the markup, then restored onto the
//! nodes with their table index.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use std::collections::HashMap;

use crate::template::{
    AttributeIR, AttributeValue, ComponentNode, DoctypeNode, ElementNode, ExpressionIR,
    ExpressionNode, ScriptIR, TemplateIR, TemplateNode, TextNode,
};

lazy_static! {
    static ref EXPR_PLACEHOLDER_RE: Regex = Regex::new(r"__ISLAND_EXPR_(\d+)__").unwrap();
    static ref SCRIPT_RE: Regex = Regex::new(r"(?is)<script\b([^>]*)>([\s\S]*?)</script>").unwrap();
    static ref STYLE_RE: Regex = Regex::new(r"(?is)<style[^>]*>([\s\S]*?)</style>").unwrap();
    static ref ATTR_RE: Regex =
        Regex::new(r#"(?i)([a-z0-9-]+)(?:=(?:"([^"]*)"|'([^']*)'|([^>\s]+)))?"#).unwrap();
    static ref HTML_COMMENT_RE: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref SELF_CLOSING_RE: Regex = Regex::new(r"<([A-Z][a-zA-Z0-9]*)\s*([^>]*?)\s*/>").unwrap();
    static ref TAG_OPEN_RE: Regex = Regex::new(r"<([A-Z][a-zA-Z0-9]*)(\s|>)").unwrap();
    static ref EMPTY_ATTR_RE: Regex =
        Regex::new(r#"(<[A-Za-z][^<>]*?\s[A-Za-z_:][\w:.-]*)=(?:""|'')"#).unwrap();
}

/// Stands in for an explicitly empty attribute value, which html5ever
/// would otherwise report the same as a valueless attribute.
const EMPTY_VALUE_MARKER: &str = "__ISLAND_EMPTY__";

/// Attribute used to carry a component's original casing through html5ever,
/// which lowercases every tag name.
const ORIG_NAME_ATTR: &str = "data-island-orig-name";

/// How the html5ever document is flattened back into template nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Island templates: `<html>`, `<head>` and `<body>` wrappers are dropped.
    Fragment,
    /// Pages: document structure is kept if the source wrote `<html>`.
    Document,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SVG ATTRIBUTE CASE
// ═══════════════════════════════════════════════════════════════════════════════

/// html5ever lowercases attributes; SVG needs a handful back in camelCase.
fn correct_svg_attribute_name(attr_name: &str, tag_name: &str) -> String {
    const SVG_TAGS: &[&str] = &[
        "svg", "path", "g", "symbol", "marker", "pattern", "lineargradient", "radialgradient",
        "mask", "clippath", "filter", "use", "text",
    ];
    if !SVG_TAGS.contains(&tag_name.to_lowercase().as_str()) {
        return attr_name.to_string();
    }
    match attr_name.to_lowercase().as_str() {
        "viewbox" => "viewBox",
        "preserveaspectratio" => "preserveAspectRatio",
        "gradienttransform" => "gradientTransform",
        "gradientunits" => "gradientUnits",
        "patternunits" => "patternUnits",
        "markerwidth" => "markerWidth",
        "markerheight" => "markerHeight",
        "stddeviation" => "stdDeviation",
        "textlength" => "textLength",
        _ => return attr_name.to_string(),
    }
    .to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRE-PASSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Find the end of a balanced brace expression, skipping strings and template
/// literals. Returns the char index after the closing brace.
fn find_balanced_brace_end(chars: &[char], start_index: usize) -> Option<usize> {
    let mut depth = 0;
    let mut i = start_index;
    let mut in_string: Option<char> = None;
    let mut in_template_literal = false;
    let mut template_brace_depth = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\\' && i + 1 < chars.len() {
            i += 2;
            continue;
        }

        if in_string.is_some() {
            if Some(c) == in_string {
                in_string = None;
            }
            i += 1;
            continue;
        }

        if in_template_literal {
            if c == '`' && template_brace_depth == 0 {
                in_template_literal = false;
            } else if c == '$' && i + 1 < chars.len() && chars[i + 1] == '{' {
                template_brace_depth += 1;
                i += 2;
                continue;
            } else if c == '}' && template_brace_depth > 0 {
                template_brace_depth -= 1;
            }
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => in_string = Some(c),
            '`' => in_template_literal = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Replace every `{expr}` (text or attribute) with a placeholder html5ever
/// will carry through untouched.
fn normalize_all_expressions(html: &str) -> (String, HashMap<String, String>) {
    let mut normalized = String::with_capacity(html.len());
    let mut expressions = HashMap::new();
    let chars: Vec<char> = html.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '{' {
            if let Some(end) = find_balanced_brace_end(&chars, i) {
                let raw: String = chars[i + 1..end - 1].iter().collect();
                let code = HTML_COMMENT_RE.replace_all(&raw, "").trim().to_string();
                let placeholder = format!("__ISLAND_EXPR_{}__", expressions.len());
                expressions.insert(placeholder.clone(), code);
                normalized.push_str(&placeholder);
                i = end;
                continue;
            }
        }
        normalized.push(c);
        i += 1;
    }

    (normalized, expressions)
}

/// `<Counter />` is an open tag to html5ever; close it explicitly.
fn convert_self_closing_components(html: &str) -> String {
    SELF_CLOSING_RE.replace_all(html, "<$1 $2></$1>").to_string()
}

/// Record each component's original casing in an attribute.
fn mark_component_tags(html: &str) -> String {
    TAG_OPEN_RE
        .replace_all(html, |caps: &regex::Captures| {
            format!("<{} {}=\"{}\"{}", &caps[1], ORIG_NAME_ATTR, &caps[1], &caps[2])
        })
        .to_string()
}

/// Remove inline scripts and all style blocks. External scripts stay.
fn strip_blocks(html: &str) -> String {
    let result = SCRIPT_RE.replace_all(html, |caps: &regex::Captures| {
        if caps[1].contains("src=") {
            caps[0].to_string()
        } else {
            String::new()
        }
    });
    STYLE_RE.replace_all(&result, "").to_string()
}

/// Check if a tag name represents a component (starts with uppercase)
pub fn is_component_tag(tag_name: &str) -> bool {
    tag_name
        .chars()
        .next()
        .map(|c| c.is_uppercase())
        .unwrap_or(false)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE CONVERSION
// ═══════════════════════════════════════════════════════════════════════════════

struct NodeBuilder<'a> {
    placeholders: &'a HashMap<String, String>,
    expressions: Vec<ExpressionIR>,
}

impl<'a> NodeBuilder<'a> {
    fn register(&mut self, placeholder: &str) -> Option<ExpressionIR> {
        let code = self.placeholders.get(placeholder)?;
        let expr = ExpressionIR {
            index: self.expressions.len(),
            code: code.clone(),
        };
        self.expressions.push(expr.clone());
        Some(expr)
    }

    fn convert(&mut self, handle: &Handle) -> Vec<TemplateNode> {
        match &handle.data {
            NodeData::Doctype { name, .. } => vec![TemplateNode::Doctype(DoctypeNode {
                name: name.to_string(),
            })],

            NodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                self.convert_text(&text)
            }

            NodeData::Element { name, attrs, .. } => {
                let attributes = attrs.borrow();
                let mut tag_name = name.local.to_string();
                if let Some(orig) = attributes
                    .iter()
                    .find(|a| &*a.name.local == ORIG_NAME_ATTR)
                {
                    tag_name = orig.value.to_string();
                }

                let mut parsed_attrs = Vec::new();
                for attr in attributes.iter() {
                    let raw_name = attr.name.local.to_string();
                    if raw_name == ORIG_NAME_ATTR {
                        continue;
                    }
                    let attr_name = correct_svg_attribute_name(&raw_name, &tag_name);
                    let attr_value = attr.value.to_string();

                    parsed_attrs.push(AttributeIR {
                        name: attr_name,
                        value: self.convert_attribute_value(attr_value),
                    });
                }

                let mut children = Vec::new();
                for child in handle.children.borrow().iter() {
                    children.extend(self.convert(child));
                }

                if is_component_tag(&tag_name) {
                    vec![TemplateNode::Component(ComponentNode {
                        name: tag_name,
                        attributes: parsed_attrs,
                        children,
                    })]
                } else {
                    vec![TemplateNode::Element(ElementNode {
                        tag: tag_name,
                        attributes: parsed_attrs,
                        children,
                    })]
                }
            }

            _ => vec![],
        }
    }

    /// `attr={expr}` becomes dynamic; `attr="a {b}"` becomes a template
    /// literal expression. A valueless attribute is a flag, `attr=""` is
    /// the empty string.
    fn convert_attribute_value(&mut self, value: String) -> AttributeValue {
        if value.is_empty() {
            return AttributeValue::Flag;
        }
        if value == EMPTY_VALUE_MARKER {
            return AttributeValue::Static(String::new());
        }
        if !EXPR_PLACEHOLDER_RE.is_match(&value) {
            return AttributeValue::Static(value);
        }

        let whole = EXPR_PLACEHOLDER_RE
            .find(&value)
            .filter(|m| m.start() == 0 && m.end() == value.len())
            .map(|m| m.as_str().to_string());
        if let Some(placeholder) = whole {
            return match self.register(&placeholder) {
                Some(expr) => AttributeValue::Dynamic(expr),
                None => AttributeValue::Static(value),
            };
        }

        let mut code = String::from("`");
        let mut last_end = 0;
        for m in EXPR_PLACEHOLDER_RE.find_iter(&value) {
            code.push_str(&escape_template_chunk(&value[last_end..m.start()]));
            if let Some(inner) = self.placeholders.get(m.as_str()) {
                code.push_str("${");
                code.push_str(inner);
                code.push('}');
            }
            last_end = m.end();
        }
        code.push_str(&escape_template_chunk(&value[last_end..]));
        code.push('`');

        let expr = ExpressionIR {
            index: self.expressions.len(),
            code,
        };
        self.expressions.push(expr.clone());
        AttributeValue::Dynamic(expr)
    }

    /// Split text around expression placeholders.
    fn convert_text(&mut self, text: &str) -> Vec<TemplateNode> {
        let mut nodes = Vec::new();
        let mut last_end = 0;

        for m in EXPR_PLACEHOLDER_RE.find_iter(text) {
            if m.start() > last_end {
                push_text(&mut nodes, &text[last_end..m.start()]);
            }
            if let Some(expression) = self.register(m.as_str()) {
                nodes.push(TemplateNode::Expression(ExpressionNode { expression }));
            }
            last_end = m.end();
        }

        if last_end < text.len() {
            push_text(&mut nodes, &text[last_end..]);
        }
        nodes
    }
}

fn escape_template_chunk(chunk: &str) -> String {
    chunk.replace('\\', "\\\\").replace('`', "\\`").replace("${", "\\${")
}

/// Indentation-only text (blank with a newline) is dropped; inline spacing is kept.
fn push_text(nodes: &mut Vec<TemplateNode>, value: &str) {
    if value.trim().is_empty() && value.contains('\n') {
        return;
    }
    nodes.push(TemplateNode::Text(TextNode {
        value: value.to_string(),
    }));
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN PARSING FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse the template portion of a `.zen` source.
/// `label=""` → `label="__ISLAND_EMPTY__"`. One attribute per tag is
/// rewritten per pass, so repeat until none are left.
fn mark_empty_values(html: &str) -> String {
    let replacement = format!("$1=\"{}\"", EMPTY_VALUE_MARKER);
    let mut out = html.to_string();
    while EMPTY_ATTR_RE.is_match(&out) {
        out = EMPTY_ATTR_RE.replace_all(&out, replacement.as_str()).into_owned();
    }
    out
}

pub fn parse_template(source: &str, mode: ParseMode) -> Result<TemplateIR, String> {
    let stripped = strip_blocks(source);
    let (normalized, placeholders) = normalize_all_expressions(&stripped);
    let normalized = mark_empty_values(&normalized);
    let closed = convert_self_closing_components(&normalized);
    let marked = mark_component_tags(&closed);

    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut marked.as_bytes())
        .map_err(|e| format!("Failed to parse HTML: {}", e))?;

    let keep_document = mode == ParseMode::Document && source.to_lowercase().contains("<html");
    let mut builder = NodeBuilder {
        placeholders: &placeholders,
        expressions: Vec::new(),
    };
    let mut nodes = Vec::new();

    for child in dom.document.children.borrow().iter() {
        match &child.data {
            NodeData::Doctype { .. } if keep_document => nodes.extend(builder.convert(child)),
            NodeData::Element { .. } if keep_document => nodes.extend(builder.convert(child)),
            NodeData::Element { .. } => {
                // <html> → <head>/<body> → content
                for section in child.children.borrow().iter() {
                    for node in section.children.borrow().iter() {
                        nodes.extend(builder.convert(node));
                    }
                }
            }
            _ => {}
        }
    }

    Ok(TemplateIR {
        nodes,
        expressions: builder.expressions,
    })
}

/// Parse script block from a `.zen` source
pub fn parse_script(source: &str) -> Option<ScriptIR> {
    let mut scripts = Vec::new();
    let mut attributes = HashMap::new();

    for caps in SCRIPT_RE.captures_iter(source) {
        let attr_string = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        if attr_string.contains("src=") {
            continue;
        }
        let content = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        for attr_caps in ATTR_RE.captures_iter(attr_string) {
            if let Some(name) = attr_caps.get(1) {
                let value = attr_caps
                    .get(2)
                    .or_else(|| attr_caps.get(3))
                    .or_else(|| attr_caps.get(4))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| "true".to_string());
                attributes.insert(name.as_str().to_lowercase(), value);
            }
        }

        if !content.trim().is_empty() {
            scripts.push(content.trim().to_string());
        }
    }

    if scripts.is_empty() && attributes.is_empty() {
        return None;
    }

    Some(ScriptIR {
        raw: scripts.join("\n\n"),
        attributes,
    })
}

/// Contents of every `<style>` block, in source order.
pub fn extract_styles(source: &str) -> Vec<String> {
    STYLE_RE
        .captures_iter(source)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|css| !css.is_empty())
        .collect()
}

/// Comma-separated `props` attribute of the script tag.
pub fn declared_props(script: Option<&ScriptIR>) -> Vec<String> {
    script
        .and_then(|s| s.attributes.get("props"))
        .map(|p| {
            p.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
