//! In-memory render tree and its serialization to markup.

use crate::template::is_void_element;

/// Elements whose text content is written verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode {
    Element(RenderElement),
    /// Escaped on output.
    Text(String),
    /// Already-serialized markup, written as is.
    Raw(String),
    Doctype(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderElement {
    pub tag: String,
    /// `None` values serialize as bare attributes.
    pub attrs: Vec<(String, Option<String>)>,
    pub children: Vec<RenderNode>,
}

impl RenderElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), Some(value.into())));
        self
    }

    pub fn child(mut self, node: RenderNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }
}

impl From<RenderElement> for RenderNode {
    fn from(element: RenderElement) -> Self {
        RenderNode::Element(element)
    }
}

impl RenderNode {
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out, false);
        out
    }

    fn write_html(&self, out: &mut String, raw_text: bool) {
        match self {
            RenderNode::Text(text) if raw_text => out.push_str(text),
            RenderNode::Text(text) => out.push_str(&escape_text(text)),
            RenderNode::Raw(html) => out.push_str(html),
            RenderNode::Doctype(name) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            RenderNode::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if let Some(value) = value {
                        out.push_str("=\"");
                        out.push_str(&escape_attr(value));
                        out.push('"');
                    }
                }
                out.push('>');
                if is_void_element(&el.tag) {
                    return;
                }
                let raw = RAW_TEXT_ELEMENTS.contains(&el.tag.as_str());
                for child in &el.children {
                    child.write_html(out, raw);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
}

pub fn to_html(nodes: &[RenderNode]) -> String {
    nodes.iter().map(RenderNode::to_html).collect()
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
