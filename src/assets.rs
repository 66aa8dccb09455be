//! Per-page assets and their injection into final markup.

use serde::{Deserialize, Serialize};

use crate::render::{RenderElement, RenderNode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "lowercase")]
pub enum Asset {
    Link {
        attrs: Vec<(String, String)>,
    },
    Script {
        attrs: Vec<(String, String)>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
}

impl Asset {
    pub fn stylesheet(href: impl Into<String>) -> Self {
        Asset::Link {
            attrs: vec![
                ("rel".to_string(), "stylesheet".to_string()),
                ("href".to_string(), href.into()),
            ],
        }
    }

    pub fn module_script(src: impl Into<String>) -> Self {
        Asset::Script {
            attrs: vec![
                ("type".to_string(), "module".to_string()),
                ("src".to_string(), src.into()),
            ],
            content: None,
        }
    }

    pub fn inline_module(content: impl Into<String>) -> Self {
        Asset::Script {
            attrs: vec![("type".to_string(), "module".to_string())],
            content: Some(content.into()),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        let attrs = match self {
            Asset::Link { attrs } | Asset::Script { attrs, .. } => attrs,
        };
        attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn to_node(&self) -> RenderNode {
        let (tag, attrs, content) = match self {
            Asset::Link { attrs } => ("link", attrs, None),
            Asset::Script { attrs, content } => ("script", attrs, content.as_ref()),
        };
        let mut el = RenderElement::new(tag);
        for (name, value) in attrs {
            el = el.attr(name.clone(), value.clone());
        }
        if let Some(content) = content {
            el = el.child(RenderNode::Text(content.clone()));
        }
        el.into()
    }

    pub fn to_html(&self) -> String {
        self.to_node().to_html()
    }
}

/// First element named `tag`, depth first. Script and style contents are
/// text nodes, so markup inside them is never matched.
fn find_element_mut<'a>(nodes: &'a mut [RenderNode], tag: &str) -> Option<&'a mut RenderElement> {
    nodes.iter_mut().find_map(|node| match node {
        RenderNode::Element(el) => {
            if el.tag.eq_ignore_ascii_case(tag) {
                Some(el)
            } else {
                find_element_mut(&mut el.children, tag)
            }
        }
        _ => None,
    })
}

/// Append `assets` to the document's `<head>`, or put them first when there
/// is no head.
pub fn inject(nodes: &mut Vec<RenderNode>, assets: &[Asset]) {
    let rendered = assets.iter().map(Asset::to_node);
    match find_element_mut(nodes, "head") {
        Some(head) => head.children.extend(rendered),
        None => {
            nodes.splice(0..0, rendered);
        }
    }
}

/// Append `node` to the document's `<body>`, or at the end when there is no
/// body.
pub fn append_to_body(nodes: &mut Vec<RenderNode>, node: RenderNode) {
    match find_element_mut(nodes, "body") {
        Some(body) => body.children.push(node),
        None => nodes.push(node),
    }
}
