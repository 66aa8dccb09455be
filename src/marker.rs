//! Marker runtime.
//!
//! Turns an island invocation into render-tree output while a page is being
//! built: static markup from the island's server module, wrapped in an
//! `<island-root>` element carrying what the browser needs to hydrate it.
//! One runtime exists per page build and owns that page's usage state.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

use crate::error::MarkerError;
use crate::hydration::WRAPPER_TAG;
use crate::ident::IslandId;
use crate::props::encode_props;
use crate::registry::RecordSet;
use crate::render::{escape_attr, RenderElement, RenderNode};

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Directive {
    /// Static markup only; never hydrated.
    NoPasaran,
    /// Hydrate as soon as the element is attached.
    LeninAwake,
    /// Hydrate when the element enters the viewport.
    #[default]
    ComradeVisible,
}

impl Directive {
    pub const ALL: [Directive; 3] = [
        Directive::NoPasaran,
        Directive::LeninAwake,
        Directive::ComradeVisible,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Directive::NoPasaran => "no:pasaran",
            Directive::LeninAwake => "lenin:awake",
            Directive::ComradeVisible => "comrade:visible",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.token() == token)
    }

    pub fn hydrates(self) -> bool {
        self != Directive::NoPasaran
    }
}

/// Resolve the directive of an invocation and strip every directive key
/// from its properties.
pub fn extract_directive(
    id: &IslandId,
    mut props: Map<String, Value>,
) -> Result<(Directive, Map<String, Value>), MarkerError> {
    let present: Vec<Directive> = Directive::ALL
        .into_iter()
        .filter(|d| props.contains_key(d.token()))
        .collect();

    if present.len() > 1 {
        return Err(MarkerError::ConflictingDirectives {
            id: id.clone(),
            directives: present.iter().map(|d| d.token()).collect(),
        });
    }
    for directive in &present {
        props.remove(directive.token());
    }

    Ok((present.first().copied().unwrap_or_default(), props))
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNTIME
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageUsage {
    pub used_islands: BTreeSet<IslandId>,
    /// True once any used island hydrates.
    pub needs_hydration: bool,
}

pub struct MarkerRuntime {
    records: Arc<RecordSet>,
    usage: PageUsage,
}

impl MarkerRuntime {
    pub fn new(records: Arc<RecordSet>) -> Self {
        Self {
            records,
            usage: PageUsage::default(),
        }
    }

    pub fn render_marker(&mut self, id: &IslandId, props: Map<String, Value>) -> Result<RenderNode, MarkerError> {
        let record = self
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| MarkerError::UnknownIsland(id.clone()))?;

        self.usage.used_islands.insert(id.clone());

        let (directive, props) = extract_directive(id, props)?;

        let markup = match record.server_module.render(&props) {
            Ok(markup) => markup,
            Err(err) => {
                warn!(island = %id, error = %err, "server render failed, using fallback markup");
                fallback_markup(id)
            }
        };

        if !directive.hydrates() {
            return Ok(RenderElement::new("div")
                .attr("data-island", id.as_str())
                .child(RenderNode::Raw(markup))
                .into());
        }

        self.usage.needs_hydration = true;

        let mut wrapper = RenderElement::new(WRAPPER_TAG)
            .attr("directive", directive.token())
            .attr("import", record.client_path.clone());
        for (name, value) in encode_props(&props) {
            wrapper = wrapper.attr(name, value);
        }
        Ok(wrapper.child(RenderNode::Raw(markup)).into())
    }

    pub fn usage(&self) -> &PageUsage {
        &self.usage
    }

    pub fn finish(self) -> PageUsage {
        self.usage
    }
}

/// Markup standing in for an island whose server render failed.
pub fn fallback_markup(id: &IslandId) -> String {
    format!(
        "<div class=\"island-error\" data-island=\"{}\">This island could not be rendered.</div>",
        escape_attr(id.as_str())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_template, ParseMode};
    use crate::registry::IslandRecord;
    use crate::script::analyze_script;
    use crate::server::ServerModule;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;

    fn record(id: &str, script: &str, props: &[&str], template: &str) -> IslandRecord {
        IslandRecord {
            id: IslandId::from(id),
            source_path: PathBuf::from(format!("/site/{}", id)),
            server_module: Arc::new(ServerModule {
                template: parse_template(template, ParseMode::Fragment).unwrap(),
                props: props.iter().map(|p| p.to_string()).collect(),
                declarations: analyze_script(script).unwrap().declarations,
                imported: Vec::new(),
                stubbed_styles: 0,
            }),
            client_path: format!("/islands/{}-0badc0de.js", id.trim_end_matches(".zen")),
            style_content: None,
            style_href: None,
            source_hash: String::new(),
        }
    }

    fn runtime() -> MarkerRuntime {
        MarkerRuntime::new(Arc::new(RecordSet::from_records([
            record("Counter.zen", "state count = initial;", &["initial"], "<b>{count}</b>"),
            record("Width.zen", "", &[], "<p>{window.innerWidth}</p>"),
        ])))
    }

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_default_directive_is_visible() {
        let (directive, rest) =
            extract_directive(&IslandId::from("A.zen"), props(json!({ "a": 1 }))).unwrap();
        assert_eq!(directive, Directive::ComradeVisible);
        assert_eq!(Value::Object(rest), json!({ "a": 1 }));
    }

    #[test]
    fn test_directive_is_stripped() {
        let (directive, rest) = extract_directive(
            &IslandId::from("A.zen"),
            props(json!({ "lenin:awake": true, "a": 1 })),
        )
        .unwrap();
        assert_eq!(directive, Directive::LeninAwake);
        assert_eq!(Value::Object(rest), json!({ "a": 1 }));
    }

    #[test]
    fn test_conflicting_directives_are_all_named() {
        let err = extract_directive(
            &IslandId::from("A.zen"),
            props(json!({ "no:pasaran": true, "lenin:awake": true, "comrade:visible": true })),
        )
        .unwrap_err();
        assert_eq!(
            err,
            MarkerError::ConflictingDirectives {
                id: IslandId::from("A.zen"),
                directives: vec!["no:pasaran", "lenin:awake", "comrade:visible"],
            }
        );
        let message = err.to_string();
        assert!(message.contains("no:pasaran") && message.contains("lenin:awake"));
    }

    #[test]
    fn test_hydration_wrapper() {
        let mut runtime = runtime();
        let node = runtime
            .render_marker(&IslandId::from("Counter.zen"), props(json!({ "initial": 5 })))
            .unwrap();
        assert_eq!(
            node.to_html(),
            r#"<island-root directive="comrade:visible" import="/islands/Counter-0badc0de.js" data-initial="n:5"><b><span data-zx-e="0">5</span></b></island-root>"#
        );
        assert!(runtime.usage().needs_hydration);
    }

    #[test]
    fn test_no_pasaran_has_no_wrapper() {
        let mut runtime = runtime();
        let node = runtime
            .render_marker(
                &IslandId::from("Counter.zen"),
                props(json!({ "initial": 1, "no:pasaran": true })),
            )
            .unwrap();
        let html = node.to_html();
        assert!(html.starts_with(r#"<div data-island="Counter.zen">"#));
        assert!(!html.contains("island-root"));
        assert!(!html.contains("import="));

        let usage = runtime.finish();
        assert!(!usage.needs_hydration);
        assert_eq!(usage.used_islands.len(), 1);
    }

    #[test]
    fn test_render_failure_uses_fallback() {
        let mut runtime = runtime();
        let node = runtime
            .render_marker(&IslandId::from("Width.zen"), Map::new())
            .unwrap();
        assert!(node.to_html().contains(r#"class="island-error" data-island="Width.zen""#));
    }

    #[test]
    fn test_unknown_island_is_fatal() {
        let mut runtime = runtime();
        assert_eq!(
            runtime.render_marker(&IslandId::from("Nope.zen"), Map::new()),
            Err(MarkerError::UnknownIsland(IslandId::from("Nope.zen")))
        );
    }

    #[test]
    fn test_usage_tracks_each_island_once() {
        let mut runtime = runtime();
        let id = IslandId::from("Counter.zen");
        runtime.render_marker(&id, props(json!({ "initial": 1 }))).unwrap();
        runtime.render_marker(&id, props(json!({ "initial": 2 }))).unwrap();
        let usage = runtime.finish();
        assert_eq!(usage.used_islands.into_iter().collect::<Vec<_>>(), vec![id]);
    }
}
