//! End-to-end builds of small on-disk projects.

use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::{BuildMode, IslandsConfig};
use crate::error::{BuildError, MarkerError, PageError};
use crate::ident::IslandId;
use crate::marker::MarkerRuntime;
use crate::props::decode_props;
use crate::registry::IslandRegistry;
use crate::render::RenderNode;
use crate::site::SiteBuilder;

const COUNTER: &str = r#"<script props="initial, label">
  state count = initial;
  function increment() { count += 1; }
</script>
<style>.counter { color: red }</style>
<button class="counter" on:click={increment}>{label}: {count}</button>
"#;

const BADGE: &str = r#"<script props="text"></script>
<span class="badge">{text}</span>
"#;

const TAG: &str = r#"<script props="name"></script>
<style>.tag { font-weight: bold }</style>
<em class="tag">{name}</em>
"#;

const UNUSED: &str = r#"<style>.unused { color: blue }</style>
<p class="unused">never on a page</p>
"#;

const WIDTH: &str = r#"<p>{window.innerWidth}px</p>
"#;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn project(files: &[(&str, &str)]) -> (tempfile::TempDir, IslandsConfig) {
    let dir = tempfile::tempdir().unwrap();
    for (rel, content) in files {
        write(dir.path(), rel, content);
    }
    let config = IslandsConfig::new(dir.path());
    (dir, config)
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

#[test]
fn test_counter_page_end_to_end() {
    let (dir, config) = project(&[
        ("islands/Counter.zen", COUNTER),
        ("islands/Tag.zen", TAG),
        ("islands/Unused.zen", UNUSED),
        (
            "pages/index.zen",
            r#"<script>
import Counter from "../islands/Counter.zen";
import Tag from "../islands/Tag.zen";
</script>
<html>
<head><title>Home</title></head>
<body>
<Counter initial={5} label="Clicks" comrade:visible />
<Tag name="new" no:pasaran />
</body>
</html>
"#,
        ),
    ]);

    let report = SiteBuilder::new(config).build().unwrap();
    assert_eq!(report.islands, 3);
    assert_eq!(report.pages.len(), 1);

    let page = &report.pages[0];
    assert_eq!(page.out_path, dir.path().join("dist/index.html"));
    assert_eq!(read(dir.path(), "dist/index.html"), page.html);

    let html = &page.html;
    assert!(html.contains(r#"<island-root directive="comrade:visible" import="/islands/Counter-"#));
    assert!(html.contains(r#".js" data-initial="n:5" data-label="s:Clicks">"#));
    assert!(html.contains(">5</span>"));
    assert!(!html.contains("comrade:visible=\""));

    // Stylesheets of used islands only, static ones included, then the
    // runtime, all before </head>.
    let head_end = html.find("</head>").unwrap();
    let counter_css = html.find(r#"<link rel="stylesheet" href="/islands/Counter-"#).unwrap();
    let tag_css = html.find(r#"<link rel="stylesheet" href="/islands/Tag-"#).unwrap();
    let runtime = html.find(r#"<script type="module" src="/islands/runtime-"#).unwrap();
    assert!(counter_css < runtime && tag_css < runtime && runtime < head_end);
    assert_eq!(html.matches(r#"<link rel="stylesheet""#).count(), 2);
    assert!(!html.contains("Unused-"));
    assert!(!html.contains("__islands/reload"));

    let usage = &page.usage;
    assert!(usage.needs_hydration);
    assert_eq!(
        usage.used_islands.iter().collect::<Vec<_>>(),
        vec![
            &IslandId::from("islands/Counter.zen"),
            &IslandId::from("islands/Tag.zen")
        ]
    );
    assert!(dir
        .path()
        .join("dist")
        .join(report.runtime_href.trim_start_matches('/'))
        .is_file());
}

#[test]
fn test_two_invocations_share_one_record() {
    let (_dir, config) = project(&[
        ("islands/Counter.zen", COUNTER),
        (
            "pages/index.zen",
            r#"<script>import Counter from "../islands/Counter.zen";</script>
<main>
  <Counter initial={1} label="" />
  <Counter initial={2} label="b" lenin:awake />
</main>
"#,
        ),
    ]);

    let site = SiteBuilder::new(config);
    let report = site.build().unwrap();
    let html = &report.pages[0].html;

    assert_eq!(html.matches("<island-root").count(), 2);
    assert!(html.contains(r#"data-initial="n:1""#));
    assert!(html.contains(r#"data-initial="n:2""#));
    assert!(html.contains(r#"data-label="s:""#));
    assert!(!html.contains(r#"data-label="b:true""#));
    assert!(html.contains(r#"directive="lenin:awake""#));
    assert_eq!(site.registry().snapshot().len(), 1);
    assert_eq!(report.pages[0].usage.used_islands.len(), 1);
}

#[test]
fn test_static_only_page_has_no_runtime() {
    let (_dir, config) = project(&[
        ("islands/Badge.zen", BADGE),
        ("islands/Counter.zen", COUNTER),
        (
            "pages/about.zen",
            r#"<script>import Badge from "../islands/Badge.zen";</script>
<html><head><title>About</title></head><body>
<Badge text="new" no:pasaran />
</body></html>
"#,
        ),
        ("pages/plain.zen", "<html><head></head><body><p>no islands</p></body></html>\n"),
    ]);

    let report = SiteBuilder::new(config).build().unwrap();
    assert_eq!(report.pages.len(), 2);
    for page in &report.pages {
        assert!(!page.usage.needs_hydration);
        assert!(!page.html.contains("runtime-"));
        assert!(!page.html.contains("<island-root"));
    }

    let about = report
        .pages
        .iter()
        .find(|p| p.source_path.ends_with("about.zen"))
        .unwrap();
    assert!(about
        .html
        .contains(r#"<div data-island="islands/Badge.zen"><span class="badge"><span data-zx-e="0">new</span></span></div>"#));
    assert!(!about.html.contains("import="));
}

#[test]
fn test_failing_server_render_falls_back() {
    let (dir, config) = project(&[
        ("islands/Width.zen", WIDTH),
        (
            "pages/index.zen",
            r#"<script>import Width from "../islands/Width.zen";</script>
<section><Width lenin:awake /></section>
"#,
        ),
    ]);

    let report = SiteBuilder::new(config).build().unwrap();
    let html = read(dir.path(), "dist/index.html");
    assert_eq!(html, report.pages[0].html);
    assert!(html.contains(r#"<div class="island-error" data-island="islands/Width.zen">"#));
    assert!(html.contains(r#"directive="lenin:awake""#));
    assert!(report.pages[0].usage.needs_hydration);
}

#[test]
fn test_conflicting_directives_fail_the_build() {
    let (_dir, config) = project(&[
        ("islands/Counter.zen", COUNTER),
        (
            "pages/index.zen",
            r#"<script>import Counter from "../islands/Counter.zen";</script>
<Counter initial={1} lenin:awake comrade:visible />
"#,
        ),
    ]);

    let err = SiteBuilder::new(config).build().unwrap_err();
    match &err {
        BuildError::Page(PageError::Marker { path, source }) => {
            assert!(path.ends_with("pages/index.zen"));
            assert_eq!(
                source,
                &MarkerError::ConflictingDirectives {
                    id: IslandId::from("islands/Counter.zen"),
                    directives: vec!["lenin:awake", "comrade:visible"],
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("lenin:awake") && message.contains("comrade:visible"));
}

#[test]
fn test_unimported_component_is_reported() {
    let (_dir, config) = project(&[("pages/index.zen", "<div><Missing /></div>\n")]);

    let err = SiteBuilder::new(config).build().unwrap_err();
    assert!(matches!(
        err,
        BuildError::Page(PageError::UnknownComponent { ref name, .. }) if name == "Missing"
    ));
}

#[test]
fn test_broken_island_aborts_before_pages() {
    let (dir, config) = project(&[
        ("islands/Outer.zen", "<div><Inner /></div>\n"),
        ("pages/index.zen", "<p>hello</p>\n"),
    ]);

    let err = SiteBuilder::new(config).build().unwrap_err();
    assert!(err.to_string().contains("Outer.zen"));
    assert!(!dir.path().join("dist/index.html").exists());
}

#[test]
fn test_property_round_trip_through_wrapper() {
    let (_dir, config) = project(&[("islands/Counter.zen", COUNTER)]);
    let registry = IslandRegistry::new(config);
    registry.load().unwrap();

    let props = match json!({ "count": 3, "label": "x" }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let mut runtime = MarkerRuntime::new(registry.snapshot());
    let node = runtime
        .render_marker(&IslandId::from("islands/Counter.zen"), props.clone())
        .unwrap();

    let RenderNode::Element(wrapper) = node else {
        panic!("expected a wrapper element");
    };
    let decoded = decode_props(
        wrapper
            .attrs
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.as_deref()?))),
    );
    assert_eq!(decoded, props);
}

#[test]
fn test_page_script_data_and_styles() {
    let (dir, mut config) = project(&[
        ("pages/blog/post.css", "h1 { color: green }"),
        (
            "pages/blog/post.zen",
            r#"<script>
import "./post.css";
const greeting = "Hello " + site;
document.title = greeting;
</script>
<style>p { margin: 0 }</style>
<html><head></head><body>
<h1>{greeting}</h1>
<p class={tone}>{count + 1} posts</p>
</body></html>
"#,
        ),
    ]);
    config.mode = BuildMode::Dev;

    let data = match json!({ "site": "islands", "count": 2, "tone": null }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let report = SiteBuilder::new(config).with_page_data(data).build().unwrap();
    let page = &report.pages[0];
    assert_eq!(page.out_path, dir.path().join("dist/blog/post.html"));

    let html = &page.html;
    assert!(html.contains("<h1>Hello islands</h1>"));
    assert!(html.contains("<p>3 posts</p>"));
    assert!(html.contains(r#"<link rel="stylesheet" href="/assets/post-"#));
    assert!(html.contains("new EventSource(\"/__islands/reload\")"));
    assert!(html.contains("document.title = greeting;"));
    assert!(!html.contains("post.css\""));
    assert!(!html.contains("runtime-"));

    let css_href = page
        .assets
        .iter()
        .find_map(|a| a.attr("href"))
        .unwrap();
    let css = read(&dir.path().join("dist"), css_href.trim_start_matches('/'));
    assert!(css.contains("green"));
    assert!(css.contains("margin"));
}

#[test]
fn test_head_markup_in_page_script_keeps_assets_in_head() {
    let (_dir, config) = project(&[
        ("islands/Counter.zen", COUNTER),
        (
            "pages/index.zen",
            r#"<script>
import Counter from "../islands/Counter.zen";
const tpl = "<head></head>";
</script>
<html><head><title>Home</title></head><body>
<Counter initial={1} lenin:awake />
</body></html>
"#,
        ),
    ]);

    let report = SiteBuilder::new(config).build().unwrap();
    let html = &report.pages[0].html;

    let body_start = html.find("<body>").unwrap();
    let runtime = html.find(r#"<script type="module" src="/islands/runtime-"#).unwrap();
    let css = html.find(r#"<link rel="stylesheet" href="/islands/Counter-"#).unwrap();
    assert!(runtime < body_start && css < body_start);
    assert_eq!(html.matches("src=\"/islands/runtime-").count(), 1);

    let page_script = html.find(r#"const tpl = "<head></head>";"#).unwrap();
    assert!(body_start < page_script && page_script < html.rfind("</body>").unwrap());
}

#[test]
fn test_reload_is_visible_to_later_builds() {
    let (dir, config) = project(&[("islands/Badge.zen", BADGE)]);
    let registry = Arc::new(IslandRegistry::new(config.clone()));
    let site = SiteBuilder::with_registry(config, Arc::clone(&registry));
    assert_eq!(site.load().unwrap(), 1);

    write(dir.path(), "islands/Counter.zen", COUNTER);
    write(
        dir.path(),
        "pages/index.zen",
        r#"<script>import Counter from "../islands/Counter.zen";</script><Counter initial={0} />"#,
    );
    let report = site.build().unwrap();
    assert_eq!(report.islands, 2);
    assert!(registry.is_island(&IslandId::from("islands/Counter.zen")));
}
