use std::collections::HashMap;

use houdin_template::{TemplateContext, TemplateEngine};
use serde_json::json;

fn engine() -> TemplateEngine {
  TemplateEngine::new()
}

#[test]
fn test_literal_text_is_unchanged() {
  let ctx = TemplateContext::new()
    .with_node("a", json!({ "b": "x" }))
    .with_meta("url", "https://example.com");

  for text in [
    "",
    "hello world",
    "price: $5 {not a placeholder}",
    "{{ unterminated",
    "}} backwards {{",
    "{% if x %}jinja blocks are not evaluated{% endif %}",
    "unicode ✓ ümlaut",
  ] {
    assert_eq!(engine().render(text, &ctx), text);
  }
}

#[test]
fn test_dotted_path_into_node_output() {
  let ctx = TemplateContext::new().with_node("a", json!({ "b": "x" }));
  assert_eq!(engine().render("{{a.b}}", &ctx), "x");
  assert_eq!(engine().render("value={{ a.b }}!", &ctx), "value=x!");
}

#[test]
fn test_missing_reference_renders_empty() {
  let ctx = TemplateContext::new();
  assert_eq!(engine().render("{{missing}}", &ctx), "");
  assert_eq!(engine().render("[{{missing.deeply.nested}}]", &ctx), "[]");
}

#[test]
fn test_append_filter() {
  let ctx = TemplateContext::new();
  assert_eq!(engine().render(r#"{{"a" | append: "b"}}"#, &ctx), "ab");
}

#[test]
fn test_chained_filters() {
  let ctx = TemplateContext::new().with_node(
    "cart",
    json!({ "items": [{ "price": 10 }, { "price": 20 }, { "price": 5 }] }),
  );
  assert_eq!(
    engine().render(r#"{{ cart.items | map: "price" | sum }}"#, &ctx),
    "35"
  );
  assert_eq!(
    engine().render(r#"{{ cart.items | map: "price" | join: ", " | prepend: "prices: " }}"#, &ctx),
    "prices: 10, 20, 5"
  );
}

#[test]
fn test_malformed_expression_does_not_fail() {
  let ctx = TemplateContext::new().with_node("a", json!("x"));
  let rendered = engine().render("before {{ a | }} after {{a}}", &ctx);
  assert_eq!(rendered, "before {{ a | }} after x");
}

#[test]
fn test_whole_output_and_structured_values_render_as_json() {
  let ctx = TemplateContext::new().with_node("fetch", json!({ "ip": "1.2.3.4", "tags": ["a", "b"] }));
  assert_eq!(
    engine().render("{{ fetch }}", &ctx),
    r#"{"ip":"1.2.3.4","tags":["a","b"]}"#
  );
  assert_eq!(engine().render("{{ fetch.tags }}", &ctx), r#"["a","b"]"#);
}

#[test]
fn test_booleans_render_lowercase() {
  let ctx = TemplateContext::new().with_node("check", json!({ "result": true, "empty": false }));
  assert_eq!(engine().render("{{check.result}}", &ctx), "true");
  assert_eq!(engine().render("{{ check.empty }}", &ctx), "false");
  assert_eq!(engine().render("ok={{check.result}}", &ctx), "ok=true");
  assert_eq!(engine().render("{{ check }}", &ctx), r#"{"empty":false,"result":true}"#);
}

#[test]
fn test_hyphenated_ids_and_index_segments() {
  let ctx = TemplateContext::new().with_node(
    "http-request-1",
    json!({ "data": { "results": [{ "name": "first" }] } }),
  );
  assert_eq!(
    engine().render("{{ http-request-1.data.results.0.name }}", &ctx),
    "first"
  );
  assert_eq!(
    engine().render(r#"{{ nodes["http-request-1"].data.results[0].name }}"#, &ctx),
    "first"
  );
}

#[test]
fn test_prev_env_and_meta_namespaces() {
  let mut vars = HashMap::new();
  vars.insert("greeting".to_string(), "hi".to_string());

  let ctx = TemplateContext::new()
    .with_prev(json!({ "data": { "ip": "1.2.3.4" } }))
    .with_env(&vars)
    .with_meta("url", "https://example.com/page")
    .with_meta("tabId", 7);

  assert_eq!(
    engine().render("{{ env.greeting }} from {{ prev.data.ip }} on {{ meta.url }} ({{ meta.tabId }})", &ctx),
    "hi from 1.2.3.4 on https://example.com/page (7)"
  );
}

#[test]
fn test_interpolate_value_walks_string_leaves() {
  let ctx = TemplateContext::new().with_node("user", json!({ "id": 42, "name": "Ada" }));
  let config = json!({
    "url": "https://api.example.com/users/{{ user.id }}",
    "headers": { "X-Name": "{{ user.name | upcase }}" },
    "retries": 3,
    "tags": ["{{ user.name }}", "static"],
  });

  let resolved = engine().interpolate_value(&config, &ctx);
  assert_eq!(
    resolved,
    json!({
      "url": "https://api.example.com/users/42",
      "headers": { "X-Name": "ADA" },
      "retries": 3,
      "tags": ["Ada", "static"],
    })
  );
}

#[test]
fn test_minijinja_syntax_passes_through() {
  let ctx = TemplateContext::new().with_node("n", json!({ "count": 2 }));
  assert_eq!(engine().render("{{ n.count + 1 }}", &ctx), "3");
  assert_eq!(engine().render("{{ 'yes' if n.count > 1 else 'no' }}", &ctx), "yes");
}

#[test]
fn test_rendering_is_repeatable() {
  let ctx = TemplateContext::new().with_node("a", json!({ "b": "x" }));
  let engine = engine();
  let first = engine.render("{{ a.b | append: '!' }}", &ctx);
  let second = engine.render("{{ a.b | append: '!' }}", &ctx);
  assert_eq!(first, "x!");
  assert_eq!(first, second);
}
