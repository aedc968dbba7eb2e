use minijinja::value::ValueKind;
use minijinja::{Environment, UndefinedBehavior, Value};
use tracing::debug;

use crate::context::TemplateContext;
use crate::filters;
use crate::rewrite::rewrite_expression;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// True if `text` contains at least one complete `{{ ... }}` placeholder.
pub fn has_placeholders(text: &str) -> bool {
  text
    .find(OPEN)
    .is_some_and(|start| text[start + OPEN.len()..].contains(CLOSE))
}

/// Render a value the way it appears inside interpolated text.
///
/// Strings are inserted as-is, booleans as `true`/`false`, objects and
/// arrays as compact JSON, and null/undefined as nothing.
pub(crate) fn render_value(value: &Value) -> String {
  match value.kind() {
    ValueKind::Undefined | ValueKind::None => String::new(),
    ValueKind::String => value.as_str().unwrap_or_default().to_string(),
    ValueKind::Bool => value.is_true().to_string(),
    ValueKind::Seq | ValueKind::Map | ValueKind::Iterable => {
      serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
    }
    _ => value.to_string(),
  }
}

/// Placeholder interpolation engine.
///
/// Holds a configured minijinja environment; build it once and share it.
/// Rendering is synchronous and side-effect free.
pub struct TemplateEngine {
  env: Environment<'static>,
}

impl Default for TemplateEngine {
  fn default() -> Self {
    Self::new()
  }
}

impl TemplateEngine {
  pub fn new() -> Self {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Chainable);
    filters::register(&mut env);
    Self { env }
  }

  /// Interpolate every placeholder in `template`.
  pub fn render(&self, template: &str, ctx: &TemplateContext) -> String {
    if !has_placeholders(template) {
      return template.to_string();
    }
    let root = Value::from_serialize(ctx.to_root());
    self.render_with_root(template, &root)
  }

  /// Interpolate every string leaf of a JSON value. Keys are left alone.
  pub fn interpolate_value(
    &self,
    value: &serde_json::Value,
    ctx: &TemplateContext,
  ) -> serde_json::Value {
    let root = Value::from_serialize(ctx.to_root());
    self.interpolate_with_root(value, &root)
  }

  /// Evaluate a single expression (without braces) to a typed JSON value.
  ///
  /// Returns `None` when the expression does not compile, fails, or resolves
  /// to undefined.
  pub fn evaluate(&self, expression: &str, ctx: &TemplateContext) -> Option<serde_json::Value> {
    let root = Value::from_serialize(ctx.to_root());
    let source = rewrite_expression(expression.trim());
    let compiled = self.env.compile_expression(&source).ok()?;
    let value = compiled.eval(&root).ok()?;
    if value.is_undefined() {
      return None;
    }
    serde_json::to_value(&value).ok()
  }

  /// If `template` is exactly one placeholder, the expression inside it.
  pub fn sole_expression(template: &str) -> Option<&str> {
    let inner = template.trim().strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
    if inner.contains(OPEN) || inner.contains(CLOSE) {
      return None;
    }
    Some(inner.trim())
  }

  fn interpolate_with_root(&self, value: &serde_json::Value, root: &Value) -> serde_json::Value {
    match value {
      serde_json::Value::String(s) if has_placeholders(s) => {
        serde_json::Value::String(self.render_with_root(s, root))
      }
      serde_json::Value::Array(items) => serde_json::Value::Array(
        items
          .iter()
          .map(|item| self.interpolate_with_root(item, root))
          .collect(),
      ),
      serde_json::Value::Object(map) => serde_json::Value::Object(
        map
          .iter()
          .map(|(k, v)| (k.clone(), self.interpolate_with_root(v, root)))
          .collect(),
      ),
      other => other.clone(),
    }
  }

  fn render_with_root(&self, template: &str, root: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
      let after = &rest[start + OPEN.len()..];
      let Some(end) = after.find(CLOSE) else {
        break;
      };

      out.push_str(&rest[..start]);
      let placeholder = &rest[start..start + OPEN.len() + end + CLOSE.len()];
      out.push_str(&self.render_placeholder(&after[..end], placeholder, root));
      rest = &after[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
  }

  fn render_placeholder(&self, expression: &str, placeholder: &str, root: &Value) -> String {
    let expression = expression.trim();
    if expression.is_empty() {
      return String::new();
    }

    let source = rewrite_expression(expression);
    let compiled = match self.env.compile_expression(&source) {
      Ok(compiled) => compiled,
      Err(err) => {
        debug!(expression = %expression, error = %err, "template_syntax_error");
        return placeholder.to_string();
      }
    };

    match compiled.eval(root) {
      Ok(value) => render_value(&value),
      Err(err) => {
        debug!(expression = %expression, error = %err, "template_eval_failed");
        String::new()
      }
    }
  }
}
