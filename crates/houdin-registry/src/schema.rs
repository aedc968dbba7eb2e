//! Declarative config schemas and their validator.
//!
//! A schema maps config keys to [`PropertyDescriptor`]s. Validation never
//! mutates the config; [`normalize`] returns a new map with defaults filled in
//! and numeric/boolean strings coerced, in the same spirit as input coercion
//! after template resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
  Text,
  Textarea,
  Number,
  Boolean,
  Select,
  Color,
  Code,
  Credentials,
  Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
  pub label: String,
  pub value: String,
}

/// Only show (and validate) a property when `field` currently equals `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowWhen {
  pub field: String,
  /// A single value or an array of accepted values.
  pub value: Value,
}

impl ShowWhen {
  fn matches(&self, current: Option<&Value>) -> bool {
    let Some(current) = current else {
      return false;
    };
    match &self.value {
      Value::Array(accepted) => accepted.iter().any(|v| loosely_equal(v, current)),
      expected => loosely_equal(expected, current),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
  #[serde(rename = "type")]
  pub property_type: PropertyType,
  pub label: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub required: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_value: Option<Value>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub options: Vec<SelectOption>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub show_when: Option<ShowWhen>,
}

impl PropertyDescriptor {
  pub fn new(property_type: PropertyType, label: impl Into<String>) -> Self {
    Self {
      property_type,
      label: label.into(),
      description: None,
      required: false,
      default_value: None,
      options: Vec::new(),
      show_when: None,
    }
  }

  pub fn text(label: impl Into<String>) -> Self {
    Self::new(PropertyType::Text, label)
  }

  pub fn textarea(label: impl Into<String>) -> Self {
    Self::new(PropertyType::Textarea, label)
  }

  pub fn number(label: impl Into<String>) -> Self {
    Self::new(PropertyType::Number, label)
  }

  pub fn boolean(label: impl Into<String>) -> Self {
    Self::new(PropertyType::Boolean, label)
  }

  pub fn code(label: impl Into<String>) -> Self {
    Self::new(PropertyType::Code, label)
  }

  pub fn color(label: impl Into<String>) -> Self {
    Self::new(PropertyType::Color, label)
  }

  pub fn credentials(label: impl Into<String>) -> Self {
    Self::new(PropertyType::Credentials, label)
  }

  pub fn custom(label: impl Into<String>) -> Self {
    Self::new(PropertyType::Custom, label)
  }

  /// A select whose option labels equal their values.
  pub fn select<'a>(label: impl Into<String>, values: impl IntoIterator<Item = &'a str>) -> Self {
    let mut desc = Self::new(PropertyType::Select, label);
    desc.options = values
      .into_iter()
      .map(|v| SelectOption {
        label: v.to_string(),
        value: v.to_string(),
      })
      .collect();
    desc
  }

  pub fn required(mut self) -> Self {
    self.required = true;
    self
  }

  pub fn describe(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn default_value(mut self, value: impl Into<Value>) -> Self {
    self.default_value = Some(value.into());
    self
  }

  pub fn show_when(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.show_when = Some(ShowWhen {
      field: field.into(),
      value: value.into(),
    });
    self
  }
}

/// Property schema of a node or credential type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSchema {
  properties: BTreeMap<String, PropertyDescriptor>,
}

impl ConfigSchema {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style insert.
  pub fn property(mut self, key: impl Into<String>, descriptor: PropertyDescriptor) -> Self {
    self.properties.insert(key.into(), descriptor);
    self
  }

  pub fn get(&self, key: &str) -> Option<&PropertyDescriptor> {
    self.properties.get(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyDescriptor)> {
    self.properties.iter()
  }

  pub fn is_empty(&self) -> bool {
    self.properties.is_empty()
  }

  /// Current value of `key`, falling back to its declared default.
  fn effective<'a>(&'a self, config: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    config
      .get(key)
      .or_else(|| self.properties.get(key).and_then(|d| d.default_value.as_ref()))
  }

  fn is_applicable(&self, descriptor: &PropertyDescriptor, config: &Map<String, Value>) -> bool {
    match &descriptor.show_when {
      Some(cond) => cond.matches(self.effective(config, &cond.field)),
      None => true,
    }
  }
}

/// Validate `config` against `schema`.
///
/// Properties hidden by `showWhen` are skipped even when required. Keys not
/// declared in the schema are ignored.
pub fn validate(schema: &ConfigSchema, config: &Map<String, Value>) -> Result<(), ValidationErrors> {
  let mut errors = ValidationErrors::new();

  for (key, descriptor) in schema.iter() {
    if !schema.is_applicable(descriptor, config) {
      continue;
    }

    let value = config.get(key).or(descriptor.default_value.as_ref());
    match value {
      None => {
        if descriptor.required {
          errors.add(key, "is required");
        }
      }
      Some(value) if is_empty(value) => {
        if descriptor.required {
          errors.add(key, "is required");
        }
      }
      Some(value) => {
        if let Err(message) = check_type(descriptor, value) {
          errors.add(key, message);
        }
      }
    }
  }

  if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Return a copy of `config` with defaults applied and scalar strings coerced.
///
/// `"5"` becomes `5` for `number` properties and `"true"` becomes `true` for
/// `boolean` ones. Numbers and booleans given to text-like and `select`
/// properties become strings. Values that cannot be coerced are left untouched
/// for [`validate`] to report.
pub fn normalize(schema: &ConfigSchema, config: &Map<String, Value>) -> Map<String, Value> {
  let mut normalized = config.clone();

  for (key, descriptor) in schema.iter() {
    if !normalized.contains_key(key)
      && let Some(default) = &descriptor.default_value
    {
      normalized.insert(key.clone(), default.clone());
    }

    let Some(value) = normalized.get_mut(key) else {
      continue;
    };

    match descriptor.property_type {
      PropertyType::Number => {
        if let Some(n) = value.as_str().and_then(parse_number) {
          *value = n;
        }
      }
      PropertyType::Boolean => {
        if let Some(b) = value.as_str().and_then(parse_bool) {
          *value = Value::Bool(b);
        }
      }
      PropertyType::Text | PropertyType::Textarea | PropertyType::Code | PropertyType::Select => {
        if matches!(value, Value::Number(_) | Value::Bool(_)) {
          *value = Value::String(value.to_string());
        }
      }
      _ => {}
    }
  }

  normalized
}

fn is_empty(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::String(s) => s.trim().is_empty(),
    Value::Array(items) => items.is_empty(),
    _ => false,
  }
}

fn check_type(descriptor: &PropertyDescriptor, value: &Value) -> Result<(), String> {
  match descriptor.property_type {
    PropertyType::Text | PropertyType::Textarea | PropertyType::Code => match value {
      Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
      _ => Err("expected text".to_string()),
    },
    PropertyType::Number => match value {
      Value::Number(_) => Ok(()),
      Value::String(s) if parse_number(s).is_some() => Ok(()),
      other => Err(format!("expected a number, got {}", other)),
    },
    PropertyType::Boolean => match value {
      Value::Bool(_) => Ok(()),
      Value::String(s) if parse_bool(s).is_some() => Ok(()),
      other => Err(format!("expected a boolean, got {}", other)),
    },
    PropertyType::Select => {
      let current = scalar_string(value).ok_or_else(|| "expected an option".to_string())?;
      if descriptor.options.is_empty() || descriptor.options.iter().any(|o| o.value == current) {
        Ok(())
      } else {
        Err(format!("'{}' is not one of the allowed options", current))
      }
    }
    PropertyType::Color => match value.as_str() {
      Some(s) if is_hex_color(s) => Ok(()),
      _ => Err("expected a hex color like #1e90ff".to_string()),
    },
    PropertyType::Credentials => match value {
      Value::String(_) => Ok(()),
      _ => Err("expected a credential id".to_string()),
    },
    PropertyType::Custom => Ok(()),
  }
}

fn parse_number(s: &str) -> Option<Value> {
  let trimmed = s.trim();
  if let Ok(i) = trimmed.parse::<i64>() {
    return Some(Value::Number(i.into()));
  }
  trimmed
    .parse::<f64>()
    .ok()
    .and_then(serde_json::Number::from_f64)
    .map(Value::Number)
}

fn parse_bool(s: &str) -> Option<bool> {
  match s.trim().to_lowercase().as_str() {
    "true" => Some(true),
    "false" => Some(false),
    _ => None,
  }
}

fn is_hex_color(s: &str) -> bool {
  let Some(hex) = s.strip_prefix('#') else {
    return false;
  };
  matches!(hex.len(), 3 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

fn scalar_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

/// `true == "true"`, `5 == "5"`; everything else compares structurally.
fn loosely_equal(a: &Value, b: &Value) -> bool {
  if a == b {
    return true;
  }
  match (scalar_string(a), scalar_string(b)) {
    (Some(x), Some(y)) => x == y,
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn config(value: Value) -> Map<String, Value> {
    match value {
      Value::Object(map) => map,
      _ => unreachable!("test configs are objects"),
    }
  }

  fn http_schema() -> ConfigSchema {
    ConfigSchema::new()
      .property("url", PropertyDescriptor::text("URL").required())
      .property(
        "method",
        PropertyDescriptor::select("Method", ["GET", "POST"]).default_value("GET"),
      )
      .property(
        "body",
        PropertyDescriptor::code("Body")
          .required()
          .show_when("method", json!(["POST", "PUT"])),
      )
      .property("timeout", PropertyDescriptor::number("Timeout").default_value(30000))
  }

  #[test]
  fn test_required_missing() {
    let errors = validate(&http_schema(), &config(json!({}))).unwrap_err();
    assert_eq!(errors.get("url"), Some("is required"));
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn test_empty_string_counts_as_missing() {
    let errors = validate(&http_schema(), &config(json!({ "url": "  " }))).unwrap_err();
    assert_eq!(errors.get("url"), Some("is required"));
  }

  #[test]
  fn test_show_when_hides_required_property() {
    let cfg = config(json!({ "url": "https://example.com", "method": "GET" }));
    assert!(validate(&http_schema(), &cfg).is_ok());
  }

  #[test]
  fn test_show_when_array_match_applies_required() {
    let cfg = config(json!({ "url": "https://example.com", "method": "POST" }));
    let errors = validate(&http_schema(), &cfg).unwrap_err();
    assert_eq!(errors.get("body"), Some("is required"));
  }

  #[test]
  fn test_number_type_mismatch() {
    let cfg = config(json!({ "url": "https://example.com", "timeout": "soon" }));
    let errors = validate(&http_schema(), &cfg).unwrap_err();
    assert!(errors.get("timeout").unwrap().contains("expected a number"));
  }

  #[test]
  fn test_numeric_string_accepted() {
    let cfg = config(json!({ "url": "https://example.com", "timeout": " 500 " }));
    assert!(validate(&http_schema(), &cfg).is_ok());
  }

  #[test]
  fn test_select_rejects_unknown_option() {
    let cfg = config(json!({ "url": "https://example.com", "method": "BREW" }));
    let errors = validate(&http_schema(), &cfg).unwrap_err();
    assert!(errors.get("method").is_some());
  }

  #[test]
  fn test_color() {
    let schema = ConfigSchema::new().property("bg", PropertyDescriptor::color("Background"));
    assert!(validate(&schema, &config(json!({ "bg": "#1e90ff" }))).is_ok());
    assert!(validate(&schema, &config(json!({ "bg": "#abc" }))).is_ok());
    assert!(validate(&schema, &config(json!({ "bg": "blue" }))).is_err());
  }

  #[test]
  fn test_validate_does_not_mutate() {
    let cfg = config(json!({ "url": "https://example.com" }));
    let before = cfg.clone();
    let _ = validate(&http_schema(), &cfg);
    assert_eq!(cfg, before);
  }

  #[test]
  fn test_normalize_applies_defaults_and_coerces() {
    let schema = http_schema().property("follow", PropertyDescriptor::boolean("Follow redirects"));
    let cfg = config(json!({ "url": "https://example.com", "timeout": "250", "follow": "TRUE" }));
    let normalized = normalize(&schema, &cfg);

    assert_eq!(normalized["method"], "GET");
    assert_eq!(normalized["timeout"], 250);
    assert_eq!(normalized["follow"], true);
    assert_eq!(cfg["timeout"], "250");
  }

  #[test]
  fn test_normalize_stringifies_text_scalars() {
    let schema = http_schema().property("note", PropertyDescriptor::textarea("Note"));
    let cfg = config(json!({ "url": 42, "note": false, "method": "POST", "body": 7 }));
    let normalized = normalize(&schema, &cfg);

    assert_eq!(normalized["url"], "42");
    assert_eq!(normalized["note"], "false");
    assert_eq!(normalized["body"], "7");
    assert_eq!(normalized["timeout"], 30000);
    assert!(validate(&schema, &normalized).is_ok());
  }

  #[test]
  fn test_schema_wire_format() {
    let value = serde_json::to_value(http_schema()).unwrap();
    assert_eq!(value["url"]["type"], "text");
    assert_eq!(value["url"]["required"], true);
    assert_eq!(value["body"]["showWhen"]["field"], "method");
    assert_eq!(value["method"]["defaultValue"], "GET");
  }
}
