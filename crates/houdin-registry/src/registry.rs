use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::RegistryError;
use crate::schema::{self, ConfigSchema};

/// Display metadata shared by triggers and actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
  #[serde(rename = "type")]
  pub type_id: String,
  pub label: String,
  pub icon: String,
  pub description: String,
  /// Output handles this node may emit on. Empty means the default handle only.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub outputs: Vec<String>,
  /// Exempt from the engine's per-node timeout (interactive or open-ended waits).
  #[serde(default)]
  pub disable_timeout: bool,
  /// Config property (milliseconds) that bounds the node's own work. When set
  /// and positive, the engine derives the node deadline from it instead of
  /// the default.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_property: Option<String>,
}

impl NodeMetadata {
  pub fn new(
    type_id: impl Into<String>,
    label: impl Into<String>,
    icon: impl Into<String>,
    description: impl Into<String>,
  ) -> Self {
    Self {
      type_id: type_id.into(),
      label: label.into(),
      icon: icon.into(),
      description: description.into(),
      outputs: Vec::new(),
      disable_timeout: false,
      timeout_property: None,
    }
  }

  pub fn with_outputs<'a>(mut self, outputs: impl IntoIterator<Item = &'a str>) -> Self {
    self.outputs = outputs.into_iter().map(String::from).collect();
    self
  }

  pub fn without_timeout(mut self) -> Self {
    self.disable_timeout = true;
    self
  }

  pub fn with_timeout_property(mut self, property: impl Into<String>) -> Self {
    self.timeout_property = Some(property.into());
    self
  }
}

type Factory<I> = Arc<dyn Fn() -> Box<I> + Send + Sync>;

/// Everything the registry knows about one type.
///
/// `I` is the runtime interface the factory produces (`dyn Action`,
/// `dyn Trigger`).
pub struct Descriptor<I: ?Sized> {
  pub metadata: NodeMetadata,
  pub config_schema: ConfigSchema,
  pub output_example: Value,
  factory: Factory<I>,
}

impl<I: ?Sized> Descriptor<I> {
  pub fn new(
    metadata: NodeMetadata,
    config_schema: ConfigSchema,
    output_example: Value,
    factory: impl Fn() -> Box<I> + Send + Sync + 'static,
  ) -> Self {
    Self {
      metadata,
      config_schema,
      output_example,
      factory: Arc::new(factory),
    }
  }

  /// Build a fresh runtime instance.
  pub fn instantiate(&self) -> Box<I> {
    (self.factory)()
  }

  pub fn to_static(&self) -> StaticDescriptor {
    StaticDescriptor {
      metadata: self.metadata.clone(),
      config_schema: self.config_schema.clone(),
      output_example: self.output_example.clone(),
    }
  }
}

impl<I: ?Sized> Clone for Descriptor<I> {
  fn clone(&self) -> Self {
    Self {
      metadata: self.metadata.clone(),
      config_schema: self.config_schema.clone(),
      output_example: self.output_example.clone(),
      factory: Arc::clone(&self.factory),
    }
  }
}

impl<I: ?Sized> fmt::Debug for Descriptor<I> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Descriptor")
      .field("metadata", &self.metadata)
      .field("config_schema", &self.config_schema)
      .finish_non_exhaustive()
  }
}

/// Serializable part of a descriptor, used for palettes and catalogue export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticDescriptor {
  pub metadata: NodeMetadata,
  pub config_schema: ConfigSchema,
  pub output_example: Value,
}

/// Result of [`Registry::validate_config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
  pub valid: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub errors: Option<BTreeMap<String, String>>,
}

/// Keyed lookup from type id to descriptor.
///
/// Populated at startup and then only read, so lookups take `&self`.
pub struct Registry<I: ?Sized> {
  descriptors: HashMap<String, Descriptor<I>>,
}

impl<I: ?Sized> Default for Registry<I> {
  fn default() -> Self {
    Self {
      descriptors: HashMap::new(),
    }
  }
}

impl<I: ?Sized> Registry<I> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a descriptor under its metadata type id. Last registration wins.
  pub fn register(&mut self, descriptor: Descriptor<I>) {
    let type_id = descriptor.metadata.type_id.clone();
    if self.descriptors.insert(type_id.clone(), descriptor).is_some() {
      debug!(type_id = %type_id, "descriptor_replaced");
    }
  }

  pub fn has(&self, type_id: &str) -> bool {
    self.descriptors.contains_key(type_id)
  }

  pub fn get(&self, type_id: &str) -> Result<&Descriptor<I>, RegistryError> {
    self
      .descriptors
      .get(type_id)
      .ok_or_else(|| RegistryError::NotFound {
        type_id: type_id.to_string(),
      })
  }

  pub fn instantiate(&self, type_id: &str) -> Result<Box<I>, RegistryError> {
    self.get(type_id).map(Descriptor::instantiate)
  }

  /// Registered type ids, sorted.
  pub fn types(&self) -> Vec<&str> {
    let mut types: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
    types.sort_unstable();
    types
  }

  pub fn len(&self) -> usize {
    self.descriptors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.descriptors.is_empty()
  }

  /// Metadata, schema, and sample output for every registered type, sorted by type id.
  pub fn get_all_static(&self) -> Vec<StaticDescriptor> {
    self
      .types()
      .into_iter()
      .filter_map(|t| self.descriptors.get(t))
      .map(Descriptor::to_static)
      .collect()
  }

  pub fn validate_config(
    &self,
    type_id: &str,
    config: &Map<String, Value>,
  ) -> Result<ValidationReport, RegistryError> {
    let descriptor = self.get(type_id)?;
    let report = match schema::validate(&descriptor.config_schema, config) {
      Ok(()) => ValidationReport {
        valid: true,
        errors: None,
      },
      Err(errors) => ValidationReport {
        valid: false,
        errors: Some(errors.into_map()),
      },
    };
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::PropertyDescriptor;
  use serde_json::json;

  trait Greeter: Send + Sync {
    fn greet(&self) -> String;
  }

  struct Hello(&'static str);

  impl Greeter for Hello {
    fn greet(&self) -> String {
      format!("hello {}", self.0)
    }
  }

  fn descriptor(type_id: &str, who: &'static str) -> Descriptor<dyn Greeter> {
    Descriptor::new(
      NodeMetadata::new(type_id, "Greeter", "hand", "Says hello"),
      ConfigSchema::new().property("name", PropertyDescriptor::text("Name").required()),
      json!({ "greeting": "hello" }),
      move || Box::new(Hello(who)) as Box<dyn Greeter>,
    )
  }

  #[test]
  fn test_register_then_get_round_trips() {
    let mut registry: Registry<dyn Greeter> = Registry::new();
    registry.register(descriptor("greet", "world"));

    assert!(registry.has("greet"));
    let found = registry.get("greet").unwrap();
    assert_eq!(found.metadata.type_id, "greet");
    assert_eq!(found.output_example, json!({ "greeting": "hello" }));
    assert_eq!(registry.instantiate("greet").unwrap().greet(), "hello world");
  }

  #[test]
  fn test_get_unregistered_is_not_found() {
    let registry: Registry<dyn Greeter> = Registry::new();
    assert!(!registry.has("missing"));
    assert_eq!(
      registry.get("missing").unwrap_err(),
      RegistryError::NotFound {
        type_id: "missing".to_string()
      }
    );
  }

  #[test]
  fn test_last_registration_wins() {
    let mut registry: Registry<dyn Greeter> = Registry::new();
    registry.register(descriptor("greet", "first"));
    registry.register(descriptor("greet", "second"));

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.instantiate("greet").unwrap().greet(), "hello second");
  }

  #[test]
  fn test_get_all_static_matches_registered_set() {
    let mut registry: Registry<dyn Greeter> = Registry::new();
    for id in ["zeta", "alpha", "mid"] {
      registry.register(descriptor(id, "x"));
    }

    let types: Vec<String> = registry
      .get_all_static()
      .into_iter()
      .map(|d| d.metadata.type_id)
      .collect();
    assert_eq!(types, vec!["alpha", "mid", "zeta"]);
  }

  #[test]
  fn test_validate_config_report() {
    let mut registry: Registry<dyn Greeter> = Registry::new();
    registry.register(descriptor("greet", "x"));

    let ok = registry
      .validate_config("greet", json!({ "name": "Ada" }).as_object().unwrap())
      .unwrap();
    assert!(ok.valid);
    assert!(ok.errors.is_none());

    let bad = registry.validate_config("greet", &Map::new()).unwrap();
    assert!(!bad.valid);
    assert_eq!(bad.errors.unwrap()["name"], "is required");
  }

  #[test]
  fn test_static_descriptor_wire_format() {
    let entry = descriptor("greet", "x").to_static();
    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(value["metadata"]["type"], "greet");
    assert_eq!(value["metadata"]["disableTimeout"], false);
    assert_eq!(value["configSchema"]["name"]["label"], "Name");
    assert_eq!(value["outputExample"]["greeting"], "hello");
  }
}
