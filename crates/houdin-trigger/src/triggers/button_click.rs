use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use houdin_runtime::{ComponentKind, InjectedComponent, PageEvent};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::TriggerError;
use crate::trigger::{Trigger, TriggerContext, TriggerDescriptor, parse_config, spawn_listener};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ButtonClickConfig {
  #[serde(default = "default_text")]
  button_text: String,
  #[serde(default = "default_kind")]
  component_type: ComponentKind,
  #[serde(default)]
  target_selector: Option<String>,
  #[serde(default)]
  color: Option<String>,
}

fn default_text() -> String {
  "Run".to_string()
}

fn default_kind() -> ComponentKind {
  ComponentKind::Fab
}

/// Injects a button into the page and fires when it is clicked.
pub struct ButtonClickTrigger;

impl Trigger for ButtonClickTrigger {
  fn setup(&self, config: Map<String, Value>, ctx: &TriggerContext) -> Result<(), TriggerError> {
    let config: ButtonClickConfig = parse_config(config)?;
    let component_id = ctx.component_id();

    ctx.page.inject_component(InjectedComponent {
      id: component_id.clone(),
      kind: config.component_type,
      label: config.button_text,
      target_selector: config.target_selector.filter(|s| !s.is_empty()),
      color: config.color,
    })?;

    spawn_listener(ctx, move |event| match event {
      PageEvent::ComponentTrigger { component_id: id, data } if *id == component_id => {
        Some(if data.is_null() { json!({}) } else { data.clone() })
      }
      _ => None,
    });
    Ok(())
  }

  fn cleanup(&self, ctx: &TriggerContext) {
    ctx.page.remove_component(&ctx.component_id());
  }
}

pub fn descriptor() -> TriggerDescriptor {
  TriggerDescriptor::new(
    NodeMetadata::new("button-click", "Button Click", "click", "Run when an injected button is clicked"),
    ConfigSchema::new()
      .property("buttonText", PropertyDescriptor::text("Button text").default_value("Run"))
      .property(
        "componentType",
        PropertyDescriptor::select("Component", ["fab", "button"]).default_value("fab"),
      )
      .property(
        "targetSelector",
        PropertyDescriptor::text("Insert next to")
          .required()
          .show_when("componentType", "button"),
      )
      .property("color", PropertyDescriptor::color("Color")),
    json!({}),
    || Box::new(ButtonClickTrigger),
  )
}
