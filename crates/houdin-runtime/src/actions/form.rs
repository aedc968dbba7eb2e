use async_trait::async_trait;
use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::action::{ActionContext, ActionDescriptor, ActionOutput, TypedAction};
use crate::error::ActionError;
use crate::page::{FormField, FormPrompt};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFormConfig {
  #[serde(default)]
  pub title: String,
  /// Array of fields, or a string containing one.
  pub fields: Value,
  #[serde(default = "default_submit_label")]
  pub submit_label: String,
}

fn default_submit_label() -> String {
  "Submit".to_string()
}

fn parse_fields(fields: &Value) -> Result<Vec<FormField>, ActionError> {
  let fields = match fields {
    Value::String(s) => serde_json::from_str::<Value>(s)
      .map_err(|e| ActionError::invalid_config("fields", format!("invalid JSON: {}", e)))?,
    other => other.clone(),
  };
  serde_json::from_value(fields).map_err(|e| ActionError::invalid_config("fields", e.to_string()))
}

/// Asks the user to fill in a form.
///
/// Emits the values on `output`. A form closed without submitting, or left
/// unanswered past the modal timeout, emits on `cancelled`.
pub struct InputFormAction;

#[async_trait]
impl TypedAction for InputFormAction {
  type Config = InputFormConfig;

  async fn run(&self, config: InputFormConfig, ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    let prompt = FormPrompt {
      title: config.title,
      fields: parse_fields(&config.fields)?,
      submit_label: config.submit_label,
    };

    let answer = tokio::select! {
      _ = ctx.cancel.cancelled() => return Err(ActionError::Cancelled),
      answer = tokio::time::timeout(ctx.modal_timeout, ctx.page.prompt_form(prompt)) => answer,
    };

    let submitted = match answer {
      Ok(result) => result?,
      Err(_) => {
        let err = ActionError::ModalTimeout(ctx.modal_timeout);
        debug!(node_id = %ctx.node_id, error = %err, "form_dismissed");
        None
      }
    };

    Ok(match submitted {
      Some(values) => ActionOutput::new(json!({ "submitted": true, "values": values })),
      None => ActionOutput::on("cancelled", json!({ "submitted": false })),
    })
  }
}

pub fn descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new("input-form", "Input Form", "forms", "Ask the user for input")
      .with_outputs(["output", "cancelled"])
      .without_timeout(),
    ConfigSchema::new()
      .property("title", PropertyDescriptor::text("Title"))
      .property(
        "fields",
        PropertyDescriptor::custom("Fields")
          .required()
          .describe("Array of { name, label, fieldType, required }"),
      )
      .property(
        "submitLabel",
        PropertyDescriptor::text("Submit label").default_value("Submit"),
      ),
    json!({ "submitted": true, "values": { "email": "ada@example.com" } }),
    || Box::new(InputFormAction),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fields_from_string() {
    let fields = parse_fields(&json!(r#"[{"name":"email","label":"Email"}]"#)).unwrap();
    assert_eq!(fields[0].name, "email");
    assert_eq!(fields[0].field_type, "text");
    assert!(parse_fields(&json!("{")).is_err());
  }
}
