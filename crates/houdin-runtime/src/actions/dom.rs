//! Page DOM actions: click, read, and fill elements by CSS selector.

use async_trait::async_trait;
use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use serde::Deserialize;
use serde_json::json;

use crate::action::{ActionContext, ActionDescriptor, ActionOutput, TypedAction};
use crate::error::ActionError;

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
  pub selector: String,
}

pub struct ClickElementAction;

#[async_trait]
impl TypedAction for ClickElementAction {
  type Config = SelectorConfig;

  async fn run(&self, config: SelectorConfig, ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    ctx.page.click(&config.selector).await?;
    Ok(ActionOutput::new(json!({ "selector": config.selector, "clicked": true })))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentProperty {
  Text,
  Value,
  Html,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
  pub selector: String,
  #[serde(default = "default_property")]
  pub property: ContentProperty,
}

fn default_property() -> ContentProperty {
  ContentProperty::Text
}

pub struct GetElementContentAction;

#[async_trait]
impl TypedAction for GetElementContentAction {
  type Config = ContentConfig;

  async fn run(&self, config: ContentConfig, ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    let element = ctx
      .page
      .query(&config.selector)
      .await
      .ok_or_else(|| ActionError::ElementNotFound {
        selector: config.selector.clone(),
      })?;

    let content = match config.property {
      ContentProperty::Text => element.text.clone(),
      ContentProperty::Value => element.value.clone().unwrap_or_default(),
      ContentProperty::Html => element.html.clone().unwrap_or_default(),
    };

    Ok(ActionOutput::new(json!({
      "content": content,
      "tag": element.tag,
      "attributes": element.attributes,
    })))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetValueConfig {
  pub selector: String,
  #[serde(default)]
  pub value: String,
}

pub struct SetInputValueAction;

#[async_trait]
impl TypedAction for SetInputValueAction {
  type Config = SetValueConfig;

  async fn run(&self, config: SetValueConfig, ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    ctx.page.set_value(&config.selector, &config.value).await?;
    Ok(ActionOutput::new(json!({ "selector": config.selector, "value": config.value })))
  }
}

fn selector_property() -> PropertyDescriptor {
  PropertyDescriptor::text("Selector")
    .required()
    .describe("CSS selector of the target element")
}

pub fn click_descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new("click-element", "Click Element", "pointer", "Click an element on the page"),
    ConfigSchema::new().property("selector", selector_property()),
    json!({ "selector": "#submit", "clicked": true }),
    || Box::new(ClickElementAction),
  )
}

pub fn content_descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new(
      "get-element-content",
      "Get Element Content",
      "file-text",
      "Read the text, value, or HTML of an element",
    ),
    ConfigSchema::new()
      .property("selector", selector_property())
      .property(
        "property",
        PropertyDescriptor::select("Property", ["text", "value", "html"]).default_value("text"),
      ),
    json!({ "content": "Hello", "tag": "h1", "attributes": {} }),
    || Box::new(GetElementContentAction),
  )
}

pub fn set_value_descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new("set-input-value", "Set Input Value", "forms", "Fill an input field"),
    ConfigSchema::new()
      .property("selector", selector_property())
      .property("value", PropertyDescriptor::text("Value")),
    json!({ "selector": "#email", "value": "ada@example.com" }),
    || Box::new(SetInputValueAction),
  )
}
