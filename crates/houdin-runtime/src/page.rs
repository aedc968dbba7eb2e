//! The page the workflow runs in, as seen by actions and triggers.
//!
//! [`PageHost`] covers the DOM, injected UI, page storage, and the stream of
//! page events. The extension implements it over the content script;
//! [`FakePage`](crate::FakePage) implements it in memory for tests and the CLI.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
  #[error("element not found: {selector}")]
  ElementNotFound { selector: String },

  #[error("page unavailable: {0}")]
  Unavailable(String),
}

/// Snapshot of a DOM element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
  pub tag: String,
  #[serde(default)]
  pub text: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub html: Option<String>,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub attributes: HashMap<String, String>,
}

impl Element {
  pub fn new(tag: impl Into<String>, text: impl Into<String>) -> Self {
    Self {
      tag: tag.into(),
      text: text.into(),
      ..Self::default()
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modal {
  pub title: String,
  pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
  Info,
  Success,
  Warning,
  Error,
}

/// Transient, non-blocking toast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
  pub title: String,
  pub message: String,
  pub level: NotificationLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
  pub name: String,
  pub label: String,
  #[serde(default = "default_field_type")]
  pub field_type: String,
  #[serde(default)]
  pub required: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_value: Option<String>,
}

fn default_field_type() -> String {
  "text".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPrompt {
  pub title: String,
  pub fields: Vec<FormField>,
  pub submit_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
  /// Floating action button pinned to a page corner.
  Fab,
  /// Button inserted next to a page element.
  Button,
}

/// UI the extension injects into the page on behalf of a trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectedComponent {
  pub id: String,
  pub kind: ComponentKind,
  pub label: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target_selector: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPhase {
  Down,
  Up,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
  pub phase: KeyPhase,
  pub key: String,
  #[serde(default)]
  pub ctrl: bool,
  #[serde(default)]
  pub alt: bool,
  #[serde(default)]
  pub shift: bool,
  #[serde(default)]
  pub meta: bool,
}

impl KeyEvent {
  pub fn down(key: impl Into<String>) -> Self {
    Self {
      phase: KeyPhase::Down,
      key: key.into(),
      ctrl: false,
      alt: false,
      shift: false,
      meta: false,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapturedRequest {
  pub url: String,
  pub method: String,
  #[serde(default)]
  pub headers: HashMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedResponse {
  pub status: u16,
  #[serde(default)]
  pub status_text: String,
  #[serde(default)]
  pub headers: HashMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<Value>,
}

/// One observed network exchange, whichever way it was captured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkCapture {
  pub request: CapturedRequest,
  pub response: CapturedResponse,
}

/// Everything a trigger can listen for.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
  /// An injected component was activated.
  ComponentTrigger { component_id: String, data: Value },
  Key(KeyEvent),
  Loaded { url: String },
  UrlChanged { url: String },
  Network(NetworkCapture),
  /// Extension message, e.g. a manual run from the popup.
  Message { kind: String, data: Value },
  Unloaded,
}

#[async_trait]
pub trait PageHost: Send + Sync {
  fn url(&self) -> String;

  fn tab_id(&self) -> Option<u32>;

  async fn query(&self, selector: &str) -> Option<Element>;

  async fn click(&self, selector: &str) -> Result<(), PageError>;

  async fn set_value(&self, selector: &str, value: &str) -> Result<(), PageError>;

  async fn show_modal(&self, modal: Modal) -> Result<(), PageError>;

  /// Show a form and wait for the user.
  ///
  /// `Ok(None)` means the form was closed without submitting. Callers bound
  /// the wait themselves.
  async fn prompt_form(&self, form: FormPrompt) -> Result<Option<Map<String, Value>>, PageError>;

  fn notify(&self, notification: Notification);

  fn inject_component(&self, component: InjectedComponent) -> Result<(), PageError>;

  fn remove_component(&self, component_id: &str);

  async fn storage_get(&self, key: &str) -> Option<String>;

  /// `None` removes the key.
  async fn storage_set(&self, key: &str, value: Option<String>);

  fn subscribe(&self) -> broadcast::Receiver<PageEvent>;
}
