use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Extension message envelope: `{ type, data }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
  #[serde(rename = "type")]
  pub kind: String,
  pub data: T,
}

impl<T> Envelope<T> {
  pub fn new(kind: impl Into<String>, data: T) -> Self {
    Self {
      kind: kind.into(),
      data,
    }
  }
}

/// Operations the background context performs on behalf of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
  HttpRequest,
  ExecuteScript,
  WaitForNavigation,
}

impl MessageKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      MessageKind::HttpRequest => "http-request",
      MessageKind::ExecuteScript => "execute-script",
      MessageKind::WaitForNavigation => "wait-for-navigation",
    }
  }
}

impl fmt::Display for MessageKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A request as it travels over the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
  pub id: Uuid,
  #[serde(flatten)]
  pub envelope: Envelope<Value>,
}

impl BridgeRequest {
  pub fn new(kind: impl Into<String>, data: Value) -> Self {
    Self {
      id: Uuid::new_v4(),
      envelope: Envelope::new(kind, data),
    }
  }

  pub fn kind(&self) -> &str {
    &self.envelope.kind
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
  Network,
  Timeout,
  Script,
  UnknownKind,
  InvalidPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Reply {
  Ok { data: Value },
  Error { code: ErrorCode, message: String },
}

/// The single reply to a [`BridgeRequest`], matched by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
  pub id: Uuid,
  #[serde(flatten)]
  pub reply: Reply,
}

/// Logical HTTP request carried by `http-request` messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
  pub url: String,
  #[serde(default = "default_method")]
  pub method: String,
  #[serde(default)]
  pub headers: HashMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<Value>,
  /// Milliseconds.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout: Option<u64>,
  #[serde(default = "default_follow_redirects")]
  pub follow_redirects: bool,
}

fn default_method() -> String {
  "GET".to_string()
}

fn default_follow_redirects() -> bool {
  true
}

impl HttpRequest {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      method: default_method(),
      headers: HashMap::new(),
      body: None,
      timeout: None,
      follow_redirects: true,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
  pub status: u16,
  pub status_text: String,
  pub headers: HashMap<String, String>,
  /// Parsed JSON when the body is JSON, otherwise the raw text.
  pub data: Value,
  /// Final URL after redirects.
  pub url: String,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Run `code` in the page's own JS realm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRequest {
  pub code: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tab_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRequest {
  /// Navigate to this URL first, if set.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tab_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationResult {
  pub url: String,
}
