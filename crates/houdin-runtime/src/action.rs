use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use houdin_bridge::Bridge;
use houdin_config::{CredentialLookup, DEFAULT_OUTPUT_HANDLE};
use houdin_registry::{Descriptor, Registry};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::ActionError;
use crate::page::PageHost;

/// Successful outcome of an action: its output plus the handle it emits on.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutput {
  pub data: Value,
  pub handle: String,
}

impl ActionOutput {
  /// Emit on the default `output` handle.
  pub fn new(data: Value) -> Self {
    Self::on(DEFAULT_OUTPUT_HANDLE, data)
  }

  /// Emit on a named handle, e.g. `"true"` / `"false"` for branching.
  pub fn on(handle: impl Into<String>, data: Value) -> Self {
    Self {
      data,
      handle: handle.into(),
    }
  }
}

/// Everything an action may touch while it runs.
#[derive(Clone)]
pub struct ActionContext {
  pub workflow_id: String,
  pub execution_id: String,
  pub node_id: String,
  pub tab_id: Option<u32>,
  pub page: Arc<dyn PageHost>,
  pub bridge: Arc<dyn Bridge>,
  pub credentials: Arc<dyn CredentialLookup>,
  /// Bound for interactive prompts.
  pub modal_timeout: Duration,
  /// Fires on timeout or execution abort. Actions stop in-flight work when it does.
  pub cancel: CancellationToken,
}

/// Runtime half of an action type.
///
/// `config` has already been interpolated, defaulted, and validated against
/// the type's schema. Returning resolves the node exactly once.
#[async_trait]
pub trait Action: Send + Sync {
  async fn execute(
    &self,
    config: Map<String, Value>,
    ctx: &ActionContext,
  ) -> Result<ActionOutput, ActionError>;
}

/// An action with a typed configuration.
///
/// Any `TypedAction` is an [`Action`]; the config map is deserialized into
/// `Config` first and a mismatch is reported as a config validation error.
#[async_trait]
pub trait TypedAction: Send + Sync + 'static {
  type Config: DeserializeOwned + Send;

  async fn run(&self, config: Self::Config, ctx: &ActionContext) -> Result<ActionOutput, ActionError>;
}

#[async_trait]
impl<T: TypedAction> Action for T {
  async fn execute(
    &self,
    config: Map<String, Value>,
    ctx: &ActionContext,
  ) -> Result<ActionOutput, ActionError> {
    let typed: T::Config = serde_json::from_value(Value::Object(config))
      .map_err(|e| ActionError::invalid_config("config", e.to_string()))?;
    self.run(typed, ctx).await
  }
}

pub type ActionDescriptor = Descriptor<dyn Action>;

pub type ActionRegistry = Registry<dyn Action>;
