use std::sync::Arc;

use houdin_registry::{Descriptor, Registry};
use houdin_runtime::{PageEvent, PageHost};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TriggerError;

/// A trigger fired; start an execution of `node_id` seeded with `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerFiring {
  pub workflow_id: String,
  pub node_id: String,
  pub data: Value,
}

/// What a trigger instance gets at setup.
///
/// `cancel` fires when the trigger is torn down. Listener tasks must stop
/// when it does.
#[derive(Clone)]
pub struct TriggerContext {
  pub workflow_id: String,
  pub node_id: String,
  pub page: Arc<dyn PageHost>,
  pub cancel: CancellationToken,
  sink: mpsc::UnboundedSender<TriggerFiring>,
}

impl TriggerContext {
  pub fn new(
    workflow_id: impl Into<String>,
    node_id: impl Into<String>,
    page: Arc<dyn PageHost>,
    cancel: CancellationToken,
    sink: mpsc::UnboundedSender<TriggerFiring>,
  ) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      node_id: node_id.into(),
      page,
      cancel,
      sink,
    }
  }

  /// Start an execution. Every call is an independent firing.
  pub fn fire(&self, data: Value) {
    if self.cancel.is_cancelled() {
      return;
    }
    debug!(workflow_id = %self.workflow_id, node_id = %self.node_id, "trigger_fired");
    let firing = TriggerFiring {
      workflow_id: self.workflow_id.clone(),
      node_id: self.node_id.clone(),
      data,
    };
    if self.sink.send(firing).is_err() {
      debug!(workflow_id = %self.workflow_id, node_id = %self.node_id, "trigger_sink_closed");
    }
  }

  /// Id for UI this trigger injects into the page.
  pub fn component_id(&self) -> String {
    format!("{}:{}", self.workflow_id, self.node_id)
  }
}

/// Runtime half of a trigger type.
///
/// `setup` is called once per activation with a validated config; it
/// registers listeners and returns. `cleanup` runs after the context's token
/// has been cancelled and removes anything `setup` left on the page.
pub trait Trigger: Send + Sync {
  fn setup(&self, config: Map<String, Value>, ctx: &TriggerContext) -> Result<(), TriggerError>;

  fn cleanup(&self, _ctx: &TriggerContext) {}
}

pub type TriggerDescriptor = Descriptor<dyn Trigger>;

pub type TriggerRegistry = Registry<dyn Trigger>;

pub(crate) fn parse_config<T: DeserializeOwned>(config: Map<String, Value>) -> Result<T, TriggerError> {
  serde_json::from_value(Value::Object(config))
    .map_err(|e| TriggerError::invalid_config("config", e.to_string()))
}

/// Watch page events until the trigger is torn down.
///
/// `on_event` returns the payload to fire with, or `None` to ignore the event.
pub fn spawn_listener<F>(ctx: &TriggerContext, mut on_event: F)
where
  F: FnMut(&PageEvent) -> Option<Value> + Send + 'static,
{
  let mut events = ctx.page.subscribe();
  let ctx = ctx.clone();

  tokio::spawn(async move {
    loop {
      let event = tokio::select! {
        _ = ctx.cancel.cancelled() => break,
        event = events.recv() => event,
      };

      match event {
        Ok(event) => {
          if let Some(data) = on_event(&event) {
            ctx.fire(data);
          }
        }
        Err(RecvError::Lagged(skipped)) => {
          warn!(workflow_id = %ctx.workflow_id, node_id = %ctx.node_id, skipped, "page_events_lagged");
        }
        Err(RecvError::Closed) => break,
      }
    }
    debug!(workflow_id = %ctx.workflow_id, node_id = %ctx.node_id, "trigger_listener_stopped");
  });
}
