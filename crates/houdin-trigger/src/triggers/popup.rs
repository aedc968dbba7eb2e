use houdin_registry::{ConfigSchema, NodeMetadata};
use houdin_runtime::PageEvent;
use serde_json::{Map, Value, json};

use crate::error::TriggerError;
use crate::trigger::{Trigger, TriggerContext, TriggerDescriptor, spawn_listener};

/// Message the popup sends to run a workflow by hand.
///
/// Data: `{ "workflowId": ..., "nodeId"?: ..., "payload"?: ... }`. Without a
/// `nodeId` every popup trigger of the workflow fires.
pub const RUN_WORKFLOW_MESSAGE: &str = "run-workflow";

pub struct PopupTrigger;

impl Trigger for PopupTrigger {
  fn setup(&self, _config: Map<String, Value>, ctx: &TriggerContext) -> Result<(), TriggerError> {
    let workflow_id = ctx.workflow_id.clone();
    let node_id = ctx.node_id.clone();

    spawn_listener(ctx, move |event| {
      let PageEvent::Message { kind, data } = event else {
        return None;
      };
      if kind != RUN_WORKFLOW_MESSAGE || data["workflowId"].as_str() != Some(workflow_id.as_str()) {
        return None;
      }
      if let Some(target) = data["nodeId"].as_str()
        && target != node_id
      {
        return None;
      }
      Some(match data.get("payload") {
        Some(payload) if !payload.is_null() => payload.clone(),
        _ => json!({ "source": "popup" }),
      })
    });
    Ok(())
  }
}

pub fn descriptor() -> TriggerDescriptor {
  TriggerDescriptor::new(
    NodeMetadata::new("popup", "Manual Run", "player-play", "Run from the extension popup"),
    ConfigSchema::new(),
    json!({ "source": "popup" }),
    || Box::new(PopupTrigger),
  )
}
