//! Outbox and remote sync wire types.

use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxAction {
  Create,
  Update,
  Delete,
}

/// A pending local mutation awaiting push.
///
/// `workflow` is present for create/update and absent for delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
  pub workflow_id: String,
  pub action: OutboxAction,
  pub timestamp: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workflow: Option<WorkflowDefinition>,
}

/// Deletion marker so copies elsewhere can be pruned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTombstone {
  pub id: String,
  pub deleted_at: i64,
}

/// A workflow as returned by the remote, stamped with the server's update time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWorkflow {
  #[serde(flatten)]
  pub workflow: WorkflowDefinition,
  pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
  pub server_time: i64,
  #[serde(default)]
  pub updated: Vec<RemoteWorkflow>,
  #[serde(default)]
  pub deleted: Vec<WorkflowTombstone>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
  pub updated: Vec<WorkflowDefinition>,
  pub deleted: Vec<WorkflowTombstone>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
  #[serde(default)]
  pub permanently_deleted: Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_pull_response_flattens_remote_workflow() {
    let pull: PullResponse = serde_json::from_value(json!({
      "serverTime": 42,
      "updated": [{
        "id": "wf-1",
        "name": "Remote",
        "urlPattern": "*",
        "modifiedAt": 10,
        "updatedAt": 40
      }],
      "deleted": [{ "id": "wf-2", "deletedAt": 41 }]
    }))
    .unwrap();

    assert_eq!(pull.server_time, 42);
    assert_eq!(pull.updated[0].workflow.name, "Remote");
    assert_eq!(pull.updated[0].updated_at, 40);
    assert_eq!(pull.deleted[0].id, "wf-2");
  }

  #[test]
  fn test_delete_entry_omits_workflow() {
    let entry = OutboxEntry {
      workflow_id: "wf-1".to_string(),
      action: OutboxAction::Delete,
      timestamp: 1,
      workflow: None,
    };
    let value = serde_json::to_value(entry).unwrap();
    assert_eq!(value["action"], "delete");
    assert!(value.get("workflow").is_none());
  }
}
