use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
  #[error("node not found: {0}")]
  NodeNotFound(String),

  #[error("duplicate node id: {0}")]
  DuplicateNodeId(String),

  #[error("connection '{connection_id}' references unknown node '{node_id}'")]
  DanglingConnection {
    connection_id: String,
    node_id: String,
  },

  #[error("trigger node '{0}' cannot have incoming connections")]
  TriggerHasIncoming(String),

  #[error("workflow has no trigger nodes")]
  NoTriggers,

  #[error("cycle detected in workflow graph at node '{0}'")]
  CycleDetected(String),
}
