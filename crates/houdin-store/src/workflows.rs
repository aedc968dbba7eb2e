use std::sync::Arc;

use houdin_config::{OutboxAction, OutboxEntry, WorkflowDefinition, now_millis};
use tracing::info;

use crate::error::StoreError;
use crate::state::SharedState;

/// The local, authoritative workflow list.
///
/// Every create, update, and delete appends an outbox entry in the same
/// write, so a persisted change is never missing from the next push.
#[derive(Clone)]
pub struct WorkflowStore {
  shared: Arc<SharedState>,
}

impl WorkflowStore {
  pub(crate) fn new(shared: Arc<SharedState>) -> Self {
    Self { shared }
  }

  pub fn list(&self) -> Vec<WorkflowDefinition> {
    self.shared.read(|s| s.workflows.clone())
  }

  pub fn get(&self, id: &str) -> Option<WorkflowDefinition> {
    self
      .shared
      .read(|s| s.workflows.iter().find(|w| w.id == id).cloned())
  }

  /// Pending entries, oldest first.
  pub fn outbox(&self) -> Vec<OutboxEntry> {
    self.shared.read(|s| s.outbox.clone())
  }

  pub async fn create(&self, mut workflow: WorkflowDefinition) -> Result<WorkflowDefinition, StoreError> {
    let now = now_millis();
    workflow.modified_at = now;

    let created = self
      .shared
      .update(|state| {
        if state.workflows.iter().any(|w| w.id == workflow.id) {
          return Err(StoreError::Duplicate(workflow.id.clone()));
        }
        state.workflows.push(workflow.clone());
        state.outbox.push(entry(&workflow, OutboxAction::Create, now));
        Ok(workflow)
      })
      .await?;

    info!(workflow_id = %created.id, "workflow_created");
    Ok(created)
  }

  /// Replace a workflow. Its `id` selects which one.
  pub async fn update(&self, mut workflow: WorkflowDefinition) -> Result<WorkflowDefinition, StoreError> {
    let now = now_millis();
    workflow.modified_at = now;

    let updated = self
      .shared
      .update(|state| {
        let slot = state
          .workflows
          .iter_mut()
          .find(|w| w.id == workflow.id)
          .ok_or_else(|| StoreError::NotFound(workflow.id.clone()))?;
        *slot = workflow.clone();
        state.outbox.push(entry(&workflow, OutboxAction::Update, now));
        Ok(workflow)
      })
      .await?;

    info!(workflow_id = %updated.id, "workflow_updated");
    Ok(updated)
  }

  pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<WorkflowDefinition, StoreError> {
    let mut workflow = self
      .get(id)
      .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    workflow.enabled = enabled;
    self.update(workflow).await
  }

  pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
    let now = now_millis();
    self
      .shared
      .update(|state| {
        let before = state.workflows.len();
        state.workflows.retain(|w| w.id != id);
        if state.workflows.len() == before {
          return Err(StoreError::NotFound(id.to_string()));
        }
        state.outbox.push(OutboxEntry {
          workflow_id: id.to_string(),
          action: OutboxAction::Delete,
          timestamp: now,
          workflow: None,
        });
        Ok(())
      })
      .await?;

    info!(workflow_id = %id, "workflow_deleted");
    Ok(())
  }
}

fn entry(workflow: &WorkflowDefinition, action: OutboxAction, timestamp: i64) -> OutboxEntry {
  OutboxEntry {
    workflow_id: workflow.id.clone(),
    action,
    timestamp,
    workflow: Some(workflow.clone()),
  }
}
