//! Outbox reconciliation with the remote store.
//!
//! One cycle:
//! 1. pull changes since the last `serverTime` and merge them; a remote
//!    record wins when its `updatedAt` is newer than the local `modifiedAt`,
//!    otherwise the local copy is kept and pushed again
//! 2. push the outbox, collapsed to the latest state per workflow
//! 3. drain the entries the push acknowledged
//!
//! Cycles on one reconciler run one at a time. A failure leaves the outbox as
//! it was, so the next cycle retries it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use houdin_config::{
  OutboxAction, OutboxEntry, PullResponse, PushRequest, WorkflowDefinition, WorkflowTombstone,
  now_millis,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::remote::RemoteApi;
use crate::session::SessionStore;
use crate::state::{LocalStore, PersistedState, SharedState, SyncStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
  /// Remote records that replaced or added local workflows.
  pub pulled: usize,
  /// Local workflows removed by remote tombstones.
  pub removed: usize,
  pub pushed_updates: usize,
  pub pushed_deletes: usize,
  pub permanently_deleted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
  Synced(SyncReport),
  /// No account, or a plan without sync. Local state is untouched.
  Skipped,
}

pub struct SyncReconciler {
  shared: Arc<SharedState>,
  session: SessionStore,
  remote: Arc<dyn RemoteApi>,
  cycle_lock: Mutex<()>,
}

impl SyncReconciler {
  pub fn new(store: &LocalStore, session: SessionStore, remote: Arc<dyn RemoteApi>) -> Self {
    Self {
      shared: store.shared(),
      session,
      remote,
      cycle_lock: Mutex::new(()),
    }
  }

  pub fn status(&self) -> SyncStatus {
    self.shared.read(|s| s.sync.status)
  }

  /// Run one sync cycle. A call made while another is running waits for it
  /// and then runs its own.
  #[instrument(name = "sync_cycle", skip_all)]
  pub async fn sync(&self) -> Result<SyncOutcome, StoreError> {
    let _cycle = match self.cycle_lock.try_lock() {
      Ok(guard) => guard,
      Err(_) => {
        debug!("sync_waiting_for_running_cycle");
        self.cycle_lock.lock().await
      }
    };

    let session = self.session.load().await?;
    let token = match (&session.account, &session.access_token) {
      (Some(account), Some(token)) if account.plan.can_sync() => token.clone(),
      _ => {
        info!("sync_skipped");
        return Ok(SyncOutcome::Skipped);
      }
    };

    self
      .shared
      .update(|state| {
        state.sync.status = SyncStatus::Syncing;
        Ok(())
      })
      .await?;

    match self.cycle(&token).await {
      Ok(report) => {
        self
          .shared
          .update(|state| {
            state.sync.status = SyncStatus::Success;
            state.sync.last_synced_at = Some(Utc::now());
            state.sync.error = None;
            Ok(())
          })
          .await?;
        info!(
          pulled = report.pulled,
          removed = report.removed,
          pushed_updates = report.pushed_updates,
          pushed_deletes = report.pushed_deletes,
          "sync_completed"
        );
        Ok(SyncOutcome::Synced(report))
      }
      Err(e) => {
        warn!(error = %e, "sync_failed");
        let message = e.to_string();
        self
          .shared
          .update(|state| {
            state.sync.status = SyncStatus::Error;
            state.sync.error = Some(message);
            Ok(())
          })
          .await?;
        Err(e)
      }
    }
  }

  async fn cycle(&self, token: &str) -> Result<SyncReport, StoreError> {
    let since = self.shared.read(|s| s.sync.last_server_time);
    let pull = self.remote.pull(token, since).await?;

    let mut report = self
      .shared
      .update(|state| Ok(merge_pull(state, pull, now_millis())))
      .await?;

    let (request, pushed) = self.shared.read(|s| (push_request(s), s.outbox.clone()));
    if pushed.is_empty() {
      return Ok(report);
    }

    let response = self.remote.push(token, &request).await?;
    report.pushed_updates = request.updated.len();
    report.pushed_deletes = request.deleted.len();
    report.permanently_deleted = response.permanently_deleted;

    // Entries appended while the push was in flight stay queued.
    self
      .shared
      .update(|state| {
        drain_pushed(&mut state.outbox, &pushed);
        Ok(())
      })
      .await?;

    Ok(report)
  }
}

/// Merge a pull into local state.
fn merge_pull(state: &mut PersistedState, pull: PullResponse, now: i64) -> SyncReport {
  let mut report = SyncReport::default();

  for remote in pull.updated {
    let id = remote.workflow.id.clone();
    let local_stamp = match state.workflows.iter().find(|w| w.id == id) {
      Some(local) => Some(local.modified_at),
      // Deleted here but not pushed yet.
      None => pending_delete(&state.outbox, &id),
    };

    match local_stamp {
      Some(stamp) if remote.updated_at <= stamp => {
        if !state.outbox.iter().any(|e| e.workflow_id == id) {
          requeue(state, &id, now);
        }
      }
      _ => {
        let mut workflow = remote.workflow;
        workflow.modified_at = remote.updated_at;
        match state.workflows.iter_mut().find(|w| w.id == id) {
          Some(slot) => *slot = workflow,
          None => state.workflows.push(workflow),
        }
        state.outbox.retain(|e| e.workflow_id != id);
        report.pulled += 1;
      }
    }
  }

  for tombstone in pull.deleted {
    let Some(local) = state.workflows.iter().find(|w| w.id == tombstone.id) else {
      state.outbox.retain(|e| e.workflow_id != tombstone.id);
      continue;
    };
    let pending = state.outbox.iter().any(|e| e.workflow_id == tombstone.id);
    if pending && local.modified_at > tombstone.deleted_at {
      continue;
    }
    state.workflows.retain(|w| w.id != tombstone.id);
    state.outbox.retain(|e| e.workflow_id != tombstone.id);
    report.removed += 1;
  }

  state.sync.last_server_time = Some(pull.server_time);
  report
}

/// Remove each pushed entry once, matched by workflow, action and timestamp.
fn drain_pushed(outbox: &mut Vec<OutboxEntry>, pushed: &[OutboxEntry]) {
  for entry in pushed {
    if let Some(index) = outbox.iter().position(|e| {
      e.workflow_id == entry.workflow_id && e.action == entry.action && e.timestamp == entry.timestamp
    }) {
      outbox.remove(index);
    }
  }
}

fn pending_delete(outbox: &[OutboxEntry], id: &str) -> Option<i64> {
  outbox
    .iter()
    .rev()
    .find(|e| e.workflow_id == id)
    .filter(|e| e.action == OutboxAction::Delete)
    .map(|e| e.timestamp)
}

fn requeue(state: &mut PersistedState, id: &str, now: i64) {
  let workflow = state.workflows.iter().find(|w| w.id == id).cloned();
  if let Some(workflow) = workflow {
    state.outbox.push(OutboxEntry {
      workflow_id: id.to_string(),
      action: OutboxAction::Update,
      timestamp: now,
      workflow: Some(workflow),
    });
  }
}

/// Collapse the outbox to one change per workflow, in first-seen order.
///
/// The last entry for a workflow decides: a delete becomes a tombstone,
/// anything else pushes the current local copy.
fn push_request(state: &PersistedState) -> PushRequest {
  let mut order: Vec<&str> = Vec::new();
  let mut last: HashMap<&str, &OutboxEntry> = HashMap::new();
  for entry in &state.outbox {
    if last.insert(entry.workflow_id.as_str(), entry).is_none() {
      order.push(entry.workflow_id.as_str());
    }
  }

  let mut request = PushRequest::default();
  for id in order {
    let entry = last[id];
    match entry.action {
      OutboxAction::Delete => request.deleted.push(WorkflowTombstone {
        id: id.to_string(),
        deleted_at: entry.timestamp,
      }),
      OutboxAction::Create | OutboxAction::Update => {
        let current: Option<WorkflowDefinition> = state
          .workflows
          .iter()
          .find(|w| w.id == id)
          .cloned()
          .or_else(|| entry.workflow.clone());
        if let Some(workflow) = current {
          request.updated.push(workflow);
        }
      }
    }
  }
  request
}

#[cfg(test)]
mod tests {
  use super::*;
  use houdin_config::RemoteWorkflow;

  fn workflow(id: &str, modified_at: i64) -> WorkflowDefinition {
    WorkflowDefinition {
      id: id.to_string(),
      name: id.to_string(),
      description: None,
      url_pattern: "*".to_string(),
      enabled: true,
      nodes: vec![],
      connections: vec![],
      variables: Default::default(),
      modified_at,
    }
  }

  fn outbox_entry(id: &str, action: OutboxAction, timestamp: i64) -> OutboxEntry {
    OutboxEntry {
      workflow_id: id.to_string(),
      action,
      timestamp,
      workflow: (action != OutboxAction::Delete).then(|| workflow(id, timestamp)),
    }
  }

  fn remote(id: &str, name: &str, updated_at: i64) -> RemoteWorkflow {
    let mut workflow = workflow(id, 0);
    workflow.name = name.to_string();
    RemoteWorkflow {
      workflow,
      updated_at,
    }
  }

  fn pull(updated: Vec<RemoteWorkflow>, deleted: Vec<WorkflowTombstone>) -> PullResponse {
    PullResponse {
      server_time: 500,
      updated,
      deleted,
    }
  }

  #[test]
  fn test_newer_remote_overwrites_local_and_drops_outbox() {
    let mut state = PersistedState {
      workflows: vec![workflow("wf", 100)],
      outbox: vec![outbox_entry("wf", OutboxAction::Update, 100)],
      ..Default::default()
    };

    let report = merge_pull(&mut state, pull(vec![remote("wf", "Remote", 200)], vec![]), 300);

    assert_eq!(report.pulled, 1);
    assert_eq!(state.workflows[0].name, "Remote");
    assert_eq!(state.workflows[0].modified_at, 200);
    assert!(state.outbox.is_empty());
    assert_eq!(state.sync.last_server_time, Some(500));
  }

  #[test]
  fn test_older_remote_keeps_local_and_requeues() {
    let mut state = PersistedState {
      workflows: vec![workflow("wf", 300)],
      ..Default::default()
    };

    let report = merge_pull(&mut state, pull(vec![remote("wf", "Remote", 200)], vec![]), 400);

    assert_eq!(report.pulled, 0);
    assert_eq!(state.workflows[0].name, "wf");
    assert_eq!(state.outbox.len(), 1);
    assert_eq!(state.outbox[0].action, OutboxAction::Update);
  }

  #[test]
  fn test_unpushed_local_delete_beats_older_remote() {
    let mut state = PersistedState {
      outbox: vec![outbox_entry("wf", OutboxAction::Delete, 300)],
      ..Default::default()
    };

    merge_pull(&mut state, pull(vec![remote("wf", "Remote", 200)], vec![]), 400);
    assert!(state.workflows.is_empty());
    assert_eq!(state.outbox.len(), 1);

    merge_pull(&mut state, pull(vec![remote("wf", "Remote", 350)], vec![]), 400);
    assert_eq!(state.workflows.len(), 1);
    assert!(state.outbox.is_empty());
  }

  #[test]
  fn test_tombstone_removes_unless_local_is_newer_and_pending() {
    let mut state = PersistedState {
      workflows: vec![workflow("gone", 100), workflow("kept", 400)],
      outbox: vec![outbox_entry("kept", OutboxAction::Update, 400)],
      ..Default::default()
    };
    let tombstones = vec![
      WorkflowTombstone {
        id: "gone".to_string(),
        deleted_at: 200,
      },
      WorkflowTombstone {
        id: "kept".to_string(),
        deleted_at: 200,
      },
    ];

    let report = merge_pull(&mut state, pull(vec![], tombstones), 500);

    assert_eq!(report.removed, 1);
    let ids: Vec<&str> = state.workflows.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec!["kept"]);
    assert_eq!(state.outbox.len(), 1);
  }

  #[test]
  fn test_push_request_collapses_per_workflow() {
    let state = PersistedState {
      workflows: vec![workflow("a", 20)],
      outbox: vec![
        outbox_entry("a", OutboxAction::Create, 10),
        outbox_entry("b", OutboxAction::Create, 11),
        outbox_entry("a", OutboxAction::Update, 20),
        outbox_entry("b", OutboxAction::Delete, 30),
      ],
      ..Default::default()
    };

    let request = push_request(&state);

    assert_eq!(request.updated.len(), 1);
    assert_eq!(request.updated[0].modified_at, 20);
    assert_eq!(
      request.deleted,
      vec![WorkflowTombstone {
        id: "b".to_string(),
        deleted_at: 30
      }]
    );
  }

  #[test]
  fn test_drain_removes_only_pushed_entries() {
    let pushed = vec![
      outbox_entry("a", OutboxAction::Create, 10),
      outbox_entry("b", OutboxAction::Create, 11),
    ];
    // "a" was dropped by a merge and "c" appended after the snapshot.
    let mut outbox = vec![
      outbox_entry("b", OutboxAction::Create, 11),
      outbox_entry("c", OutboxAction::Create, 12),
      outbox_entry("b", OutboxAction::Update, 13),
    ];

    drain_pushed(&mut outbox, &pushed);

    let left: Vec<(&str, i64)> = outbox
      .iter()
      .map(|e| (e.workflow_id.as_str(), e.timestamp))
      .collect();
    assert_eq!(left, vec![("c", 12), ("b", 13)]);
  }
}
