use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use houdin_config::{
  CredentialLookup, OutboxAction, PullResponse, PushRequest, PushResponse, RemoteWorkflow,
  WorkflowDefinition, credential_id,
};
use houdin_store::{
  Account, CredentialStore, JsonFileStorage, LocalStore, MemoryStorage, Plan, RemoteApi, Session,
  SessionStore, StoreError, SyncOutcome, SyncReconciler, SyncStatus,
};
use serde_json::{Map, Value, json};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

fn workflow(id: &str) -> WorkflowDefinition {
  serde_json::from_value(json!({
    "id": id,
    "name": format!("Workflow {}", id),
    "urlPattern": "https://example.com/*",
    "nodes": [{ "id": "t1", "type": "trigger", "data": { "type": "page-load" } }]
  }))
  .unwrap()
}

fn config(value: Value) -> Map<String, Value> {
  match value {
    Value::Object(map) => map,
    _ => Map::new(),
  }
}

#[derive(Default)]
struct FakeRemote {
  pull: Mutex<Option<PullResponse>>,
  since: Mutex<Vec<Option<i64>>>,
  pushes: Mutex<Vec<PushRequest>>,
  fail_push: Mutex<bool>,
  hold_push: AtomicBool,
  push_started: Notify,
  release_push: Notify,
}

impl FakeRemote {
  fn pushes(&self) -> Vec<PushRequest> {
    self.pushes.lock().unwrap().clone()
  }
}

#[async_trait]
impl RemoteApi for FakeRemote {
  async fn pull(&self, token: &str, since: Option<i64>) -> Result<PullResponse, StoreError> {
    assert_eq!(token, "secret");
    self.since.lock().unwrap().push(since);
    Ok(self.pull.lock().unwrap().take().unwrap_or(PullResponse {
      server_time: 1_000,
      updated: vec![],
      deleted: vec![],
    }))
  }

  async fn push(&self, _token: &str, request: &PushRequest) -> Result<PushResponse, StoreError> {
    if *self.fail_push.lock().unwrap() {
      return Err(StoreError::Remote("503 Service Unavailable".to_string()));
    }
    if self.hold_push.swap(false, Ordering::SeqCst) {
      self.push_started.notify_one();
      self.release_push.notified().await;
    }
    self.pushes.lock().unwrap().push(request.clone());
    Ok(PushResponse {
      permanently_deleted: request.deleted.iter().map(|t| t.id.clone()).collect(),
    })
  }
}

async fn signed_in(storage: Arc<MemoryStorage>, plan: Plan) -> SessionStore {
  let sessions = SessionStore::new(storage);
  sessions
    .save(&Session {
      account: Some(Account {
        user_id: "u1".to_string(),
        email: Some("ada@example.com".to_string()),
        plan,
      }),
      access_token: Some("secret".to_string()),
    })
    .await
    .unwrap();
  sessions
}

#[tokio::test]
async fn test_create_then_update_appends_two_entries() {
  let store = LocalStore::open(Arc::new(MemoryStorage::new())).await.unwrap();
  let workflows = store.workflows();

  let mut wf = workflows.create(workflow("wf")).await.unwrap();
  wf.name = "Renamed".to_string();
  workflows.update(wf).await.unwrap();

  let outbox = workflows.outbox();
  assert_eq!(outbox.len(), 2);
  assert!(outbox.iter().all(|e| e.workflow_id == "wf"));
  assert_eq!(outbox[0].action, OutboxAction::Create);
  assert_eq!(outbox[1].action, OutboxAction::Update);
  assert_eq!(workflows.get("wf").unwrap().name, "Renamed");
}

#[tokio::test]
async fn test_workflow_mutations_validate_ids() {
  let store = LocalStore::open(Arc::new(MemoryStorage::new())).await.unwrap();
  let workflows = store.workflows();
  workflows.create(workflow("wf")).await.unwrap();

  assert!(matches!(
    workflows.create(workflow("wf")).await,
    Err(StoreError::Duplicate(_))
  ));
  assert!(matches!(
    workflows.update(workflow("missing")).await,
    Err(StoreError::NotFound(_))
  ));
  assert!(matches!(workflows.delete("missing").await, Err(StoreError::NotFound(_))));

  let disabled = workflows.set_enabled("wf", false).await.unwrap();
  assert!(!disabled.enabled);
  workflows.delete("wf").await.unwrap();
  assert!(workflows.list().is_empty());

  let actions: Vec<OutboxAction> = workflows.outbox().iter().map(|e| e.action).collect();
  assert_eq!(
    actions,
    vec![OutboxAction::Create, OutboxAction::Update, OutboxAction::Delete]
  );
  assert!(workflows.outbox()[2].workflow.is_none());
}

#[tokio::test]
async fn test_sync_pushes_and_drains_outbox() {
  let storage = Arc::new(MemoryStorage::new());
  let store = LocalStore::open(storage.clone()).await.unwrap();
  let remote = Arc::new(FakeRemote::default());
  let reconciler = SyncReconciler::new(&store, signed_in(storage, Plan::Pro).await, remote.clone());

  let workflows = store.workflows();
  let mut wf = workflows.create(workflow("wf")).await.unwrap();
  wf.name = "Edited".to_string();
  workflows.update(wf).await.unwrap();
  workflows.create(workflow("doomed")).await.unwrap();
  workflows.delete("doomed").await.unwrap();

  let outcome = reconciler.sync().await.unwrap();

  let SyncOutcome::Synced(report) = outcome else {
    panic!("sync skipped");
  };
  assert_eq!(report.pushed_updates, 1);
  assert_eq!(report.pushed_deletes, 1);
  assert_eq!(report.permanently_deleted, vec!["doomed"]);

  let pushes = remote.pushes();
  assert_eq!(pushes.len(), 1);
  assert_eq!(pushes[0].updated[0].name, "Edited");
  assert!(workflows.outbox().is_empty());
  assert_eq!(reconciler.status(), SyncStatus::Success);
  assert!(store.sync_state().last_synced_at.is_some());
}

#[tokio::test]
async fn test_sync_pulls_newer_remote_and_tracks_server_time() {
  let storage = Arc::new(MemoryStorage::new());
  let store = LocalStore::open(storage.clone()).await.unwrap();
  let remote = Arc::new(FakeRemote::default());
  let reconciler = SyncReconciler::new(&store, signed_in(storage, Plan::Team).await, remote.clone());

  let local = store.workflows().create(workflow("wf")).await.unwrap();
  let mut newer = workflow("wf");
  newer.name = "From another device".to_string();
  *remote.pull.lock().unwrap() = Some(PullResponse {
    server_time: 5_000,
    updated: vec![RemoteWorkflow {
      workflow: newer,
      updated_at: local.modified_at + 1_000,
    }],
    deleted: vec![],
  });

  reconciler.sync().await.unwrap();
  reconciler.sync().await.unwrap();

  assert_eq!(store.workflows().get("wf").unwrap().name, "From another device");
  assert!(remote.pushes().is_empty());
  assert_eq!(*remote.since.lock().unwrap(), vec![None, Some(5_000)]);
}

#[tokio::test]
async fn test_failed_push_keeps_outbox_and_reports_error() {
  let storage = Arc::new(MemoryStorage::new());
  let store = LocalStore::open(storage.clone()).await.unwrap();
  let remote = Arc::new(FakeRemote::default());
  let reconciler = SyncReconciler::new(&store, signed_in(storage, Plan::Pro).await, remote.clone());

  store.workflows().create(workflow("wf")).await.unwrap();
  *remote.fail_push.lock().unwrap() = true;

  let err = reconciler.sync().await.unwrap_err();
  assert!(matches!(err, StoreError::Remote(_)));
  assert_eq!(reconciler.status(), SyncStatus::Error);
  assert_eq!(
    store.sync_state().error.as_deref(),
    Some("remote error: 503 Service Unavailable")
  );
  assert_eq!(store.workflows().outbox().len(), 1);

  *remote.fail_push.lock().unwrap() = false;
  reconciler.sync().await.unwrap();
  assert!(store.workflows().outbox().is_empty());
  assert_eq!(store.sync_state().error, None);
}

#[tokio::test]
async fn test_edits_during_overlapping_syncs_are_not_lost() {
  let storage = Arc::new(MemoryStorage::new());
  let store = LocalStore::open(storage.clone()).await.unwrap();
  let remote = Arc::new(FakeRemote::default());
  let reconciler = Arc::new(SyncReconciler::new(
    &store,
    signed_in(storage, Plan::Pro).await,
    remote.clone(),
  ));

  let workflows = store.workflows();
  workflows.create(workflow("a")).await.unwrap();
  workflows.create(workflow("b")).await.unwrap();
  remote.hold_push.store(true, Ordering::SeqCst);

  let first = tokio::spawn({
    let reconciler = reconciler.clone();
    async move { reconciler.sync().await }
  });
  remote.push_started.notified().await;

  let second = tokio::spawn({
    let reconciler = reconciler.clone();
    async move { reconciler.sync().await }
  });
  tokio::time::sleep(Duration::from_millis(20)).await;
  workflows.create(workflow("c")).await.unwrap();
  remote.release_push.notify_one();

  first.await.unwrap().unwrap();
  second.await.unwrap().unwrap();

  let pushed: Vec<Vec<String>> = remote
    .pushes()
    .iter()
    .map(|p| p.updated.iter().map(|w| w.id.clone()).collect())
    .collect();
  assert_eq!(pushed, vec![vec!["a", "b"], vec!["c"]]);
  assert!(workflows.outbox().is_empty());
}

#[tokio::test]
async fn test_free_or_absent_plan_skips_sync() {
  let storage = Arc::new(MemoryStorage::new());
  let store = LocalStore::open(storage.clone()).await.unwrap();
  store.workflows().create(workflow("wf")).await.unwrap();
  let remote = Arc::new(FakeRemote::default());

  let anonymous = SyncReconciler::new(&store, SessionStore::new(storage.clone()), remote.clone());
  assert_eq!(anonymous.sync().await.unwrap(), SyncOutcome::Skipped);

  let free = SyncReconciler::new(&store, signed_in(storage, Plan::Free).await, remote.clone());
  assert_eq!(free.sync().await.unwrap(), SyncOutcome::Skipped);

  assert!(remote.since.lock().unwrap().is_empty());
  assert_eq!(store.workflows().outbox().len(), 1);
  assert_eq!(store.sync_state().status, SyncStatus::Idle);
}

#[tokio::test]
async fn test_state_survives_reopen_from_disk() {
  let dir = tempfile::tempdir().unwrap();
  {
    let store = LocalStore::open(Arc::new(JsonFileStorage::new(dir.path()))).await.unwrap();
    store.workflows().create(workflow("wf")).await.unwrap();
  }

  let reopened = LocalStore::open(Arc::new(JsonFileStorage::new(dir.path()))).await.unwrap();
  assert_eq!(reopened.workflows().list().len(), 1);
  assert_eq!(reopened.workflows().outbox().len(), 1);
}

#[tokio::test]
async fn test_watch_rehydrates_on_change_from_another_context() {
  let storage = Arc::new(MemoryStorage::new());
  let designer = LocalStore::open(storage.clone()).await.unwrap();
  let page = LocalStore::open(storage).await.unwrap();
  let cancel = CancellationToken::new();
  let watcher = page.watch(cancel.clone());

  designer.workflows().create(workflow("wf")).await.unwrap();

  let seen = tokio::time::timeout(Duration::from_secs(2), async {
    while page.workflows().get("wf").is_none() {
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
  })
  .await;
  assert!(seen.is_ok());

  cancel.cancel();
  watcher.await.unwrap();
}

#[tokio::test]
async fn test_credentials_are_validated_and_unique() {
  let store = LocalStore::open(Arc::new(MemoryStorage::new())).await.unwrap();
  let credentials: CredentialStore = store.credentials();

  let added = credentials
    .add("GitHub", "bearer-token", None, config(json!({ "token": "ghp_x" })))
    .await
    .unwrap();
  assert_eq!(added.id, credential_id("bearer-token", "github"));
  assert!(credentials.exists("bearer-token", "GITHUB"));

  assert!(matches!(
    credentials
      .add("github", "bearer-token", None, config(json!({ "token": "other" })))
      .await,
    Err(StoreError::Duplicate(_))
  ));
  assert!(matches!(
    credentials.add("x", "oauth", None, Map::new()).await,
    Err(StoreError::UnknownCredentialType(_))
  ));
  match credentials
    .add("intranet", "basic-auth", None, config(json!({ "username": "ada" })))
    .await
  {
    Err(StoreError::InvalidCredential(errors)) => {
      assert_eq!(errors.get("password"), Some("is required"))
    }
    other => panic!("unexpected: {:?}", other),
  }

  let api = credentials
    .add("Maps", "api-key", Some("geo".to_string()), config(json!({ "apiKey": "k" })))
    .await
    .unwrap();
  assert_eq!(api.config["headerName"], "X-API-Key");

  let lookup: &dyn CredentialLookup = &credentials;
  assert_eq!(lookup.credential(&added.id).unwrap().config["token"], "ghp_x");

  let updated = credentials
    .update(&added.id, config(json!({ "token": "ghp_y" })), None)
    .await
    .unwrap();
  assert_eq!(updated.config["token"], "ghp_y");

  credentials.remove(&added.id).await.unwrap();
  assert!(lookup.credential(&added.id).is_none());
  assert_eq!(credentials.list().len(), 1);
  assert!(store.snapshot().workflows.is_empty());
}
