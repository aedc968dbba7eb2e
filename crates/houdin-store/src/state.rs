use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use houdin_config::{Credential, OutboxEntry, WorkflowDefinition};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::credentials::CredentialStore;
use crate::error::StoreError;
use crate::storage::{STORE_NAME, StateStorage};
use crate::workflows::WorkflowStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
  #[default]
  Idle,
  Syncing,
  Success,
  Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncState {
  pub status: SyncStatus,
  /// `serverTime` of the last successful pull; the next pull asks for
  /// changes since then.
  pub last_server_time: Option<i64>,
  pub last_synced_at: Option<DateTime<Utc>>,
  pub error: Option<String>,
}

/// The `houdin-store` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
  pub workflows: Vec<WorkflowDefinition>,
  pub outbox: Vec<OutboxEntry>,
  pub credentials: Vec<Credential>,
  pub sync: SyncState,
}

/// In-memory snapshot of the document plus the storage behind it.
///
/// Reads are served from the snapshot. Writes are serialized, persisted, and
/// only then made visible.
pub(crate) struct SharedState {
  storage: Arc<dyn StateStorage>,
  snapshot: RwLock<PersistedState>,
  writer: Mutex<()>,
}

impl SharedState {
  async fn load(storage: Arc<dyn StateStorage>) -> Result<Self, StoreError> {
    let state = read_document(storage.as_ref()).await?;
    Ok(Self {
      storage,
      snapshot: RwLock::new(state),
      writer: Mutex::new(()),
    })
  }

  pub(crate) fn read<R>(&self, f: impl FnOnce(&PersistedState) -> R) -> R {
    let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
    f(&guard)
  }

  /// Apply `f` to a copy of the state and persist it. Nothing changes when
  /// `f` or the write fails.
  pub(crate) async fn update<R>(
    &self,
    f: impl FnOnce(&mut PersistedState) -> Result<R, StoreError>,
  ) -> Result<R, StoreError> {
    let _writer = self.writer.lock().await;

    let mut next = self.read(Clone::clone);
    let result = f(&mut next)?;
    self
      .storage
      .set(STORE_NAME, &serde_json::to_value(&next)?)
      .await?;

    *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;
    Ok(result)
  }

  pub(crate) async fn rehydrate(&self) -> Result<(), StoreError> {
    let _writer = self.writer.lock().await;
    let state = read_document(self.storage.as_ref()).await?;
    *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = state;
    Ok(())
  }
}

async fn read_document(storage: &dyn StateStorage) -> Result<PersistedState, StoreError> {
  match storage.get(STORE_NAME).await? {
    Some(value) => Ok(serde_json::from_value(value)?),
    None => Ok(PersistedState::default()),
  }
}

/// Entry point to local state.
#[derive(Clone)]
pub struct LocalStore {
  shared: Arc<SharedState>,
}

impl LocalStore {
  /// Load the `houdin-store` document, or start empty.
  pub async fn open(storage: Arc<dyn StateStorage>) -> Result<Self, StoreError> {
    let shared = SharedState::load(storage).await?;
    Ok(Self {
      shared: Arc::new(shared),
    })
  }

  pub fn workflows(&self) -> WorkflowStore {
    WorkflowStore::new(Arc::clone(&self.shared))
  }

  pub fn credentials(&self) -> CredentialStore {
    CredentialStore::new(Arc::clone(&self.shared))
  }

  pub fn sync_state(&self) -> SyncState {
    self.shared.read(|s| s.sync.clone())
  }

  pub fn snapshot(&self) -> PersistedState {
    self.shared.read(Clone::clone)
  }

  /// Reload from storage, picking up writes made by another context.
  pub async fn rehydrate(&self) -> Result<(), StoreError> {
    self.shared.rehydrate().await
  }

  /// Rehydrate whenever the document changes until `cancel` fires.
  pub fn watch(&self, cancel: CancellationToken) -> JoinHandle<()> {
    let shared = Arc::clone(&self.shared);
    let mut changes = shared.storage.subscribe();

    tokio::spawn(async move {
      loop {
        let change = tokio::select! {
          _ = cancel.cancelled() => break,
          change = changes.recv() => change,
        };

        match change {
          Ok(change) if change.name == STORE_NAME => {
            if let Err(e) = shared.rehydrate().await {
              warn!(error = %e, "rehydrate_failed");
            } else {
              debug!("store_rehydrated");
            }
          }
          Ok(_) => {}
          Err(RecvError::Lagged(skipped)) => {
            warn!(skipped, "storage_changes_lagged");
            if let Err(e) = shared.rehydrate().await {
              warn!(error = %e, "rehydrate_failed");
            }
          }
          Err(RecvError::Closed) => break,
        }
      }
      info!("store_watch_stopped");
    })
  }

  pub(crate) fn shared(&self) -> Arc<SharedState> {
    Arc::clone(&self.shared)
  }
}
