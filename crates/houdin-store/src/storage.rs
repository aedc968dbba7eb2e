use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::StoreError;

/// Document holding workflows, outbox, credentials, and sync status.
pub const STORE_NAME: &str = "houdin-store";

/// Document holding the signed-in account.
pub const SESSION_STORE_NAME: &str = "houdin-session";

/// A named document was written or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
  pub name: String,
}

/// Key-value persistence for named JSON documents.
#[async_trait]
pub trait StateStorage: Send + Sync {
  async fn get(&self, name: &str) -> Result<Option<Value>, StoreError>;

  async fn set(&self, name: &str, value: &Value) -> Result<(), StoreError>;

  async fn remove(&self, name: &str) -> Result<(), StoreError>;

  /// Change notifications for every document, from any writer.
  fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MemoryStorage {
  documents: Mutex<HashMap<String, Value>>,
  changes: broadcast::Sender<StorageChange>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    let (changes, _) = broadcast::channel(32);
    Self {
      documents: Mutex::new(HashMap::new()),
      changes,
    }
  }

  fn announce(&self, name: &str) {
    // No subscribers is fine
    let _ = self.changes.send(StorageChange {
      name: name.to_string(),
    });
  }
}

impl Default for MemoryStorage {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl StateStorage for MemoryStorage {
  async fn get(&self, name: &str) -> Result<Option<Value>, StoreError> {
    Ok(lock(&self.documents).get(name).cloned())
  }

  async fn set(&self, name: &str, value: &Value) -> Result<(), StoreError> {
    lock(&self.documents).insert(name.to_string(), value.clone());
    self.announce(name);
    Ok(())
  }

  async fn remove(&self, name: &str) -> Result<(), StoreError> {
    lock(&self.documents).remove(name);
    self.announce(name);
    Ok(())
  }

  fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
    self.changes.subscribe()
  }
}

/// One `<name>.json` file per document under a directory.
///
/// Writes go to a temporary file that is renamed into place, so readers never
/// see a half-written document.
pub struct JsonFileStorage {
  dir: PathBuf,
  changes: broadcast::Sender<StorageChange>,
}

impl JsonFileStorage {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    let (changes, _) = broadcast::channel(32);
    Self {
      dir: dir.into(),
      changes,
    }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn path(&self, name: &str) -> PathBuf {
    self.dir.join(format!("{}.json", name))
  }

  fn announce(&self, name: &str) {
    let _ = self.changes.send(StorageChange {
      name: name.to_string(),
    });
  }
}

#[async_trait]
impl StateStorage for JsonFileStorage {
  async fn get(&self, name: &str) -> Result<Option<Value>, StoreError> {
    match tokio::fs::read(self.path(name)).await {
      Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  async fn set(&self, name: &str, value: &Value) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(&self.dir).await?;
    let path = self.path(name);
    let tmp = self.dir.join(format!(".{}.json.tmp", name));

    tokio::fs::write(&tmp, serde_json::to_vec_pretty(value)?).await?;
    tokio::fs::rename(&tmp, &path).await?;

    debug!(path = %path.display(), "document_written");
    self.announce(name);
    Ok(())
  }

  async fn remove(&self, name: &str) -> Result<(), StoreError> {
    match tokio::fs::remove_file(self.path(name)).await {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => return Err(e.into()),
    }
    self.announce(name);
    Ok(())
  }

  fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
    self.changes.subscribe()
  }
}
