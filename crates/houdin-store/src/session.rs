use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::storage::{SESSION_STORE_NAME, StateStorage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
  #[default]
  Free,
  Pro,
  Team,
  /// A plan this build does not know; treated as free.
  #[serde(other)]
  Unknown,
}

impl Plan {
  pub fn can_sync(self) -> bool {
    matches!(self, Plan::Pro | Plan::Team)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
  pub user_id: String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub plan: Plan,
}

/// The `houdin-session` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
  pub account: Option<Account>,
  /// Bearer token for the remote API.
  pub access_token: Option<String>,
}

impl Session {
  /// Whether this session may use remote sync.
  pub fn can_sync(&self) -> bool {
    self.account.as_ref().is_some_and(|a| a.plan.can_sync()) && self.access_token.is_some()
  }
}

/// Account identity, kept apart from workflow state.
#[derive(Clone)]
pub struct SessionStore {
  storage: Arc<dyn StateStorage>,
}

impl SessionStore {
  pub fn new(storage: Arc<dyn StateStorage>) -> Self {
    Self { storage }
  }

  pub async fn load(&self) -> Result<Session, StoreError> {
    match self.storage.get(SESSION_STORE_NAME).await? {
      Some(value) => Ok(serde_json::from_value(value)?),
      None => Ok(Session::default()),
    }
  }

  pub async fn save(&self, session: &Session) -> Result<(), StoreError> {
    self
      .storage
      .set(SESSION_STORE_NAME, &serde_json::to_value(session)?)
      .await
  }

  /// Sign out.
  pub async fn clear(&self) -> Result<(), StoreError> {
    self.storage.remove(SESSION_STORE_NAME).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStorage;
  use serde_json::json;

  #[test]
  fn test_unknown_plan_cannot_sync() {
    let account: Account =
      serde_json::from_value(json!({ "userId": "u1", "plan": "enterprise-trial" })).unwrap();
    assert_eq!(account.plan, Plan::Unknown);
    assert!(!account.plan.can_sync());
  }

  #[tokio::test]
  async fn test_session_round_trip() {
    let store = SessionStore::new(Arc::new(MemoryStorage::new()));
    assert!(!store.load().await.unwrap().can_sync());

    let session = Session {
      account: Some(Account {
        user_id: "u1".to_string(),
        email: None,
        plan: Plan::Pro,
      }),
      access_token: Some("token".to_string()),
    };
    store.save(&session).await.unwrap();
    assert!(store.load().await.unwrap().can_sync());

    store.clear().await.unwrap();
    assert_eq!(store.load().await.unwrap(), Session::default());
  }
}
