use std::collections::BTreeMap;
use std::sync::Arc;

use houdin_config::{Credential, CredentialLookup, credential_id, now_millis};
use houdin_registry::{ConfigSchema, PropertyDescriptor, schema};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::StoreError;
use crate::state::SharedState;

/// Config schemas of the supported credential types, keyed by type.
pub fn credential_schemas() -> BTreeMap<&'static str, ConfigSchema> {
  BTreeMap::from([
    (
      "bearer-token",
      ConfigSchema::new().property("token", PropertyDescriptor::text("Token").required()),
    ),
    (
      "basic-auth",
      ConfigSchema::new()
        .property("username", PropertyDescriptor::text("Username").required())
        .property("password", PropertyDescriptor::text("Password").required()),
    ),
    (
      "api-key",
      ConfigSchema::new()
        .property("apiKey", PropertyDescriptor::text("API key").required())
        .property(
          "headerName",
          PropertyDescriptor::text("Header name").default_value("X-API-Key"),
        ),
    ),
  ])
}

/// Local-only secrets. Never part of the sync payload.
#[derive(Clone)]
pub struct CredentialStore {
  shared: Arc<SharedState>,
  schemas: Arc<BTreeMap<&'static str, ConfigSchema>>,
}

impl CredentialStore {
  pub(crate) fn new(shared: Arc<SharedState>) -> Self {
    Self {
      shared,
      schemas: Arc::new(credential_schemas()),
    }
  }

  pub fn list(&self) -> Vec<Credential> {
    self.shared.read(|s| s.credentials.clone())
  }

  pub fn get(&self, id: &str) -> Option<Credential> {
    self
      .shared
      .read(|s| s.credentials.iter().find(|c| c.id == id).cloned())
  }

  /// Whether `(type, name)` is already taken.
  pub fn exists(&self, credential_type: &str, name: &str) -> bool {
    self.get(&credential_id(credential_type, name)).is_some()
  }

  fn checked_config(&self, credential_type: &str, config: &Map<String, Value>) -> Result<Map<String, Value>, StoreError> {
    let schema = self
      .schemas
      .get(credential_type)
      .ok_or_else(|| StoreError::UnknownCredentialType(credential_type.to_string()))?;
    let config = schema::normalize(schema, config);
    schema::validate(schema, &config)?;
    Ok(config)
  }

  pub async fn add(
    &self,
    name: &str,
    credential_type: &str,
    description: Option<String>,
    config: Map<String, Value>,
  ) -> Result<Credential, StoreError> {
    let config = self.checked_config(credential_type, &config)?;
    let now = now_millis();
    let credential = Credential {
      id: credential_id(credential_type, name),
      name: name.to_string(),
      credential_type: credential_type.to_string(),
      description,
      config,
      created_at: now,
      updated_at: now,
    };

    let added = self
      .shared
      .update(|state| {
        if state.credentials.iter().any(|c| c.id == credential.id) {
          return Err(StoreError::Duplicate(format!(
            "{} credential named '{}'",
            credential.credential_type, credential.name
          )));
        }
        state.credentials.push(credential.clone());
        Ok(credential)
      })
      .await?;

    info!(credential_id = %added.id, credential_type = %added.credential_type, "credential_added");
    Ok(added)
  }

  /// Replace the config (and optionally the description) of a credential.
  pub async fn update(
    &self,
    id: &str,
    config: Map<String, Value>,
    description: Option<String>,
  ) -> Result<Credential, StoreError> {
    let existing = self
      .get(id)
      .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    let config = self.checked_config(&existing.credential_type, &config)?;

    self
      .shared
      .update(|state| {
        let slot = state
          .credentials
          .iter_mut()
          .find(|c| c.id == id)
          .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        slot.config = config;
        if description.is_some() {
          slot.description = description;
        }
        slot.updated_at = now_millis();
        Ok(slot.clone())
      })
      .await
  }

  pub async fn remove(&self, id: &str) -> Result<(), StoreError> {
    self
      .shared
      .update(|state| {
        let before = state.credentials.len();
        state.credentials.retain(|c| c.id != id);
        if state.credentials.len() == before {
          Err(StoreError::NotFound(id.to_string()))
        } else {
          Ok(())
        }
      })
      .await?;
    info!(credential_id = %id, "credential_removed");
    Ok(())
  }
}

impl CredentialLookup for CredentialStore {
  fn credential(&self, id: &str) -> Option<Credential> {
    self.get(id)
  }
}
