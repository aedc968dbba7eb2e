use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A stored secret-bearing configuration (API key, login, token).
///
/// Credentials are local-only and never leave the CredentialsSlice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
  pub id: String,
  pub name: String,
  #[serde(rename = "type")]
  pub credential_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub config: serde_json::Map<String, serde_json::Value>,
  pub created_at: i64,
  pub updated_at: i64,
}

/// Deterministic credential id for a `(type, name)` pair.
///
/// The name is lowercased, so `"My Key"` and `"my key"` of the same type
/// collide on purpose and duplicates are detectable before insert.
pub fn credential_id(credential_type: &str, name: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(credential_type.as_bytes());
  hasher.update(b":");
  hasher.update(name.to_lowercase().as_bytes());
  let digest = hasher.finalize();

  let short: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
  format!("credential-{}", short)
}

/// Read access to stored credentials, handed to actions that authenticate.
pub trait CredentialLookup: Send + Sync {
  fn credential(&self, id: &str) -> Option<Credential>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_credential_id_is_stable() {
    let a = credential_id("bearer-token", "GitHub");
    let b = credential_id("bearer-token", "github");
    assert_eq!(a, b);
    assert!(a.starts_with("credential-"));
    assert_eq!(a.len(), "credential-".len() + 16);
  }

  #[test]
  fn test_credential_id_distinguishes_pairs() {
    let ids = [
      credential_id("bearer-token", "github"),
      credential_id("api-key", "github"),
      credential_id("bearer-token", "gitlab"),
      credential_id("basic-auth", "intranet"),
    ];
    for (i, a) in ids.iter().enumerate() {
      for b in ids.iter().skip(i + 1) {
        assert_ne!(a, b);
      }
    }
  }
}
