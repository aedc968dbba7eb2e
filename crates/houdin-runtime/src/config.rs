use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Execution timeouts. Serialized as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
  /// Applied to every action unless its metadata sets `disableTimeout`.
  #[serde(with = "millis")]
  pub default_node_timeout: Duration,

  /// How long an interactive prompt waits before it counts as dismissed.
  #[serde(with = "millis")]
  pub modal_timeout: Duration,

  /// Client-side window for background bridge calls.
  #[serde(with = "millis")]
  pub bridge_timeout: Duration,

  /// Added to an action's own timeout property to form its node deadline, so
  /// the transport reports its own timeout first.
  #[serde(with = "millis")]
  pub timeout_grace: Duration,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      default_node_timeout: Duration::from_secs(30),
      modal_timeout: Duration::from_secs(5 * 60),
      bridge_timeout: Duration::from_secs(30),
      timeout_grace: Duration::from_secs(2),
    }
  }
}

mod millis {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
  }
}
