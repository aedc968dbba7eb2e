use std::time::Duration;

use async_trait::async_trait;
use houdin_config::{PullResponse, PushRequest, PushResponse};
use tracing::debug;

use crate::error::StoreError;

/// The remote workflow store.
#[async_trait]
pub trait RemoteApi: Send + Sync {
  /// Changes since `since` (a previous `serverTime`), or everything.
  async fn pull(&self, token: &str, since: Option<i64>) -> Result<PullResponse, StoreError>;

  async fn push(&self, token: &str, request: &PushRequest) -> Result<PushResponse, StoreError>;
}

/// [`RemoteApi`] over HTTP.
///
/// - `GET  {base}/workflows/sync?since=<serverTime>`
/// - `POST {base}/workflows/sync`
pub struct HttpRemoteApi {
  client: reqwest::Client,
  base_url: String,
}

impl HttpRemoteApi {
  pub fn new(base_url: impl Into<String>) -> Result<Self, StoreError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self {
      client,
      base_url: base_url.into().trim_end_matches('/').to_string(),
    })
  }

  fn endpoint(&self) -> String {
    format!("{}/workflows/sync", self.base_url)
  }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
  async fn pull(&self, token: &str, since: Option<i64>) -> Result<PullResponse, StoreError> {
    let mut request = self.client.get(self.endpoint()).bearer_auth(token);
    if let Some(since) = since {
      request = request.query(&[("since", since)]);
    }
    debug!(since = ?since, "sync_pull");

    let response = request.send().await?.error_for_status()?;
    Ok(response.json().await?)
  }

  async fn push(&self, token: &str, request: &PushRequest) -> Result<PushResponse, StoreError> {
    debug!(
      updated = request.updated.len(),
      deleted = request.deleted.len(),
      "sync_push"
    );
    let response = self
      .client
      .post(self.endpoint())
      .bearer_auth(token)
      .json(request)
      .send()
      .await?
      .error_for_status()?;
    Ok(response.json().await?)
  }
}
