//! Remote authority protocol.
//!
//! The authority accepts one change at a time and answers either `applied`
//! or `superseded` together with the record it holds, which is newer than
//! the pushed one.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use turath_record::{ArtifactRecord, MediaKind, MediaRef, Millis};

use crate::error::StoreError;
use crate::models::ChangeOperation;

/// Sync-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The remote could not be reached at all.
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    #[error("Push timed out after {0:?}")]
    Timeout(Duration),

    /// The remote answered and refused the change.
    #[error("Remote rejected change: {0}")]
    Rejected(String),

    /// The remote answered something that is not part of the protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One ledger entry as sent to the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEnvelope {
    pub seq: i64,
    pub record_id: String,
    pub operation: ChangeOperation,
    /// Current record for create/update; last known state for delete.
    pub record: Option<ArtifactRecord>,
    pub recorded_at: Millis,
}

/// Remote answer to a pushed change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PushAck {
    Applied,
    Superseded { record: ArtifactRecord },
}

#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Cheap reachability probe.
    async fn health(&self) -> Result<(), SyncError>;

    async fn push_change(&self, change: &ChangeEnvelope) -> Result<PushAck, SyncError>;

    async fn upload_media(
        &self,
        reference: &MediaRef,
        kind: MediaKind,
        bytes: Vec<u8>,
    ) -> Result<(), SyncError>;
}

/// HTTP JSON client for the remote authority.
#[derive(Clone)]
pub struct HttpRemote {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpRemote {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl RemoteAuthority for HttpRemote {
    async fn health(&self) -> Result<(), SyncError> {
        let agent = self.agent.clone();
        let url = self.url("health");
        run_blocking(move || agent.get(&url).call().map(|_| ()).map_err(classify)).await
    }

    async fn push_change(&self, change: &ChangeEnvelope) -> Result<PushAck, SyncError> {
        let agent = self.agent.clone();
        let url = self.url("changes");
        let body = serde_json::to_value(change)
            .map_err(|e| SyncError::Protocol(format!("encode change: {e}")))?;
        run_blocking(move || {
            let response = agent.post(&url).send_json(body).map_err(classify)?;
            response
                .into_json::<PushAck>()
                .map_err(|e| SyncError::Protocol(format!("decode acknowledgement: {e}")))
        })
        .await
    }

    async fn upload_media(
        &self,
        reference: &MediaRef,
        kind: MediaKind,
        bytes: Vec<u8>,
    ) -> Result<(), SyncError> {
        let agent = self.agent.clone();
        let url = self.url(&format!("media/{reference}"));
        run_blocking(move || {
            agent
                .put(&url)
                .set("Content-Type", kind.default_mime())
                .set("X-Media-Kind", kind.as_str())
                .send_bytes(&bytes)
                .map(|_| ())
                .map_err(classify)
        })
        .await
    }
}

/// ureq is blocking; keep it off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, SyncError>
where
    F: FnOnce() -> Result<T, SyncError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::Protocol(format!("remote call aborted: {e}")))?
}

fn classify(err: ureq::Error) -> SyncError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            SyncError::Rejected(format!("HTTP {code}: {body}"))
        }
        ureq::Error::Transport(transport) => SyncError::Unreachable(transport.to_string()),
    }
}
