//! Sync coordinator: drains the pending-change ledger to the remote.
//!
//! Entries are pushed in ledger order. A failed or deferred entry blocks the
//! later entries of the same record only, so an update is never applied
//! remotely after a delete that was recorded later. Losing connectivity
//! mid-pass stops the pass without charging an attempt to anyone.
//!
//! A pass walks the whole ledger in `batch_size` pages. It ends `Idle` only
//! when the ledger is empty; entries left behind keep the state `Syncing`.

use std::collections::HashSet;
use std::sync::Arc;

use rand::thread_rng;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use turath_record::{ArtifactRecord, Millis};

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::StoreError;
use crate::media::MediaStore;
use crate::models::{ChangeOperation, NewSyncConflict, PendingChange};
use crate::store::LocalStore;
use crate::sync::backoff::Backoff;
use crate::sync::remote::{ChangeEnvelope, PushAck, RemoteAuthority, SyncError};

/// Connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    Offline,
    Syncing,
    Idle,
}

/// A ledger entry that failed this pass and was scheduled for retry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushFailure {
    pub seq: i64,
    pub record_id: String,
    pub error: String,
    pub next_attempt_at: Millis,
}

/// Outcome of one push pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    /// Entries acknowledged and removed from the ledger.
    pub applied: usize,
    /// Entries resolved in favour of a newer remote record.
    pub superseded: usize,
    /// Entries skipped for backoff or because an earlier entry of the same record is stuck.
    pub deferred: usize,
    pub failed: Vec<PushFailure>,
    pub went_offline: bool,
}

/// Snapshot for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,
    pub pending: i64,
    pub conflicts: usize,
}

pub struct SyncCoordinator {
    store: LocalStore,
    media: Arc<dyn MediaStore>,
    remote: Arc<dyn RemoteAuthority>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    backoff: Backoff,
    state: watch::Sender<SyncState>,
    pass_lock: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(
        store: LocalStore,
        media: Arc<dyn MediaStore>,
        remote: Arc<dyn RemoteAuthority>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        let backoff = Backoff::new(config.backoff_base_ms, config.backoff_max_ms);
        let (state, _) = watch::channel(SyncState::Offline);
        Self {
            store,
            media,
            remote,
            clock,
            config,
            backoff,
            state,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub async fn status(&self) -> Result<SyncStatus, StoreError> {
        Ok(SyncStatus {
            state: self.state(),
            pending: self.store.pending_count().await?,
            conflicts: self.store.conflicts().await?.len(),
        })
    }

    fn set_state(&self, next: SyncState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::info!(op = "sync.state", from = ?previous, to = ?next);
        }
    }

    /// Pushes ledger entries to the remote, oldest first.
    pub async fn push_pending(&self) -> Result<PushReport, SyncError> {
        let _pass = self.pass_lock.lock().await;
        let mut report = PushReport::default();

        if let Err(err) = self.probe().await {
            tracing::debug!(error = %err, "Remote not reachable");
            self.set_state(SyncState::Offline);
            report.went_offline = true;
            return Ok(report);
        }
        self.set_state(SyncState::Syncing);

        let now = self.clock.now_millis();
        let mut blocked: HashSet<String> = HashSet::new();
        let mut last_seq = 0;

        loop {
            let entries = self
                .store
                .pending_changes_after(last_seq, self.config.batch_size)
                .await?;
            let Some(last) = entries.last() else {
                break;
            };
            last_seq = last.seq;
            if self.push_batch(entries, now, &mut blocked, &mut report).await? {
                return Ok(report);
            }
        }

        let pending = self.store.pending_count().await?;
        if pending == 0 {
            self.set_state(SyncState::Idle);
        }
        if report.applied + report.superseded > 0 || !report.failed.is_empty() {
            tracing::info!(
                op = "sync.push",
                applied = report.applied,
                superseded = report.superseded,
                deferred = report.deferred,
                failed = report.failed.len(),
                pending,
                "Push pass finished"
            );
        }
        Ok(report)
    }

    /// Pushes one page of the ledger. Returns true when connectivity drops.
    async fn push_batch(
        &self,
        entries: Vec<PendingChange>,
        now: Millis,
        blocked: &mut HashSet<String>,
        report: &mut PushReport,
    ) -> Result<bool, SyncError> {
        for entry in entries {
            if blocked.contains(&entry.record_id) || entry.is_deferred(now) {
                blocked.insert(entry.record_id.clone());
                report.deferred += 1;
                continue;
            }

            match self.push_one(&entry).await {
                Ok((_, PushAck::Applied)) => {
                    self.store.acknowledge(&entry).await?;
                    report.applied += 1;
                }
                Ok((pushed, PushAck::Superseded { record })) => {
                    match self.resolve_superseded(&entry, pushed.as_ref(), &record).await {
                        Ok(()) => report.superseded += 1,
                        Err(SyncError::Store(err)) => return Err(err.into()),
                        Err(err) => {
                            let failure = self.schedule_retry(&entry, &err, now).await?;
                            blocked.insert(entry.record_id.clone());
                            report.failed.push(failure);
                        }
                    }
                }
                Err(SyncError::Unreachable(reason)) => {
                    tracing::warn!(op = "sync.offline", seq = entry.seq, reason = %reason, "Lost connectivity during push");
                    self.set_state(SyncState::Offline);
                    report.went_offline = true;
                    return Ok(true);
                }
                Err(SyncError::Store(err)) => return Err(err.into()),
                Err(err) => {
                    let failure = self.schedule_retry(&entry, &err, now).await?;
                    blocked.insert(entry.record_id.clone());
                    report.failed.push(failure);
                }
            }
        }
        Ok(false)
    }

    async fn probe(&self) -> Result<(), SyncError> {
        let timeout = self.config.push_timeout();
        match tokio::time::timeout(timeout, self.remote.health()).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Unreachable(format!("health check timed out after {timeout:?}"))),
        }
    }

    /// Uploads the record's media, then the change, under one deadline.
    async fn push_one(
        &self,
        entry: &PendingChange,
    ) -> Result<(Option<ArtifactRecord>, PushAck), SyncError> {
        let record = self.payload_for(entry).await?;
        let envelope = ChangeEnvelope {
            seq: entry.seq,
            record_id: entry.record_id.clone(),
            operation: entry.operation,
            record: record.clone(),
            recorded_at: entry.recorded_at,
        };

        let timeout = self.config.push_timeout();
        let push = async {
            if entry.operation != ChangeOperation::Delete {
                if let Some(record) = record.as_ref() {
                    self.upload_media(record).await?;
                }
            }
            self.remote.push_change(&envelope).await
        };
        let outcome = tokio::time::timeout(timeout, push).await;
        match outcome {
            Ok(ack) => Ok((record, ack?)),
            Err(_) => Err(SyncError::Timeout(timeout)),
        }
    }

    /// Current record for creates and updates, falling back to the entry's
    /// own snapshot once the record is tombstoned or gone.
    async fn payload_for(&self, entry: &PendingChange) -> Result<Option<ArtifactRecord>, SyncError> {
        if entry.operation != ChangeOperation::Delete {
            if let Some(row) = self.store.get_row(&entry.record_id).await? {
                if !row.is_tombstoned() {
                    return Ok(Some(row.decode()?));
                }
            }
        }
        Ok(entry.snapshot()?)
    }

    async fn upload_media(&self, record: &ArtifactRecord) -> Result<(), SyncError> {
        for reference in record.media_refs() {
            let media = Arc::clone(&self.media);
            let lookup = reference.clone();
            let loaded = tokio::task::spawn_blocking(move || {
                let meta = media.head(&lookup)?;
                let bytes = media.get(&lookup)?;
                Ok::<_, StoreError>((meta, bytes))
            })
            .await
            .map_err(|e| SyncError::Protocol(format!("media read aborted: {e}")))?;

            match loaded {
                Ok((meta, bytes)) => {
                    self.remote.upload_media(reference, meta.kind, bytes).await?;
                }
                Err(StoreError::MediaNotFound(_)) => {
                    tracing::warn!(record_id = %record.id, reference = %reference, "Referenced media missing locally, pushing record without it");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    async fn resolve_superseded(
        &self,
        entry: &PendingChange,
        pushed: Option<&ArtifactRecord>,
        remote: &ArtifactRecord,
    ) -> Result<(), SyncError> {
        let local = pushed.ok_or_else(|| {
            SyncError::Protocol(format!("superseded answer for entry {} without a pushed record", entry.seq))
        })?;
        if remote.updated_at <= local.updated_at {
            return Err(SyncError::Protocol(format!(
                "remote claims to supersede record '{}' with an older version ({} <= {})",
                entry.record_id, remote.updated_at, local.updated_at
            )));
        }
        remote
            .check()
            .map_err(|e| SyncError::Protocol(format!("remote record invalid: {e}")))?;

        let conflict = NewSyncConflict {
            record_id: entry.record_id.clone(),
            local_updated_at: local.updated_at,
            remote_updated_at: remote.updated_at,
            losing_snapshot: serde_json::to_string(local).map_err(StoreError::from)?,
        };
        self.store.adopt_remote(entry, remote, conflict).await?;
        Ok(())
    }

    async fn schedule_retry(
        &self,
        entry: &PendingChange,
        err: &SyncError,
        now: Millis,
    ) -> Result<PushFailure, SyncError> {
        let attempts = entry.attempts + 1;
        let delay = self
            .backoff
            .delay_ms(u32::try_from(attempts).unwrap_or(u32::MAX), &mut thread_rng());
        let next_attempt_at = now.saturating_add(i64::try_from(delay).unwrap_or(i64::MAX));
        let error = err.to_string();

        self.store
            .record_failure(entry.seq, attempts, next_attempt_at, &error)
            .await?;
        tracing::warn!(
            op = "sync.retry",
            seq = entry.seq,
            record_id = %entry.record_id,
            attempts,
            next_attempt_at,
            error = %error,
            "Push failed, retry scheduled"
        );

        Ok(PushFailure {
            seq: entry.seq,
            record_id: entry.record_id.clone(),
            error,
            next_attempt_at,
        })
    }

    /// Background loop: pushes on every interval tick and after local
    /// mutations, until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let changes = self.store.changes();
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(op = "sync.run", interval_ms = self.config.interval_ms, "Sync task started");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {}
                _ = changes.notified() => {}
            }
            if *shutdown.borrow() {
                break;
            }
            if let Err(err) = self.push_pending().await {
                tracing::warn!(op = "sync.push", error = %err, "Push pass failed");
            }
        }
        tracing::info!(op = "sync.run", "Sync task stopped");
    }
}
