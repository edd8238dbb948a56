//! Integration tests for the sync coordinator against a scripted remote.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use turath_record::{normalize, validate, ArtifactDraft, ArtifactRecord, DraftGps, MediaKind, MediaRef};
use turath_store::models::ChangeOperation;
use turath_store::sync::{ChangeEnvelope, PushAck, RemoteAuthority, SyncError, SyncState};
use turath_store::{
    DeleteMode, FilesystemMediaStore, LocalStore, ManualClock, MediaStore, StoreError, SyncConfig,
    SyncCoordinator,
};

/// What the remote answers to the next pushed change.
enum Reply {
    Apply,
    Reject(&'static str),
    Drop,
    /// Never answers within any sensible deadline.
    Stall,
    Supersede(ArtifactRecord),
}

/// Remote authority that follows a script and records what it saw.
#[derive(Default)]
struct MockRemote {
    down: AtomicBool,
    replies: Mutex<VecDeque<Reply>>,
    /// `media:<ref>` and `<operation>:<record id>` in arrival order.
    log: Mutex<Vec<String>>,
    pushed: Mutex<Vec<ChangeEnvelope>>,
}

impl MockRemote {
    fn script(&self, replies: impl IntoIterator<Item = Reply>) {
        self.replies.lock().unwrap().extend(replies);
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn pushed(&self) -> Vec<ChangeEnvelope> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteAuthority for MockRemote {
    async fn health(&self) -> Result<(), SyncError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(SyncError::Unreachable("connection refused".to_string()));
        }
        Ok(())
    }

    async fn push_change(&self, change: &ChangeEnvelope) -> Result<PushAck, SyncError> {
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Apply);
        if matches!(reply, Reply::Drop) {
            return Err(SyncError::Unreachable("connection reset".to_string()));
        }
        if matches!(reply, Reply::Stall) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", change.operation.as_str(), change.record_id));
        self.pushed.lock().unwrap().push(change.clone());

        match reply {
            Reply::Apply | Reply::Stall => Ok(PushAck::Applied),
            Reply::Reject(reason) => Err(SyncError::Rejected(reason.to_string())),
            Reply::Supersede(record) => Ok(PushAck::Superseded { record }),
            Reply::Drop => unreachable!(),
        }
    }

    async fn upload_media(
        &self,
        reference: &MediaRef,
        _kind: MediaKind,
        _bytes: Vec<u8>,
    ) -> Result<(), SyncError> {
        self.log.lock().unwrap().push(format!("media:{reference}"));
        Ok(())
    }
}

struct Harness {
    _tmp: TempDir,
    store: LocalStore,
    media: Arc<FilesystemMediaStore>,
    clock: Arc<ManualClock>,
    remote: Arc<MockRemote>,
    sync: Arc<SyncCoordinator>,
}

async fn harness() -> Harness {
    harness_with(|_| {}).await
}

async fn harness_with(tune: impl FnOnce(&mut SyncConfig)) -> Harness {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(10_000));
    let store = LocalStore::open(&tmp.path().join("turath.sqlite"), 4, DeleteMode::Tombstone)
        .await
        .expect("Failed to open store")
        .with_clock(clock.clone());
    let media = Arc::new(FilesystemMediaStore::new(tmp.path().join("media")));
    let remote = Arc::new(MockRemote::default());
    let mut config = SyncConfig {
        enabled: true,
        remote_url: Some("http://authority.invalid".to_string()),
        backoff_base_ms: 1_000,
        backoff_max_ms: 60_000,
        ..Default::default()
    };
    tune(&mut config);
    let sync = Arc::new(SyncCoordinator::new(
        store.clone(),
        media.clone(),
        remote.clone(),
        clock.clone(),
        config,
    ));
    Harness {
        _tmp: tmp,
        store,
        media,
        clock,
        remote,
        sync,
    }
}

fn record(id: &str, inventory: &str, at: i64) -> ArtifactRecord {
    let draft = ArtifactDraft {
        id: Some(id.to_string()),
        inventory_number: Some(inventory.to_string()),
        category: Some("MATERIAL".to_string()),
        gps: Some(DraftGps {
            lat: Some(31.5),
            lng: Some(-7.9),
            location_type: Some("DISCOVERY".to_string()),
        }),
        ..Default::default()
    };
    validate(&normalize(draft, at)).unwrap()
}

#[tokio::test]
async fn test_update_is_pushed_before_later_delete() {
    let h = harness().await;
    let created = h.store.create(record("a1", "INV-1", 1000)).await.unwrap();
    let mut edited = created.clone();
    edited.notes = "cracked rim".to_string();
    edited.updated_at = 2000;
    h.store.update(edited).await.unwrap();
    h.store.delete("a1").await.unwrap();

    let report = h.sync.push_pending().await.unwrap();

    assert_eq!(report.applied, 3);
    assert_eq!(h.remote.log(), vec!["create:a1", "update:a1", "delete:a1"]);
    assert_eq!(h.sync.state(), SyncState::Idle);

    // The delete carries the last known state
    let delete = &h.remote.pushed()[2];
    assert_eq!(delete.operation, ChangeOperation::Delete);
    assert_eq!(delete.record.as_ref().unwrap().notes, "cracked rim");

    // Acknowledged delete purges the tombstone and retires the id
    assert!(h.store.get_row("a1").await.unwrap().is_none());
    assert_eq!(h.store.pending_count().await.unwrap(), 0);
    assert!(matches!(
        h.store.create(record("a1", "INV-1", 3000)).await,
        Err(StoreError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_unreachable_remote_goes_offline_without_charging_attempts() {
    let h = harness().await;
    h.store.create(record("a1", "INV-1", 1000)).await.unwrap();
    h.store.create(record("a2", "INV-2", 1000)).await.unwrap();

    h.remote.down.store(true, Ordering::SeqCst);
    let report = h.sync.push_pending().await.unwrap();
    assert!(report.went_offline);
    assert_eq!(h.sync.state(), SyncState::Offline);
    assert!(h.remote.log().is_empty());

    // Connectivity drops in the middle of a pass
    h.remote.down.store(false, Ordering::SeqCst);
    h.remote.script([Reply::Apply, Reply::Drop]);
    let report = h.sync.push_pending().await.unwrap();
    assert!(report.went_offline);
    assert_eq!(report.applied, 1);
    assert_eq!(h.sync.state(), SyncState::Offline);

    let left = h.store.pending_changes(10).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].record_id, "a2");
    assert_eq!(left[0].attempts, 0);

    let report = h.sync.push_pending().await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(h.sync.state(), SyncState::Idle);
}

#[tokio::test]
async fn test_rejected_entry_backs_off_and_blocks_its_record_only() {
    let h = harness().await;
    let created = h.store.create(record("a1", "INV-1", 1000)).await.unwrap();
    h.store.create(record("b1", "INV-2", 1000)).await.unwrap();
    let mut edited = created;
    edited.updated_at = 2000;
    h.store.update(edited).await.unwrap();

    h.remote.script([Reply::Reject("schema mismatch")]);
    let report = h.sync.push_pending().await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].record_id, "a1");
    assert_eq!(report.applied, 1);
    assert_eq!(report.deferred, 1);
    assert_eq!(h.remote.log(), vec!["create:a1", "create:b1"]);
    // Ledger not drained: still syncing, not idle
    assert_eq!(h.sync.state(), SyncState::Syncing);

    let left = h.store.pending_changes(10).await.unwrap();
    assert_eq!(left.len(), 2);
    assert_eq!(left[0].attempts, 1);
    assert!(left[0].next_attempt_at > 10_000);
    assert!(left[0].next_attempt_at <= 11_000);
    assert!(left[0].last_error.as_deref().unwrap().contains("schema mismatch"));

    // Still inside the backoff window: nothing is pushed
    let report = h.sync.push_pending().await.unwrap();
    assert_eq!(report.deferred, 2);
    assert_eq!(h.remote.log().len(), 2);

    h.clock.advance(1_000);
    let report = h.sync.push_pending().await.unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(
        h.remote.log()[2..],
        ["create:a1".to_string(), "update:a1".to_string()]
    );
    assert_eq!(h.sync.state(), SyncState::Idle);
}

#[tokio::test]
async fn test_pass_walks_every_batch_until_drained() {
    let h = harness_with(|config| config.batch_size = 2).await;
    for n in 0..5 {
        h.store
            .create(record(&format!("a{n}"), &format!("INV-{n}"), 1000))
            .await
            .unwrap();
    }

    let report = h.sync.push_pending().await.unwrap();
    assert_eq!(report.applied, 5);
    assert_eq!(h.store.pending_count().await.unwrap(), 0);
    assert_eq!(h.sync.state(), SyncState::Idle);
}

#[tokio::test]
async fn test_deferred_entry_in_later_batch_keeps_syncing() {
    let h = harness_with(|config| config.batch_size = 1).await;
    h.store.create(record("a1", "INV-1", 1000)).await.unwrap();
    h.store.create(record("b1", "INV-2", 1000)).await.unwrap();

    h.remote.script([Reply::Apply, Reply::Reject("quota")]);
    let report = h.sync.push_pending().await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].record_id, "b1");
    assert_eq!(h.sync.state(), SyncState::Syncing);
    assert_eq!(h.store.pending_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_push_past_deadline_times_out_and_backs_off() {
    let h = harness_with(|config| config.push_timeout_ms = 100).await;
    h.store.create(record("a1", "INV-1", 1000)).await.unwrap();

    h.remote.script([Reply::Stall]);
    let report = h.sync.push_pending().await.unwrap();

    assert!(!report.went_offline);
    assert_eq!(report.applied, 0);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("timed out"), "{}", report.failed[0].error);

    let left = h.store.pending_changes(10).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].attempts, 1);
    assert!(left[0].next_attempt_at > 10_000);
    assert!(left[0].next_attempt_at <= 11_000);
    assert_eq!(h.sync.state(), SyncState::Syncing);
}

#[tokio::test]
async fn test_background_task_pushes_mutations_and_stops() {
    let h = harness_with(|config| config.interval_ms = 60_000).await;
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn(Arc::clone(&h.sync).run(shutdown_rx));

    h.store.create(record("a1", "INV-1", 1000)).await.unwrap();

    let pushed = tokio::time::timeout(Duration::from_secs(5), async {
        while !h.remote.log().contains(&"create:a1".to_string()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(pushed.is_ok(), "mutation was never pushed");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("sync task did not stop")
        .unwrap();
    assert_eq!(h.store.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_superseded_change_adopts_remote_record() {
    let h = harness().await;
    let local = h.store.create(record("a1", "INV-1", 1000)).await.unwrap();

    let mut newer = local.clone();
    newer.physical_status = "restored".to_string();
    newer.updated_at = 5000;
    h.remote.script([Reply::Supersede(newer.clone())]);

    let report = h.sync.push_pending().await.unwrap();
    assert_eq!(report.superseded, 1);

    assert_eq!(h.store.get("a1").await.unwrap(), newer);
    assert_eq!(h.store.pending_count().await.unwrap(), 0);

    let conflicts = h.store.conflicts().await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].record_id, "a1");
    assert_eq!(conflicts[0].local_updated_at, 1000);
    assert_eq!(conflicts[0].remote_updated_at, 5000);
}

#[tokio::test]
async fn test_superseded_with_older_record_is_retried() {
    let h = harness().await;
    let local = h.store.create(record("a1", "INV-1", 4000)).await.unwrap();

    let mut stale = local.clone();
    stale.updated_at = 4000;
    h.remote.script([Reply::Supersede(stale)]);

    let report = h.sync.push_pending().await.unwrap();
    assert_eq!(report.superseded, 0);
    assert_eq!(report.failed.len(), 1);
    assert!(h.store.conflicts().await.unwrap().is_empty());
    assert_eq!(h.store.pending_changes(10).await.unwrap()[0].attempts, 1);
}

#[tokio::test]
async fn test_media_is_uploaded_before_the_change() {
    let h = harness().await;
    let reference = h.media.put(b"\x89PNG fake image", MediaKind::Image).unwrap();

    let mut with_image = record("a1", "INV-1", 1000);
    with_image.images = vec![reference.clone()];
    h.store.create(with_image).await.unwrap();

    let report = h.sync.push_pending().await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(
        h.remote.log(),
        vec![format!("media:{reference}"), "create:a1".to_string()]
    );
}

#[tokio::test]
async fn test_status_reports_pending_and_conflicts() {
    let h = harness().await;
    h.store.create(record("a1", "INV-1", 1000)).await.unwrap();

    let status = h.sync.status().await.unwrap();
    assert_eq!(status.state, SyncState::Offline);
    assert_eq!(status.pending, 1);
    assert_eq!(status.conflicts, 0);

    let mut states = h.sync.subscribe();
    h.sync.push_pending().await.unwrap();
    assert_eq!(*states.borrow_and_update(), SyncState::Idle);
    assert_eq!(h.sync.status().await.unwrap().pending, 0);
}
