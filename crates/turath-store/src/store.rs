//! Local store engine.
//!
//! Records live in SQLite keyed by id. Every mutation runs in one
//! transaction that writes the record row and appends the matching
//! pending-change entry, so a crash leaves either both or neither. Mutations
//! are serialized through a single async write lock; reads never take it.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::{Mutex, Notify};
use turath_record::{ArtifactRecord, ClosedEnum, HeritageCategory, MediaRef, Millis};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::db;
use crate::error::{StoreError, StoreResult};
use crate::models::sync_conflict::LAST_WRITER_WINS;
use crate::models::{
    ArtifactRow, ChangeOperation, NewArtifactRow, NewPendingChange, NewSyncConflict, PendingChange,
    SyncConflict,
};

pub(crate) const ROW_COLUMNS: &str = "seq, id, inventory_number, name, category, location_key, \
     record_json, created_at, updated_at, deleted_at";

/// How a deleted record leaves the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Keep a tombstone until the remote acknowledges the delete.
    Tombstone,
    /// Remove the row at once and retire its id.
    Physical,
}

/// Per-call overrides for soft constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Save even when another live record carries the same inventory number.
    pub allow_duplicate_inventory_number: bool,
}

impl WriteOptions {
    pub fn force() -> Self {
        Self {
            allow_duplicate_inventory_number: true,
        }
    }
}

/// Counters shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: i64,
    pub material: i64,
    pub immaterial: i64,
    /// Distinct GPS positions among live records.
    pub locations: i64,
    pub pending_changes: i64,
    pub tombstones: i64,
}

/// Handle to the local database. Cheap to clone.
#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
    changes: Arc<Notify>,
    clock: Arc<dyn Clock>,
    delete_mode: DeleteMode,
}

impl LocalStore {
    /// Opens (creating if needed) the database at `path` and applies migrations.
    pub async fn open(path: &Path, max_connections: u32, delete_mode: DeleteMode) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let pool = db::create_pool(path, max_connections).await?;
        db::run_migrations(&pool).await?;
        tracing::info!(op = "store.open", path = %path.display(), ?delete_mode, "Local store ready");
        Ok(Self::from_pool(pool, delete_mode))
    }

    pub fn from_pool(pool: SqlitePool, delete_mode: DeleteMode) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
            changes: Arc::new(Notify::new()),
            clock: Arc::new(SystemClock),
            delete_mode,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn delete_mode(&self) -> DeleteMode {
        self.delete_mode
    }

    /// Signalled after every committed mutation; the sync task waits on it.
    pub fn changes(&self) -> Arc<Notify> {
        Arc::clone(&self.changes)
    }

    pub fn now(&self) -> Millis {
        self.clock.now_millis()
    }

    pub async fn create(&self, record: ArtifactRecord) -> StoreResult<ArtifactRecord> {
        self.create_with(record, WriteOptions::default()).await
    }

    /// Inserts a new record.
    ///
    /// Fails with `Conflict` when the id is taken (live, tombstoned or
    /// retired) or, unless overridden, when another live record holds the
    /// same inventory number.
    pub async fn create_with(
        &self,
        record: ArtifactRecord,
        options: WriteOptions,
    ) -> StoreResult<ArtifactRecord> {
        record.check()?;
        let row = NewArtifactRow::from_record(&record)?;
        let change = NewPendingChange::for_record(ChangeOperation::Create, &record, self.now())?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        if id_in_use(&mut tx, &record.id).await? {
            return Err(StoreError::conflict(format!(
                "artifact id '{}' is already in use",
                record.id
            )));
        }
        if !options.allow_duplicate_inventory_number {
            ensure_inventory_free(&mut tx, &record.inventory_number, None).await?;
        }

        insert_row(&mut tx, &row).await?;
        append_change(&mut tx, &change).await?;
        tx.commit().await?;

        self.changes.notify_one();
        tracing::info!(op = "artifact.create", record_id = %record.id, inventory = %record.inventory_number);
        Ok(record)
    }

    pub async fn update(&self, record: ArtifactRecord) -> StoreResult<ArtifactRecord> {
        self.update_with(record, WriteOptions::default()).await
    }

    /// Replaces a live record.
    ///
    /// `id` and `createdAt` come from the stored record; `updatedAt` is bumped
    /// past the stored value when the caller's clock did not advance.
    pub async fn update_with(
        &self,
        mut record: ArtifactRecord,
        options: WriteOptions,
    ) -> StoreResult<ArtifactRecord> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing = match fetch_row(&mut tx, &record.id).await? {
            Some(row) if !row.is_tombstoned() => row,
            _ => return Err(StoreError::NotFound(record.id)),
        };

        record.created_at = existing.created_at;
        record.updated_at = record.updated_at.max(existing.updated_at + 1);
        record.check()?;

        if !options.allow_duplicate_inventory_number {
            ensure_inventory_free(&mut tx, &record.inventory_number, Some(&record.id)).await?;
        }

        let row = NewArtifactRow::from_record(&record)?;
        let change = NewPendingChange::for_record(ChangeOperation::Update, &record, self.now())?;
        replace_row(&mut tx, &row, false).await?;
        append_change(&mut tx, &change).await?;
        tx.commit().await?;

        self.changes.notify_one();
        tracing::info!(op = "artifact.update", record_id = %record.id, updated_at = record.updated_at);
        Ok(record)
    }

    /// Fetches a live record.
    pub async fn get(&self, id: &str) -> StoreResult<ArtifactRecord> {
        let mut conn = self.pool.acquire().await?;
        match fetch_row(&mut conn, id).await? {
            Some(row) if !row.is_tombstoned() => row.decode(),
            _ => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// Row for `id` including tombstones.
    pub async fn get_row(&self, id: &str) -> StoreResult<Option<ArtifactRow>> {
        let mut conn = self.pool.acquire().await?;
        fetch_row(&mut conn, id).await
    }

    /// Live records carrying an inventory number (several only after an override).
    pub async fn find_by_inventory_number(
        &self,
        inventory_number: &str,
    ) -> StoreResult<Vec<ArtifactRecord>> {
        let rows = sqlx::query_as::<_, ArtifactRow>(&format!(
            "SELECT {ROW_COLUMNS} FROM artifacts \
             WHERE inventory_number = ? AND deleted_at IS NULL ORDER BY seq"
        ))
        .bind(inventory_number.trim())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(ArtifactRow::decode).collect()
    }

    /// Deletes a live record. Deleting twice yields `NotFound`.
    ///
    /// Referenced media is left in place for the maintenance pass.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let now = self.now();
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let row = match fetch_row(&mut tx, id).await? {
            Some(row) if !row.is_tombstoned() => row,
            _ => return Err(StoreError::NotFound(id.to_string())),
        };
        let last = row.decode()?;

        match self.delete_mode {
            DeleteMode::Tombstone => {
                sqlx::query("UPDATE artifacts SET deleted_at = ? WHERE id = ?")
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            DeleteMode::Physical => {
                purge_row(&mut tx, id, now).await?;
                // Nothing pushes without sync; the delete entry alone stands for the record's history
                sqlx::query("DELETE FROM pending_changes WHERE record_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        let change = NewPendingChange::for_record(ChangeOperation::Delete, &last, now)?;
        append_change(&mut tx, &change).await?;
        tx.commit().await?;

        self.changes.notify_one();
        tracing::info!(op = "artifact.delete", record_id = %id, mode = ?self.delete_mode);
        Ok(())
    }

    pub async fn stats(&self) -> StoreResult<StoreStats> {
        let (total, material, immaterial, locations, tombstones): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE deleted_at IS NULL),
                    COUNT(*) FILTER (WHERE deleted_at IS NULL AND category = ?),
                    COUNT(*) FILTER (WHERE deleted_at IS NULL AND category = ?),
                    COUNT(DISTINCT CASE WHEN deleted_at IS NULL THEN location_key END),
                    COUNT(*) FILTER (WHERE deleted_at IS NOT NULL)
                FROM artifacts
                "#,
            )
            .bind(HeritageCategory::Material.code())
            .bind(HeritageCategory::Immaterial.code())
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            total,
            material,
            immaterial,
            locations,
            pending_changes: self.pending_count().await?,
            tombstones,
        })
    }

    /// Media references still reachable from a row, or from a pending change
    /// that will be pushed.
    ///
    /// Without sync (`DeleteMode::Physical`) ledger snapshots pin nothing: a
    /// deleted record's media becomes an orphan as soon as its row is gone.
    pub async fn live_media_refs(&self) -> StoreResult<HashSet<MediaRef>> {
        let sql = match self.delete_mode {
            DeleteMode::Tombstone => {
                r#"
                SELECT record_json FROM artifacts
                UNION ALL
                SELECT payload_json FROM pending_changes WHERE payload_json IS NOT NULL
                "#
            }
            DeleteMode::Physical => "SELECT record_json FROM artifacts",
        };
        let snapshots: Vec<(String,)> = sqlx::query_as(sql).fetch_all(&self.pool).await?;

        let mut refs = HashSet::new();
        for (json,) in snapshots {
            let record: ArtifactRecord = serde_json::from_str(&json)?;
            refs.extend(record.media_refs().cloned());
        }
        Ok(refs)
    }

    /// Oldest ledger entries first.
    pub async fn pending_changes(&self, limit: u32) -> StoreResult<Vec<PendingChange>> {
        self.pending_changes_after(0, limit).await
    }

    /// Ledger entries with `seq` above `after_seq`, oldest first.
    pub async fn pending_changes_after(&self, after_seq: i64, limit: u32) -> StoreResult<Vec<PendingChange>> {
        let entries = sqlx::query_as::<_, PendingChange>(
            r#"
            SELECT seq, record_id, operation, payload_json, recorded_at,
                   attempts, next_attempt_at, last_error
            FROM pending_changes
            WHERE seq > ?
            ORDER BY seq
            LIMIT ?
            "#,
        )
        .bind(after_seq)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    pub async fn pending_count(&self) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_changes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Removes an acknowledged ledger entry.
    ///
    /// For a delete, the tombstone is purged and the id retired in the same
    /// transaction.
    pub async fn acknowledge(&self, change: &PendingChange) -> StoreResult<()> {
        let now = self.now();
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        remove_change(&mut tx, change.seq).await?;
        if change.operation == ChangeOperation::Delete {
            let tombstoned = fetch_row(&mut tx, &change.record_id)
                .await?
                .is_some_and(|row| row.is_tombstoned());
            if tombstoned {
                purge_row(&mut tx, &change.record_id, now).await?;
            }
        }
        tx.commit().await?;

        tracing::debug!(op = "ledger.ack", seq = change.seq, record_id = %change.record_id);
        Ok(())
    }

    /// Schedules a retry for a ledger entry that failed to push.
    pub async fn record_failure(
        &self,
        seq: i64,
        attempts: i64,
        next_attempt_at: Millis,
        error: &str,
    ) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "UPDATE pending_changes SET attempts = ?, next_attempt_at = ?, last_error = ? WHERE seq = ?",
        )
        .bind(attempts)
        .bind(next_attempt_at)
        .bind(error)
        .bind(seq)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replaces the local copy with the remote winner of a last-writer-wins
    /// conflict, without appending to the ledger.
    ///
    /// The superseded entry is removed and the losing snapshot logged, all in
    /// one transaction. A superseded delete brings the record back.
    pub async fn adopt_remote(
        &self,
        change: &PendingChange,
        remote: &ArtifactRecord,
        conflict: NewSyncConflict,
    ) -> StoreResult<()> {
        remote.check()?;
        if remote.id != change.record_id {
            return Err(StoreError::conflict(format!(
                "remote answered with record '{}' for '{}'",
                remote.id, change.record_id
            )));
        }
        let row = NewArtifactRow::from_record(remote)?;
        let now = self.now();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        replace_row(&mut tx, &row, change.operation == ChangeOperation::Delete).await?;
        remove_change(&mut tx, change.seq).await?;
        sqlx::query(
            r#"
            INSERT INTO sync_conflicts
                (id, record_id, local_updated_at, remote_updated_at, losing_snapshot, strategy, resolved_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&conflict.record_id)
        .bind(conflict.local_updated_at)
        .bind(conflict.remote_updated_at)
        .bind(&conflict.losing_snapshot)
        .bind(LAST_WRITER_WINS)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::warn!(
            op = "sync.conflict",
            record_id = %conflict.record_id,
            local_updated_at = conflict.local_updated_at,
            remote_updated_at = conflict.remote_updated_at,
            losing_snapshot = %conflict.losing_snapshot,
            "Local write superseded by remote"
        );
        Ok(())
    }

    /// Conflict log, newest first.
    pub async fn conflicts(&self) -> StoreResult<Vec<SyncConflict>> {
        let rows = sqlx::query_as::<_, SyncConflict>(
            r#"
            SELECT id, record_id, local_updated_at, remote_updated_at,
                   losing_snapshot, strategy, resolved_at
            FROM sync_conflicts
            ORDER BY resolved_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

async fn fetch_row(conn: &mut SqliteConnection, id: &str) -> StoreResult<Option<ArtifactRow>> {
    let row = sqlx::query_as::<_, ArtifactRow>(&format!(
        "SELECT {ROW_COLUMNS} FROM artifacts WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

async fn id_in_use(conn: &mut SqliteConnection, id: &str) -> StoreResult<bool> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM artifacts WHERE id = ?1) + (SELECT COUNT(*) FROM retired_ids WHERE id = ?1)",
    )
    .bind(id)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

async fn ensure_inventory_free(
    conn: &mut SqliteConnection,
    inventory_number: &str,
    except_id: Option<&str>,
) -> StoreResult<()> {
    let holder: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT id FROM artifacts
        WHERE inventory_number = ? AND deleted_at IS NULL AND id != ?
        LIMIT 1
        "#,
    )
    .bind(inventory_number)
    .bind(except_id.unwrap_or_default())
    .fetch_optional(conn)
    .await?;

    match holder {
        Some((id,)) => Err(StoreError::conflict(format!(
            "inventory number '{inventory_number}' is already used by artifact '{id}'"
        ))),
        None => Ok(()),
    }
}

async fn insert_row(conn: &mut SqliteConnection, row: &NewArtifactRow) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO artifacts
            (id, inventory_number, name, category, location_key, search_text,
             record_json, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.inventory_number)
    .bind(&row.name)
    .bind(row.category)
    .bind(&row.location_key)
    .bind(&row.search_text)
    .bind(&row.record_json)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn replace_row(
    conn: &mut SqliteConnection,
    row: &NewArtifactRow,
    restore: bool,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE artifacts
        SET inventory_number = ?, name = ?, category = ?, location_key = ?,
            search_text = ?, record_json = ?, created_at = ?, updated_at = ?,
            deleted_at = CASE WHEN ? THEN NULL ELSE deleted_at END
        WHERE id = ?
        "#,
    )
    .bind(&row.inventory_number)
    .bind(&row.name)
    .bind(row.category)
    .bind(&row.location_key)
    .bind(&row.search_text)
    .bind(&row.record_json)
    .bind(row.created_at)
    .bind(row.updated_at)
    .bind(restore)
    .bind(&row.id)
    .execute(conn)
    .await?;
    Ok(())
}

async fn purge_row(conn: &mut SqliteConnection, id: &str, now: Millis) -> StoreResult<()> {
    sqlx::query("DELETE FROM artifacts WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("INSERT OR IGNORE INTO retired_ids (id, retired_at) VALUES (?, ?)")
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn append_change(conn: &mut SqliteConnection, change: &NewPendingChange) -> StoreResult<i64> {
    let (seq,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO pending_changes (record_id, operation, payload_json, recorded_at)
        VALUES (?, ?, ?, ?)
        RETURNING seq
        "#,
    )
    .bind(&change.record_id)
    .bind(change.operation)
    .bind(&change.payload_json)
    .bind(change.recorded_at)
    .fetch_one(conn)
    .await?;
    Ok(seq)
}

async fn remove_change(conn: &mut SqliteConnection, seq: i64) -> StoreResult<()> {
    sqlx::query("DELETE FROM pending_changes WHERE seq = ?")
        .bind(seq)
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tempfile::TempDir;
    use turath_record::{prepare, ArtifactDraft, DraftGps};

    async fn open_store(tmp: &TempDir, mode: DeleteMode) -> LocalStore {
        LocalStore::open(&tmp.path().join("turath.sqlite"), 4, mode)
            .await
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(1_000)))
    }

    fn record(id: &str, inventory: &str) -> ArtifactRecord {
        let draft = ArtifactDraft {
            id: Some(id.to_string()),
            inventory_number: Some(inventory.to_string()),
            category: Some("MATERIAL".to_string()),
            gps: Some(DraftGps {
                lat: Some(27.6761),
                lng: Some(-8.1277),
                location_type: Some("DISCOVERY".to_string()),
            }),
            ..Default::default()
        };
        prepare(draft, 1_000).unwrap()
    }

    #[tokio::test]
    async fn test_uncommitted_mutation_leaves_prior_state() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp, DeleteMode::Tombstone).await;
        let rec = record("a1", "INV-000123");

        {
            // Record row and ledger entry written, then the process "dies"
            let mut tx = store.pool().begin().await.unwrap();
            insert_row(&mut tx, &NewArtifactRow::from_record(&rec).unwrap())
                .await
                .unwrap();
            append_change(
                &mut tx,
                &NewPendingChange::for_record(ChangeOperation::Create, &rec, 1_000).unwrap(),
            )
            .await
            .unwrap();
            drop(tx);
        }
        store.pool().close().await;

        let reopened = open_store(&tmp, DeleteMode::Tombstone).await;
        assert!(matches!(reopened.get("a1").await, Err(StoreError::NotFound(_))));
        assert_eq!(reopened.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_committed_mutation_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp, DeleteMode::Tombstone).await;
        store.create(record("a1", "INV-000123")).await.unwrap();
        store.pool().close().await;

        let reopened = open_store(&tmp, DeleteMode::Tombstone).await;
        assert_eq!(reopened.get("a1").await.unwrap().inventory_number, "INV-000123");
        let ledger = reopened.pending_changes(10).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].operation, ChangeOperation::Create);
    }

    #[tokio::test]
    async fn test_failed_inventory_check_appends_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp, DeleteMode::Tombstone).await;
        store.create(record("a1", "INV-1")).await.unwrap();

        let err = store.create(record("a2", "INV-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.pending_count().await.unwrap(), 1);
        assert!(matches!(store.get("a2").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_physical_delete_collapses_record_history() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp, DeleteMode::Physical).await;
        let mut rec = store.create(record("a1", "INV-1")).await.unwrap();
        store.create(record("b1", "INV-2")).await.unwrap();
        rec.name = "edited".to_string();
        store.update(rec).await.unwrap();

        store.delete("a1").await.unwrap();

        let ledger = store.pending_changes(10).await.unwrap();
        let entries: Vec<_> = ledger
            .iter()
            .map(|c| (c.record_id.as_str(), c.operation))
            .collect();
        assert_eq!(
            entries,
            vec![("b1", ChangeOperation::Create), ("a1", ChangeOperation::Delete)]
        );
    }

    #[tokio::test]
    async fn test_adopt_remote_restores_superseded_delete() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp, DeleteMode::Tombstone).await;
        let rec = store.create(record("a1", "INV-1")).await.unwrap();
        store.acknowledge(&store.pending_changes(1).await.unwrap()[0]).await.unwrap();
        store.delete("a1").await.unwrap();

        let entry = store.pending_changes(1).await.unwrap().remove(0);
        let mut remote = rec.clone();
        remote.name = "remote edit".to_string();
        remote.updated_at = 9_000;
        store
            .adopt_remote(
                &entry,
                &remote,
                NewSyncConflict {
                    record_id: "a1".to_string(),
                    local_updated_at: rec.updated_at,
                    remote_updated_at: remote.updated_at,
                    losing_snapshot: serde_json::to_string(&rec).unwrap(),
                },
            )
            .await
            .unwrap();

        assert_eq!(store.get("a1").await.unwrap().name, "remote edit");
        assert_eq!(store.pending_count().await.unwrap(), 0);
        assert_eq!(store.conflicts().await.unwrap().len(), 1);
    }
}
