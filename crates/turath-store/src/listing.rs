//! Record listing with snapshot cursors.
//!
//! A [`RecordCursor`] owns one read transaction for its whole life. Under WAL
//! the transaction pins the database snapshot taken by its first read, so
//! paging through the list never observes writes committed in between.
//! Pages are fetched with keyset pagination; media bytes are never touched.

use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, Transaction};
use turath_record::{ArtifactRecord, ClosedEnum, HeritageCategory, Millis};

use crate::error::StoreResult;
use crate::models::ArtifactRow;
use crate::store::{LocalStore, ROW_COLUMNS};

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 500;

/// Sort order of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest insertion first.
    #[default]
    Insertion,
    /// Most recently updated first.
    Recent,
}

/// Filter and paging parameters.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub category: Option<HeritageCategory>,
    /// Case-insensitive substring over name and inventory number.
    pub search: Option<String>,
    pub sort: SortOrder,
    pub page_size: Option<u32>,
}

impl ListQuery {
    fn search_needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    fn effective_page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

/// Position after the last row handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Start,
    After { seq: i64, updated_at: Millis },
    Exhausted,
}

/// Lazily paged, snapshot-consistent iteration over live records.
pub struct RecordCursor {
    tx: Transaction<'static, Sqlite>,
    query: ListQuery,
    needle: Option<String>,
    position: Position,
    total: i64,
}

impl LocalStore {
    /// Opens a cursor over the live records matching `query`.
    pub async fn list(&self, query: ListQuery) -> StoreResult<RecordCursor> {
        let mut tx = self.pool().begin().await?;
        let needle = query.search_needle();

        // First read pins the snapshot for the rest of the transaction
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM artifacts");
        push_filters(&mut count, &query, needle.as_deref());
        let (total,): (i64,) = count.build_query_as::<(i64,)>().fetch_one(&mut *tx).await?;

        Ok(RecordCursor {
            tx,
            query,
            needle,
            position: Position::Start,
            total,
        })
    }

    /// Every live record in insertion order.
    pub async fn export_all(&self) -> StoreResult<Vec<ArtifactRecord>> {
        let mut cursor = self
            .list(ListQuery {
                page_size: Some(MAX_PAGE_SIZE),
                ..Default::default()
            })
            .await?;
        cursor.collect_remaining().await
    }
}

impl RecordCursor {
    /// Number of matching records in this cursor's snapshot.
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Next page, or an empty vector once the listing is exhausted.
    pub async fn next_page(&mut self) -> StoreResult<Vec<ArtifactRecord>> {
        if self.position == Position::Exhausted {
            return Ok(Vec::new());
        }
        let page_size = self.query.effective_page_size();

        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {ROW_COLUMNS} FROM artifacts"));
        push_filters(&mut builder, &self.query, self.needle.as_deref());

        match (self.query.sort, self.position) {
            (SortOrder::Insertion, Position::After { seq, .. }) => {
                builder.push(" AND seq > ").push_bind(seq);
            }
            (SortOrder::Recent, Position::After { seq, updated_at }) => {
                builder
                    .push(" AND (updated_at < ")
                    .push_bind(updated_at)
                    .push(" OR (updated_at = ")
                    .push_bind(updated_at)
                    .push(" AND seq < ")
                    .push_bind(seq)
                    .push("))");
            }
            _ => {}
        }
        builder.push(match self.query.sort {
            SortOrder::Insertion => " ORDER BY seq ASC",
            SortOrder::Recent => " ORDER BY updated_at DESC, seq DESC",
        });
        builder.push(" LIMIT ").push_bind(i64::from(page_size));

        let rows = builder.build_query_as::<ArtifactRow>().fetch_all(&mut *self.tx).await?;

        self.position = match rows.last() {
            Some(last) if rows.len() as u32 == page_size => Position::After {
                seq: last.seq,
                updated_at: last.updated_at,
            },
            _ => Position::Exhausted,
        };
        rows.iter().map(ArtifactRow::decode).collect()
    }

    /// Drains the rest of the cursor.
    pub async fn collect_remaining(&mut self) -> StoreResult<Vec<ArtifactRecord>> {
        let mut all = Vec::new();
        loop {
            let page = self.next_page().await?;
            if page.is_empty() {
                return Ok(all);
            }
            all.extend(page);
        }
    }

    /// Restarts from the first page within the same snapshot.
    pub fn rewind(&mut self) {
        self.position = Position::Start;
    }

    /// Ends the read transaction.
    pub async fn close(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ListQuery, needle: Option<&str>) {
    builder.push(" WHERE deleted_at IS NULL");
    if let Some(category) = query.category {
        builder.push(" AND category = ").push_bind(category.code());
    }
    if let Some(needle) = needle {
        builder
            .push(" AND instr(search_text, ")
            .push_bind(needle.to_string())
            .push(") > 0");
    }
}
