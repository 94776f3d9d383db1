//! Fetch ledger: which partitions are already in local storage.
//!
//! The ledger is the only authority for "already fetched". Lookups are keyed
//! by (kind, year) and never touch partition payloads.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};

use climate_common::{DatasetKind, FetchRecord, Partition, PipelineError, PipelineResult};

/// Durable record of fetched partitions.
#[async_trait]
pub trait FetchLedger: Send + Sync {
    /// Whether a record exists for exactly this partition.
    ///
    /// A failed lookup is an error, not an absence.
    async fn has(&self, partition: &Partition) -> PipelineResult<bool>;

    /// Persist a record. Returns `false` if one already existed, in which case
    /// the stored record is left untouched.
    async fn record(&self, record: &FetchRecord) -> PipelineResult<bool>;

    /// All records of a kind, ascending by year.
    async fn list(&self, kind: DatasetKind) -> PipelineResult<Vec<FetchRecord>>;

    /// Record with the highest year for a kind.
    async fn latest(&self, kind: DatasetKind) -> PipelineResult<Option<FetchRecord>>;

    /// Delete a record so the partition is fetched again on the next run.
    async fn forget(&self, partition: &Partition) -> PipelineResult<bool>;
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS fetch_records (
    kind TEXT NOT NULL,
    year INTEGER NOT NULL,
    location TEXT NOT NULL,
    size_bytes INTEGER NOT NULL CHECK (size_bytes > 0),
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (kind, year)
)
"#;

#[derive(Debug, FromRow)]
struct FetchRecordRow {
    kind: String,
    year: i64,
    location: String,
    size_bytes: i64,
    fetched_at: String,
}

impl TryFrom<FetchRecordRow> for FetchRecord {
    type Error = PipelineError;

    fn try_from(row: FetchRecordRow) -> Result<Self, Self::Error> {
        let kind: DatasetKind = row
            .kind
            .parse()
            .map_err(|_| PipelineError::Ledger(format!("unknown kind '{}' in ledger", row.kind)))?;
        let fetched_at = DateTime::parse_from_rfc3339(&row.fetched_at)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| PipelineError::Ledger(format!("bad fetched_at: {}", e)))?;

        Ok(FetchRecord {
            partition: Partition::new(kind, row.year as i32),
            location: row.location,
            size_bytes: row.size_bytes as u64,
            fetched_at,
        })
    }
}

fn ledger_error(err: sqlx::Error) -> PipelineError {
    PipelineError::Ledger(err.to_string())
}

/// SQLite-backed ledger.
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Open or create the ledger database at the given path.
    pub async fn open(path: &Path) -> PipelineResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| PipelineError::Ledger(format!("Failed to open ledger: {}", e)))?;

        let ledger = Self { pool };
        ledger.migrate().await?;

        info!(path = %path.display(), "Opened fetch ledger");
        Ok(ledger)
    }

    /// Open an in-memory ledger (for testing).
    pub async fn open_memory() -> PipelineResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        // A single connection that never expires, or the database goes with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(ledger_error)?;

        let ledger = Self { pool };
        ledger.migrate().await?;
        Ok(ledger)
    }

    async fn migrate(&self) -> PipelineResult<()> {
        sqlx::query(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(ledger_error)?;
        Ok(())
    }

    /// Close the pool. Later calls fail with a ledger error.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl FetchLedger for SqliteLedger {
    async fn has(&self, partition: &Partition) -> PipelineResult<bool> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM fetch_records WHERE kind = ? AND year = ?")
                .bind(partition.kind.as_str())
                .bind(partition.year)
                .fetch_one(&self.pool)
                .await
                .map_err(ledger_error)?;

        Ok(count.0 > 0)
    }

    async fn record(&self, record: &FetchRecord) -> PipelineResult<bool> {
        if record.size_bytes == 0 {
            return Err(PipelineError::Ledger(format!(
                "refusing to record empty partition {}",
                record.partition
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO fetch_records (kind, year, location, size_bytes, fetched_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.partition.kind.as_str())
        .bind(record.partition.year)
        .bind(&record.location)
        .bind(record.size_bytes as i64)
        .bind(record.fetched_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(ledger_error)?;

        let inserted = result.rows_affected() > 0;
        debug!(
            partition = %record.partition,
            location = %record.location,
            inserted,
            "Recorded partition"
        );
        Ok(inserted)
    }

    async fn list(&self, kind: DatasetKind) -> PipelineResult<Vec<FetchRecord>> {
        let rows = sqlx::query_as::<_, FetchRecordRow>(
            "SELECT kind, year, location, size_bytes, fetched_at \
             FROM fetch_records WHERE kind = ? ORDER BY year ASC",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(ledger_error)?;

        rows.into_iter().map(FetchRecord::try_from).collect()
    }

    async fn latest(&self, kind: DatasetKind) -> PipelineResult<Option<FetchRecord>> {
        let row = sqlx::query_as::<_, FetchRecordRow>(
            "SELECT kind, year, location, size_bytes, fetched_at \
             FROM fetch_records WHERE kind = ? ORDER BY year DESC LIMIT 1",
        )
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(ledger_error)?;

        row.map(FetchRecord::try_from).transpose()
    }

    async fn forget(&self, partition: &Partition) -> PipelineResult<bool> {
        let result = sqlx::query("DELETE FROM fetch_records WHERE kind = ? AND year = ?")
            .bind(partition.kind.as_str())
            .bind(partition.year)
            .execute(&self.pool)
            .await
            .map_err(ledger_error)?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(partition = %partition, "Forgot ledger record");
        }
        Ok(removed)
    }
}
