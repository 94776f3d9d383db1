//! PostgreSQL warehouse.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, info, instrument};

use climate_common::{
    AnnualSummary, FireRow, PipelineError, PipelineResult, TemperatureRow, SUMMARY_MIN_YEAR,
};

use super::{dedupe_temperatures, Warehouse, WriteMode};

const CREATE_TEMPERATURES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS raw_temperatures (
    year INTEGER PRIMARY KEY,
    temp_anomaly_celsius DOUBLE PRECISION NOT NULL
)
"#;

const CREATE_FIRES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS raw_fires (
    latitude DOUBLE PRECISION,
    longitude DOUBLE PRECISION,
    fire_date DATE NOT NULL,
    intensity_mw DOUBLE PRECISION,
    confidence TEXT,
    source_file TEXT NOT NULL
)
"#;

/// Rows per INSERT, kept well under the bind parameter limit.
const INSERT_CHUNK: usize = 5_000;

fn summary_sql() -> String {
    format!(
        r#"
CREATE TABLE annual_global_summary AS
WITH fire_stats AS (
    SELECT
        EXTRACT(YEAR FROM fire_date)::INTEGER AS year,
        COUNT(*) AS total_fires,
        AVG(intensity_mw) AS avg_intensity,
        MAX(intensity_mw) AS max_intensity
    FROM raw_fires
    GROUP BY 1
),
temp_stats AS (
    SELECT year, temp_anomaly_celsius FROM raw_temperatures
)
SELECT
    t.year,
    t.temp_anomaly_celsius,
    COALESCE(f.total_fires, 0)::BIGINT AS total_fires,
    COALESCE(f.avg_intensity, 0)::DOUBLE PRECISION AS avg_intensity,
    COALESCE(f.max_intensity, 0)::DOUBLE PRECISION AS max_intensity
FROM temp_stats t
LEFT JOIN fire_stats f ON t.year = f.year
WHERE t.year >= {}
ORDER BY t.year DESC
"#,
        SUMMARY_MIN_YEAR
    )
}

fn db_error(context: &str, err: sqlx::Error) -> PipelineError {
    PipelineError::Database(format!("{}: {}", context, err))
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    year: i32,
    temp_anomaly_celsius: Option<f64>,
    total_fires: i64,
    avg_intensity: f64,
    max_intensity: f64,
}

impl From<SummaryRow> for AnnualSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            year: row.year,
            temp_anomaly_celsius: row.temp_anomaly_celsius,
            total_fires: row.total_fires,
            avg_intensity: row.avg_intensity,
            max_intensity: row.max_intensity,
        }
    }
}

#[derive(Debug, FromRow)]
struct FireDbRow {
    latitude: Option<f64>,
    longitude: Option<f64>,
    fire_date: NaiveDate,
    intensity_mw: Option<f64>,
    confidence: Option<String>,
    source_file: String,
}

impl From<FireDbRow> for FireRow {
    fn from(row: FireDbRow) -> Self {
        Self {
            latitude: row.latitude,
            longitude: row.longitude,
            fire_date: row.fire_date,
            intensity_mw: row.intensity_mw,
            confidence: row.confidence,
            source_file: row.source_file,
        }
    }
}

/// Warehouse backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    /// Connect to the database. A failure here is fatal for the calling stage.
    pub async fn connect(database_url: &str) -> PipelineResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| db_error("Connection failed", e))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> PipelineResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| db_error("Begin transaction failed", e))
    }

    async fn exec(tx: &mut Transaction<'static, Postgres>, sql: &str) -> PipelineResult<()> {
        sqlx::query(sql)
            .execute(&mut **tx)
            .await
            .map_err(|e| db_error("Statement failed", e))?;
        Ok(())
    }

    async fn insert_fires(
        tx: &mut Transaction<'static, Postgres>,
        rows: &[FireRow],
    ) -> PipelineResult<u64> {
        let mut inserted = 0;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO raw_fires \
                 (latitude, longitude, fire_date, intensity_mw, confidence, source_file) ",
            );
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.latitude)
                    .push_bind(row.longitude)
                    .push_bind(row.fire_date)
                    .push_bind(row.intensity_mw)
                    .push_bind(row.confidence.as_deref())
                    .push_bind(row.source_file.as_str());
            });
            let result = builder
                .build()
                .execute(&mut **tx)
                .await
                .map_err(|e| db_error("Insert into raw_fires failed", e))?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn replace_temperatures(&self, rows: &[TemperatureRow]) -> PipelineResult<u64> {
        let rows = dedupe_temperatures(rows);
        let mut tx = self.begin().await?;

        Self::exec(&mut tx, "DROP TABLE IF EXISTS raw_temperatures").await?;
        Self::exec(&mut tx, CREATE_TEMPERATURES_SQL).await?;

        let mut inserted = 0;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO raw_temperatures (year, temp_anomaly_celsius) ");
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.year).push_bind(row.temp_anomaly_celsius);
            });
            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("Insert into raw_temperatures failed", e))?;
            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| db_error("Commit failed", e))?;

        info!(rows = inserted, "Replaced raw_temperatures");
        Ok(inserted)
    }

    #[instrument(skip(self, rows), fields(rows = rows.len(), mode = ?mode))]
    async fn write_fire_batch(&self, rows: &[FireRow], mode: WriteMode) -> PipelineResult<u64> {
        let mut tx = self.begin().await?;

        if mode == WriteMode::Replace {
            Self::exec(&mut tx, "DROP TABLE IF EXISTS raw_fires").await?;
        }
        Self::exec(&mut tx, CREATE_FIRES_SQL).await?;
        let inserted = Self::insert_fires(&mut tx, rows).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("Commit failed", e))?;

        debug!(rows = inserted, "Wrote fire batch");
        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn rebuild_summary(&self) -> PipelineResult<u64> {
        let mut tx = self.begin().await?;

        // Either raw table may be absent on a fresh database.
        Self::exec(&mut tx, CREATE_TEMPERATURES_SQL).await?;
        Self::exec(&mut tx, CREATE_FIRES_SQL).await?;
        Self::exec(&mut tx, "DROP TABLE IF EXISTS annual_global_summary").await?;
        Self::exec(&mut tx, &summary_sql()).await?;

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM annual_global_summary")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("Summary count failed", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Commit failed", e))?;

        info!(rows = count.0, "Rebuilt annual_global_summary");
        Ok(count.0 as u64)
    }

    async fn read_summary(&self) -> PipelineResult<Vec<AnnualSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            "SELECT year, temp_anomaly_celsius, total_fires, avg_intensity, max_intensity \
             FROM annual_global_summary ORDER BY year DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Summary query failed", e))?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn read_temperatures(&self) -> PipelineResult<Vec<TemperatureRow>> {
        let rows: Vec<(i32, f64)> = sqlx::query_as(
            "SELECT year, temp_anomaly_celsius FROM raw_temperatures ORDER BY year ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Temperature query failed", e))?;

        Ok(rows
            .into_iter()
            .map(|(year, temp_anomaly_celsius)| TemperatureRow {
                year,
                temp_anomaly_celsius,
            })
            .collect())
    }

    async fn read_fires(&self) -> PipelineResult<Vec<FireRow>> {
        let rows = sqlx::query_as::<_, FireDbRow>(
            "SELECT latitude, longitude, fire_date, intensity_mw, confidence, source_file \
             FROM raw_fires ORDER BY fire_date ASC, source_file ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Fire query failed", e))?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}
