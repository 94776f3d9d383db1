//! Gold CSV export of the yearly summary.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use tracing::info;

use climate_common::{AnnualSummary, PipelineError, PipelineResult};
use ingestion::files::write_atomic;
use storage::paths;

pub const GOLD_CSV_NAME: &str = "final_climate_fire_analysis.csv";

pub fn gold_csv_path(storage_root: &Path) -> PathBuf {
    paths::gold_dir(storage_root).join(GOLD_CSV_NAME)
}

fn csv_error(e: csv::Error) -> PipelineError {
    PipelineError::parse("summary CSV", e.to_string())
}

/// Serialize summary rows with a header; a missing anomaly is an empty field.
pub fn to_csv(summary: &[AnnualSummary]) -> PipelineResult<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    for row in summary {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer
        .into_inner()
        .map_err(|e| PipelineError::Io(e.into_error().to_string()))
}

pub fn parse_csv(data: &[u8]) -> PipelineResult<Vec<AnnualSummary>> {
    ReaderBuilder::new()
        .from_reader(data)
        .deserialize()
        .collect::<Result<Vec<AnnualSummary>, _>>()
        .map_err(csv_error)
}

/// Write the summary to `gold/final_climate_fire_analysis.csv`.
pub async fn write_gold_csv(storage_root: &Path, summary: &[AnnualSummary]) -> PipelineResult<PathBuf> {
    let path = gold_csv_path(storage_root);
    let size = write_atomic(&path, &to_csv(summary)?).await?;
    info!(path = %path.display(), rows = summary.len(), size, "Wrote gold summary");
    Ok(path)
}

pub async fn read_gold_csv(storage_root: &Path) -> PipelineResult<Vec<AnnualSummary>> {
    let path = gold_csv_path(storage_root);
    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| PipelineError::Io(format!("{}: {}", path.display(), e)))?;
    parse_csv(&data)
}
