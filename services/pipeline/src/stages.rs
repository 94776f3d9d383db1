//! Stage bodies backed by the real ledger, providers and warehouse.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use climate_common::{DatasetKind, PipelineResult};
use ingestion::{write_clean_file, HttpProvider, Loader, Provider, Synchronizer};
use storage::{paths, FetchLedger, PgWarehouse, Warehouse};

use crate::chart;
use crate::config::PipelineConfig;
use crate::executor::{Stage, StageRunner};
use crate::export;

pub struct PipelineStages {
    config: PipelineConfig,
    ledger: Arc<dyn FetchLedger>,
    warehouse: OnceCell<Arc<dyn Warehouse>>,
    providers: HashMap<DatasetKind, Arc<dyn Provider>>,
    current_year: i32,
}

impl PipelineStages {
    /// Providers are built from the config and the warehouse is connected on
    /// first use, so fetch-only runs never touch Postgres.
    pub fn new(config: PipelineConfig, ledger: Arc<dyn FetchLedger>) -> Self {
        Self {
            config,
            ledger,
            warehouse: OnceCell::new(),
            providers: HashMap::new(),
            current_year: Utc::now().year(),
        }
    }

    pub fn with_warehouse(self, warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            warehouse: OnceCell::new_with(Some(warehouse)),
            ..self
        }
    }

    pub fn with_provider(mut self, kind: DatasetKind, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    /// Year used to key the temperature snapshot and open-ended ranges.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    async fn warehouse(&self) -> PipelineResult<Arc<dyn Warehouse>> {
        let warehouse = self
            .warehouse
            .get_or_try_init(|| async {
                let pg = PgWarehouse::connect(&self.config.database_url).await?;
                Ok::<Arc<dyn Warehouse>, climate_common::PipelineError>(Arc::new(pg))
            })
            .await?;
        Ok(warehouse.clone())
    }

    fn provider(&self, kind: DatasetKind) -> PipelineResult<Arc<dyn Provider>> {
        match self.providers.get(&kind) {
            Some(provider) => Ok(provider.clone()),
            None => Ok(Arc::new(HttpProvider::new(self.config.source(kind).clone())?)),
        }
    }

    pub async fn fetch(&self, kind: DatasetKind, cancel: &CancellationToken) -> PipelineResult<String> {
        let source = self.config.source(kind).clone();
        let range = source.year_range(self.current_year);
        let provider = self.provider(kind)?;

        let sync = Synchronizer::new(
            source,
            &self.config.storage_root,
            provider,
            self.ledger.clone(),
        );
        let report = sync.run(range, cancel).await?.into_stage_result()?;

        for failure in &report.failures {
            warn!(partition = %failure.partition, error = %failure.error, "Left for the next run");
        }

        if kind == DatasetKind::Temperature {
            self.clean_temperatures().await?;
        }

        Ok(format!(
            "{} fetched, {} empty, {} already present, {} failed",
            report.fetched.len(),
            report.confirmed_empty.len(),
            report.already_fetched,
            report.failures.len()
        ))
    }

    /// Refresh the cleaned table next to the latest temperature snapshot.
    async fn clean_temperatures(&self) -> PipelineResult<()> {
        let Some(record) = self.ledger.latest(DatasetKind::Temperature).await? else {
            return Ok(());
        };
        let raw = paths::resolve(&self.config.storage_root, &record.location);
        write_clean_file(&raw).await?;
        Ok(())
    }

    pub async fn load(&self) -> PipelineResult<String> {
        let loader = Loader::new(
            &self.config.storage_root,
            self.ledger.clone(),
            self.warehouse().await?,
        );
        let report = loader.load().await?;

        for failure in &report.failures {
            warn!(location = %failure.location, error = %failure.error, "File not loaded");
        }

        Ok(format!(
            "{} temperature rows, {} fire rows from {} files, {} files failed",
            report.temperature_rows.unwrap_or(0),
            report.fire_rows,
            report.fire_files_loaded,
            report.failures.len()
        ))
    }

    pub async fn transform(&self) -> PipelineResult<String> {
        let warehouse = self.warehouse().await?;
        let rows = warehouse.rebuild_summary().await?;
        let summary = warehouse.read_summary().await?;
        let path = export::write_gold_csv(&self.config.storage_root, &summary).await?;
        info!(rows, path = %path.display(), "Summary rebuilt");
        Ok(format!("{} summary rows", rows))
    }

    pub async fn visualize(&self) -> PipelineResult<String> {
        let summary = export::read_gold_csv(&self.config.storage_root).await?;
        let path = chart::write_chart(&self.config.storage_root, &summary).await?;
        Ok(format!("chart at {}", path.display()))
    }
}

#[async_trait]
impl StageRunner for PipelineStages {
    async fn run_stage(&self, stage: Stage, cancel: &CancellationToken) -> PipelineResult<String> {
        match stage {
            Stage::FetchTemperature => self.fetch(DatasetKind::Temperature, cancel).await,
            Stage::FetchFires => self.fetch(DatasetKind::Fire, cancel).await,
            Stage::Load => self.load().await,
            Stage::Transform => self.transform().await,
            Stage::Visualize => self.visualize().await,
        }
    }
}
