//! Incremental partition sync: plan, fetch, write, record.

use std::path::PathBuf;
use std::sync::Arc;

use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use climate_common::{
    ErrorClass, FetchRecord, Partition, PipelineError, PipelineResult, SourceConfig, YearRange,
};
use storage::{paths, FetchLedger};

use crate::files::write_atomic;
use crate::planner::plan;
use crate::provider::{classify_response, header_column, FetchOutcome, Provider};
use crate::throttle::Throttle;

/// A partition that did not make it into the ledger this run.
#[derive(Debug)]
pub struct PartitionFailure {
    pub partition: Partition,
    pub error: PipelineError,
}

impl PartitionFailure {
    pub fn class(&self) -> ErrorClass {
        self.error.class()
    }
}

/// What one sync run did.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub planned: usize,
    pub already_fetched: usize,
    pub fetched: Vec<Partition>,
    /// Header-only responses recorded as terminal.
    pub confirmed_empty: Vec<Partition>,
    /// Header-only responses left for a later run.
    pub skipped_empty: Vec<Partition>,
    /// Retryable per-partition failures; the run continued past them.
    pub failures: Vec<PartitionFailure>,
    /// Fatal failure that stopped the run.
    pub aborted: Option<PartitionFailure>,
    pub cancelled: bool,
}

impl SyncReport {
    /// Partitions newly recorded in the ledger.
    pub fn recorded(&self) -> usize {
        self.fetched.len() + self.confirmed_empty.len()
    }

    /// Map the run to a stage outcome: a fatal abort or a cancellation is an
    /// error, anything else (including isolated failures) is success.
    pub fn into_stage_result(mut self) -> PipelineResult<SyncReport> {
        if let Some(aborted) = self.aborted.take() {
            return Err(aborted.error);
        }
        if self.cancelled {
            return Err(PipelineError::Cancelled);
        }
        Ok(self)
    }
}

enum Step {
    Fetched,
    ConfirmedEmpty,
    SkippedEmpty,
}

/// Keeps one source's partitions in step with the ledger.
pub struct Synchronizer {
    source: SourceConfig,
    storage_root: PathBuf,
    provider: Arc<dyn Provider>,
    ledger: Arc<dyn FetchLedger>,
}

impl Synchronizer {
    pub fn new(
        source: SourceConfig,
        storage_root: impl Into<PathBuf>,
        provider: Arc<dyn Provider>,
        ledger: Arc<dyn FetchLedger>,
    ) -> Self {
        Self {
            source,
            storage_root: storage_root.into(),
            provider,
            ledger,
        }
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    /// Fetch every partition in `range` that the ledger does not have.
    ///
    /// Partitions are processed one at a time in ascending year. Cancellation
    /// is honored before each request, including during the throttle wait,
    /// never during a write. Planning errors are returned; per-partition
    /// outcomes are in the report.
    #[instrument(skip(self, cancel), fields(kind = %self.source.kind, range = %range))]
    pub async fn run(
        &self,
        range: YearRange,
        cancel: &CancellationToken,
    ) -> PipelineResult<SyncReport> {
        let plan = plan(self.source.kind, range, self.ledger.as_ref()).await?;
        let mut report = SyncReport {
            planned: plan.len(),
            already_fetched: plan.already_fetched,
            ..Default::default()
        };

        if plan.is_empty() {
            info!(already_fetched = plan.already_fetched, "Nothing to fetch");
            return Ok(report);
        }

        let mut throttle = Throttle::new(self.source.request_interval());
        for partition in plan.partitions {
            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = throttle.wait() => false,
            };
            if cancelled {
                warn!(next = %partition, "Sync cancelled");
                report.cancelled = true;
                break;
            }

            match self.sync_partition(partition).await {
                Ok(Step::Fetched) => report.fetched.push(partition),
                Ok(Step::ConfirmedEmpty) => report.confirmed_empty.push(partition),
                Ok(Step::SkippedEmpty) => report.skipped_empty.push(partition),
                Err(e) if e.is_fatal() => {
                    error!(partition = %partition, error = %e, "Fatal error, aborting sync");
                    counter!("partitions_failed_total", "kind" => self.source.kind.as_str())
                        .increment(1);
                    report.aborted = Some(PartitionFailure {
                        partition,
                        error: e,
                    });
                    break;
                }
                Err(e) => {
                    warn!(partition = %partition, error = %e, "Partition failed, continuing");
                    counter!("partitions_failed_total", "kind" => self.source.kind.as_str())
                        .increment(1);
                    report.failures.push(PartitionFailure {
                        partition,
                        error: e,
                    });
                }
            }
        }

        info!(
            fetched = report.fetched.len(),
            confirmed_empty = report.confirmed_empty.len(),
            skipped_empty = report.skipped_empty.len(),
            failed = report.failures.len(),
            aborted = report.aborted.is_some(),
            cancelled = report.cancelled,
            "Sync finished"
        );
        Ok(report)
    }

    async fn sync_partition(&self, partition: Partition) -> PipelineResult<Step> {
        let response = self.provider.fetch(&partition).await?;
        let outcome = classify_response(
            response,
            &self.source.error_markers,
            header_column(self.source.kind),
        )?;

        let step = match &outcome {
            FetchOutcome::Data(_) => Step::Fetched,
            FetchOutcome::ConfirmedEmpty(_) if self.source.accept_confirmed_empty => {
                Step::ConfirmedEmpty
            }
            FetchOutcome::ConfirmedEmpty(_) => {
                info!(partition = %partition, "Provider has no rows, will retry next run");
                return Ok(Step::SkippedEmpty);
            }
        };

        let location = paths::partition_location(&partition, &self.source.file_name(&partition));
        let path = paths::resolve(&self.storage_root, &location);
        let size = write_atomic(&path, outcome.body()).await?;

        let record = FetchRecord::new(partition, location, size);
        if !self.ledger.record(&record).await? {
            warn!(partition = %partition, "Ledger already had a record, kept the existing one");
        }

        counter!("partitions_fetched_total", "kind" => self.source.kind.as_str()).increment(1);
        info!(partition = %partition, path = %path.display(), size, "Fetched partition");
        Ok(step)
    }
}
