//! Which partitions still need fetching.

use tracing::{debug, instrument};

use climate_common::{DatasetKind, Partition, PipelineResult, YearRange};
use storage::FetchLedger;

/// Partitions to fetch, ascending by year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub partitions: Vec<Partition>,
    /// Partitions in range that already have a ledger record.
    pub already_fetched: usize,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }
}

/// Compare the ledger with `range` and list the partitions without a record.
///
/// A failed ledger lookup aborts planning; it is never read as "missing".
#[instrument(skip(ledger), fields(kind = %kind, range = %range))]
pub async fn plan(
    kind: DatasetKind,
    range: YearRange,
    ledger: &dyn FetchLedger,
) -> PipelineResult<SyncPlan> {
    let mut plan = SyncPlan::default();
    for partition in range.partitions(kind) {
        if ledger.has(&partition).await? {
            plan.already_fetched += 1;
        } else {
            plan.partitions.push(partition);
        }
    }

    debug!(
        pending = plan.partitions.len(),
        already_fetched = plan.already_fetched,
        "Planned sync"
    );
    Ok(plan)
}
