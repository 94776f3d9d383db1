//! Incremental ingestion for the climate pipeline.
//!
//! # Architecture
//!
//! - [`planner`] compares the fetch ledger with a year range
//! - [`sync::Synchronizer`] fetches missing partitions through a [`provider::Provider`],
//!   throttled, writing each file atomically before recording it
//! - [`loader::Loader`] reads ledger-listed files into the warehouse
//! - [`temperature`] and [`fires`] parse the upstream CSV formats

pub mod error;
pub mod files;
pub mod fires;
pub mod loader;
pub mod planner;
pub mod provider;
pub mod sync;
pub mod temperature;
pub mod throttle;

// Re-exports
pub use error::{IngestionError, Result};
pub use fires::{parse_firms, FireBatch};
pub use loader::{FileFailure, LoadReport, Loader};
pub use planner::{plan, SyncPlan};
pub use provider::{
    classify_response, header_column, FetchOutcome, HttpProvider, Provider, ProviderResponse,
};
pub use sync::{PartitionFailure, SyncReport, Synchronizer};
pub use temperature::{parse_gistemp, write_clean_file};
pub use throttle::Throttle;
