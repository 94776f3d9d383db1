//! Common types shared across the wildfire/climate pipeline crates.

pub mod config;
pub mod error;
pub mod partition;
pub mod records;
pub mod summary;

pub use config::SourceConfig;
pub use error::{ErrorClass, PipelineError, PipelineResult};
pub use partition::{DatasetKind, Partition, YearRange};
pub use records::{AnnualSummary, FetchRecord, FireRow, TemperatureRow};
pub use summary::{summarize, SUMMARY_MIN_YEAR};
