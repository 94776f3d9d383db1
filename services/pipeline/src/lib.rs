//! Runner for the wildfire/climate pipeline.
//!
//! - [`config`] loads `config/pipeline.yaml`
//! - [`executor`] runs the stage graph with per-stage retry
//! - [`stages`] implements each stage on top of the ingestion and storage crates
//! - [`export`] and [`chart`] produce the gold outputs

pub mod chart;
pub mod config;
pub mod executor;
pub mod export;
pub mod stages;

pub use config::PipelineConfig;
pub use executor::{Executor, RetryPolicy, RunReport, Stage, StageReport, StageRunner, StageStatus};
pub use stages::PipelineStages;
