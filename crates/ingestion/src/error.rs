//! Error types for the ingestion crate.

use climate_common::{ErrorClass, PipelineError};
use thiserror::Error;

/// Errors that can occur while fetching, parsing or loading partitions.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column '{0}'")]
    MissingColumn(String),
}

impl IngestionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            IngestionError::Pipeline(e) => e.class(),
            _ => ErrorClass::Retryable,
        }
    }
}

impl From<IngestionError> for PipelineError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::Pipeline(e) => e,
            IngestionError::FileRead(e) => PipelineError::Io(e.to_string()),
            IngestionError::Csv(e) => PipelineError::parse("CSV", e.to_string()),
            IngestionError::MissingColumn(c) => {
                PipelineError::parse("CSV", format!("missing column '{}'", c))
            }
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_class_is_preserved() {
        let err = IngestionError::from(PipelineError::Unauthorized("bad key".into()));
        assert_eq!(err.class(), ErrorClass::Fatal);
        assert!(PipelineError::from(err).is_fatal());
    }

    #[test]
    fn test_missing_column_maps_to_parse() {
        let err: PipelineError = IngestionError::MissingColumn("J-D".into()).into();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }
}
