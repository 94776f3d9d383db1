//! Error types shared by the pipeline crates.

use thiserror::Error;

/// Result type alias using PipelineError.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// How the stage boundary should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth another attempt: either a stage retry now or the next scheduled run.
    Retryable,
    /// Every further attempt would fail the same way.
    Fatal,
}

/// Primary error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    // === Configuration Errors ===
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    // === Provider Errors ===
    #[error("Provider rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Provider request failed{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Provider { status: Option<u16>, message: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    // === Storage Errors ===
    #[error("Fetch ledger error: {0}")]
    Ledger(String),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(String),

    // === Data Errors ===
    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    // === Control Flow ===
    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Classify this error for retry decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::Config(_)
            | PipelineError::MissingCredential(_)
            | PipelineError::Unauthorized(_)
            | PipelineError::Cancelled => ErrorClass::Fatal,

            PipelineError::Provider { .. }
            | PipelineError::MalformedResponse(_)
            | PipelineError::Ledger(_)
            | PipelineError::Storage(_)
            | PipelineError::Database(_)
            | PipelineError::Io(_)
            | PipelineError::Parse { .. } => ErrorClass::Retryable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }

    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Parse {
            what: what.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::Config(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_and_config_errors_are_fatal() {
        assert!(PipelineError::Unauthorized("Map Key not found".into()).is_fatal());
        assert!(PipelineError::MissingCredential("NASA_API_KEY".into()).is_fatal());
        assert!(PipelineError::Config("bad range".into()).is_fatal());
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        let err = PipelineError::Provider {
            status: Some(503),
            message: "service unavailable".into(),
        };
        assert_eq!(err.class(), ErrorClass::Retryable);
        assert_eq!(
            PipelineError::Ledger("database is locked".into()).class(),
            ErrorClass::Retryable
        );
    }

    #[test]
    fn test_provider_error_display_includes_status() {
        let err = PipelineError::Provider {
            status: Some(429),
            message: "too many requests".into(),
        };
        assert_eq!(
            err.to_string(),
            "Provider request failed (HTTP 429): too many requests"
        );

        let err = PipelineError::Provider {
            status: None,
            message: "timed out".into(),
        };
        assert_eq!(err.to_string(), "Provider request failed: timed out");
    }
}
