//! Pipeline error types
//!
//! Only fatal conditions live here: missing configuration, unreadable session
//! data, an empty training set, or a report that fails schema validation.
//! Recoverable conditions (weather fallback, unmapped drivers or teams) are
//! handled at the component boundary and never surface as errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("race config not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("failed to parse race config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("session data file not found: {0}")]
    SessionNotFound(PathBuf),

    #[error("failed to read session data: {0}")]
    Session(#[from] polars::error::PolarsError),

    #[error("required column missing from session data: {0}")]
    MissingColumn(String),

    #[error("no drivers overlap between qualifying entries and training data")]
    NoTrainingOverlap,

    #[error("not enough training rows to fit a model: got {0}, need at least 2")]
    InsufficientTrainingData(usize),

    #[error("prediction report failed schema validation: {0}")]
    SchemaValidation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::NoTrainingOverlap;
        assert!(err.to_string().contains("no drivers overlap"));

        let err = PipelineError::MissingColumn("LapTime".to_string());
        assert!(err.to_string().contains("LapTime"));
    }
}
