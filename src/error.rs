//! Error kinds raised by the pipeline stages.
//!
//! Which of these abort a run and which are logged and skipped is decided by
//! the caller: the integrator skips failed sources, the cleaner records failed
//! coercions, and the analysis runner keeps going after a failed report.

use thiserror::Error;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to acquire {source_name}: {reason}")]
    Acquisition { source_name: String, reason: String },

    #[error("integration failed: {0}")]
    Integration(String),

    #[error("{stage}: missing required columns {missing:?}")]
    Schema { stage: String, missing: Vec<String> },

    #[error("{report}: table must contain columns {missing:?}")]
    Validation { report: String, missing: Vec<String> },

    #[error("cannot convert column '{column}' to {expected}: {reason}")]
    Conversion {
        column: String,
        expected: String,
        reason: String,
    },

    #[error("invalid value: {0}")]
    Value(String),

    #[error("could not find data file at {0}")]
    NotFound(String),

    #[error("the data file {0} is empty")]
    EmptyInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),
}

impl PipelineError {
    pub fn acquisition(source_name: &str, reason: impl ToString) -> Self {
        PipelineError::Acquisition {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn schema(stage: &str, missing: Vec<String>) -> Self {
        PipelineError::Schema {
            stage: stage.to_string(),
            missing,
        }
    }

    pub fn validation(report: &str, missing: Vec<String>) -> Self {
        PipelineError::Validation {
            report: report.to_string(),
            missing,
        }
    }
}
