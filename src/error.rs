//! Typed failures raised by the pipeline stages.
//!
//! Row-level validation problems are not errors: the cleaner counts them in a
//! [`DropSummary`](crate::cleaner::DropSummary) and moves on. Only the cases
//! below abort a run.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to read incident source {path:?}: {reason}")]
    SourceRead { path: PathBuf, reason: String },

    #[error("Casualty total overflowed in table '{table}' at key {key}")]
    AggregationOverflow { table: &'static str, key: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub(crate) fn source_read(path: &std::path::Path, reason: impl Into<String>) -> Self {
        PipelineError::SourceRead {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(table: &'static str, key: impl std::fmt::Display) -> Self {
        PipelineError::AggregationOverflow {
            table,
            key: key.to_string(),
        }
    }
}
