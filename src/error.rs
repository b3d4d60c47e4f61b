use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the conversion pipeline.
///
/// Public entry points return `anyhow::Result`; these are the typed causes
/// underneath, so callers can `downcast_ref::<MeltError>()` when they need to
/// tell a missing input apart from a bad configuration.
#[derive(Debug, Error)]
pub enum MeltError {
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to write table '{table}' to {}", .path.display())]
    TableWrite {
        table: String,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
