// /src/errors.rs
//! Error types for the reconciliation core. Nothing here is fatal to the process:
//! callers either absorb these or surface them as a non-blocking notice.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("Edit {op} targets position {position} but the list holds {len} rows")]
    EditOutOfBounds {
        op: &'static str,
        position: usize,
        len: usize,
    },

    #[error("Failed to read settings from '{}': {source}", path.display())]
    SettingsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings document must be a JSON object, got {actual}")]
    SettingsShape { actual: String },

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Diff worker stopped before delivering a result")]
    WorkerClosed,

    #[error("Diff for generation {generation} failed: {reason}")]
    DiffFailed { generation: u64, reason: String },

    #[error("No tokio runtime available to host the diff worker: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Returned by the diff engine when its cancellation token fires mid-computation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("diff computation abandoned after a newer submission")]
pub struct DiffAborted;

/// Bounds check used by edit-script replay.
pub(crate) fn check_position(
    op: &'static str,
    position: usize,
    len: usize,
) -> Result<(), ReconcilerError> {
    if position < len {
        Ok(())
    } else {
        Err(ReconcilerError::EditOutOfBounds { op, position, len })
    }
}
