// error.rs — Error types for the audit subsystem.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during audit operations.
///
/// `Capacity` is the only error `AuditTrail::append` can return, and the
/// decision engine treats it as an observability degradation — it never
/// fails the evaluation that triggered the append.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The trail cannot hold any entry (zero capacity or exhausted storage).
    #[error("audit trail capacity exhausted: {message}")]
    Capacity { message: String },

    /// Failed to open or create a JSONL sink file.
    #[error("failed to open audit sink at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write to a JSONL sink.
    #[error("failed to write audit record: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// Failed to serialize or deserialize an audit record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A JSONL sink file's hash chain is broken.
    #[error("integrity check failed at line {line}: expected hash {expected}, got {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },
}
