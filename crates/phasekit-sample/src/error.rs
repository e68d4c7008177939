//! Controller error types.

use std::path::PathBuf;

use thiserror::Error;

/// Controller error type.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("SimPoint start list is empty")]
    EmptySimPoints,

    #[error("SimPoint starts must be ascending (index {index}: {next} after {prev})")]
    UnsortedSimPoints { index: usize, prev: u64, next: u64 },

    #[error("invalid sampling parameters: {0}")]
    InvalidParams(String),

    #[error("checkpoint {} failed: {source}", path.display())]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sample log {} I/O error: {source}", path.display())]
    LogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sample log JSON error: {0}")]
    LogJson(#[from] serde_json::Error),

    #[error("sample log {} is not a JSON object", .0.display())]
    MalformedLog(PathBuf),
}
