use std::path::PathBuf;

/// Result alias used throughout the library, wrapping [`SortError`].
pub type Result<T> = std::result::Result<T, SortError>;

/// Boxed cause carried by errors that wrap a failure from another layer.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every way a sort can fail. None of them are retried: each one aborts the run.
#[derive(thiserror::Error, Debug)]
pub enum SortError {
    /// The input could not be opened or its compression could not be detected.
    #[error("Failed to open input {path}: {source}")]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// A chunk artifact (or the directory holding chunks) could not be created,
    /// written, or flushed.
    #[error("Failed to write chunk {index} at {path}: {source}")]
    ChunkWrite {
        index: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A chunk artifact was missing or corrupted when read back during a merge.
    #[error("Failed to read chunk {index} at {path}: {source}")]
    ChunkRead {
        index: usize,
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// The record parser rejected the input.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// The final output could not be created or written.
    #[error("Failed to write output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
