use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by webtrack.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// A log file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The log path given on the command line does not exist.
    #[error("Log path not found: {0}")]
    LogPathNotFound(PathBuf),

    /// No log files were found under the given directory.
    #[error("No log files found in {0}")]
    NoLogFiles(PathBuf),

    /// An event status integer outside `{0, 1, 2}`.
    #[error("Invalid event status: {0}")]
    InvalidStatus(i64),

    /// A log line did not yield the five `timestamp:userid:tabid:url:status` fields.
    #[error("Malformed log line: {0}")]
    MalformedLine(String),

    /// An internal invariant was violated (e.g. a session with no events).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A report could not be serialised to JSON.
    #[error("Failed to serialize JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the webtrack crates.
pub type Result<T> = std::result::Result<T, TrackerError>;
