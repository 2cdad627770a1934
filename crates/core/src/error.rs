//! Error types for doc-to-jpg conversion.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the doc-to-jpg library.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// A conversion parameter is outside its accepted domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Ghostscript is not installed or not found in PATH.
    #[error("Ghostscript not found. Please install Ghostscript and ensure 'gs' is in PATH")]
    GhostscriptNotFound,

    /// The renderer process failed to start.
    #[error("Failed to start Ghostscript process: {0}")]
    ProcessStartFailed(std::io::Error),

    /// The renderer reported failure for a document.
    #[error("Conversion failed for '{path}': {message}")]
    ConversionFailed { path: PathBuf, message: String },

    /// The renderer did not finish in time.
    #[error("Conversion timed out after {timeout_secs} seconds for '{path}'")]
    Timeout { path: PathBuf, timeout_secs: u64 },

    /// Input file not found.
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// A source directory vanished or never existed.
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Renumbering would overwrite an existing page file.
    #[error("Cannot rename '{from}' to '{to}': destination already exists")]
    RenameCollision { from: PathBuf, to: PathBuf },

    /// Filesystem error while walking, renaming or deleting.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Pool shutdown.
    #[error("Converter pool has been shut down")]
    PoolShutdown,

    /// The batch was cancelled between files.
    #[error("Conversion cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Channel communication error.
    #[error("Internal channel error: {0}")]
    ChannelError(String),
}

impl ConversionError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConversionError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, ConversionError>;

impl From<async_channel::RecvError> for ConversionError {
    fn from(_: async_channel::RecvError) -> Self {
        ConversionError::ChannelError("Channel closed".to_string())
    }
}
