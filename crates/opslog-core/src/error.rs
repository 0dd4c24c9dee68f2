//! Error types for the ops logging core

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for stack trace processing
#[derive(Error, Debug)]
pub enum OpsLogError {
    /// Writing an archive file failed for a reason other than a lost creation race
    #[error("Failed to archive stack trace to {path:?}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Processor configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An archive path could not be expressed as a file URI
    #[error("Cannot build a file URI for {0:?}")]
    InvalidLocator(PathBuf),
}

/// Result type alias using OpsLogError
pub type OpsResult<T> = Result<T, OpsLogError>;
