//! Error taxonomy for a log backup run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Destination bucket {bucket} unavailable: {reason}")]
    DestinationUnavailable { bucket: String, reason: String },

    #[error("Credentials unavailable: {0}")]
    CredentialsUnavailable(String),

    #[error("Download of {filename} failed: {cause}")]
    DownloadFailed { filename: String, cause: String },

    #[error("Error writing object {key} to destination: {reason}")]
    DestinationWriteFailed { key: String, reason: String },

    #[error("Error writing watermark {key}: {reason}")]
    WatermarkPersistFailed { key: String, reason: String },

    #[error("Unable to read watermark {key}: {reason}")]
    WatermarkUnreadable { key: String, reason: String },

    #[error("Log file listing failed: {0}")]
    ListingFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether this error must abort the run.
    ///
    /// Download failures are isolated to a single file and a failed watermark
    /// commit leaves already-copied files valid; everything else unwinds.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SyncError::DownloadFailed { .. } | SyncError::WatermarkPersistFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
