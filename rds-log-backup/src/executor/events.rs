//! Structured events describing a backup run as it happens.

use serde::{Deserialize, Serialize};

/// Events published by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SyncEvent {
    /// Destination checked and watermark loaded
    #[serde(rename = "sync:started")]
    SyncStarted {
        instance: String,
        bucket: String,
        run_prefix: String,
        prior_watermark: Option<u64>,
        min_size: u64,
    },

    /// No watermark found; everything will be listed
    #[serde(rename = "sync:first_run")]
    FirstRun { instance: String },

    #[serde(rename = "sync:page")]
    PageListed {
        page: usize,
        descriptors: usize,
        has_more: bool,
    },

    #[serde(rename = "file:copied")]
    FileCopied {
        file_number: usize,
        filename: String,
        key: String,
        size_bytes: u64,
        compressed_bytes: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        size_difference_percent: Option<i64>,
    },

    /// Download failed; the run continues with the next file
    #[serde(rename = "file:failed")]
    FileFailed {
        file_number: usize,
        filename: String,
        error: String,
    },

    #[serde(rename = "watermark:committed")]
    WatermarkCommitted { key: String, value: u64 },

    #[serde(rename = "watermark:commit_failed")]
    WatermarkCommitFailed { key: String, error: String },

    #[serde(rename = "sync:completed")]
    SyncCompleted {
        copied: usize,
        failed: usize,
        observed: usize,
        watermark: Option<u64>,
    },

    #[serde(rename = "sync:aborted")]
    SyncAborted { error: String },
}
