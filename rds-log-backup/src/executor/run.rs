//! State owned by a single backup run.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::source::LogFileDescriptor;
use crate::transfer::progress::TransferStats;

/// Timestamp layout inside the run prefix, e.g. `2024-01-15T10:30:00.000000`.
const RUN_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Phases of the sync state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initializing,
    Listing,
    Copying,
    Finalizing,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Initializing => "initializing",
            RunState::Listing => "listing",
            RunState::Copying => "copying",
            RunState::Finalizing => "finalizing",
            RunState::Done => "done",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// A file whose download failed during the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub filename: String,
    pub cause: String,
}

/// Destination namespace for one run: `{instance}/backup_{timestamp}/`.
pub fn run_prefix(instance: &str, started_at: DateTime<Utc>) -> String {
    format!(
        "{}/backup_{}/",
        instance,
        started_at.format(RUN_TIMESTAMP_FORMAT)
    )
}

/// Counters and the candidate watermark of one invocation.
///
/// Only the sync engine mutates this; nothing is shared between runs.
#[derive(Debug)]
pub struct BackupRun {
    pub instance: String,
    pub started_at: DateTime<Utc>,
    pub prefix: String,
    pub prior_watermark: Option<u64>,
    pub observed: usize,
    pub failed: Vec<FailedFile>,
    pub stats: TransferStats,
    candidate_watermark: u64,
    state: RunState,
}

impl BackupRun {
    pub fn new(instance: &str, started_at: DateTime<Utc>, prior_watermark: Option<u64>) -> Self {
        Self {
            instance: instance.to_string(),
            started_at,
            prefix: run_prefix(instance, started_at),
            prior_watermark,
            observed: 0,
            failed: Vec::new(),
            stats: TransferStats::new(),
            candidate_watermark: prior_watermark.unwrap_or(0),
            state: RunState::Initializing,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn transition(&mut self, next: RunState) {
        if self.state != next {
            debug!("Run {}: {} -> {}", self.prefix, self.state, next);
            self.state = next;
        }
    }

    /// Destination key for a copied log file.
    pub fn object_key(&self, filename: &str) -> String {
        format!("{}{}.gz", self.prefix, filename)
    }

    /// Account for a listed file before any attempt to copy it.
    ///
    /// The candidate moves past the file even if the copy later fails, so a
    /// permanently broken file is not listed again on every run.
    pub fn observe(&mut self, descriptor: &LogFileDescriptor) {
        self.observed += 1;
        self.candidate_watermark = self
            .candidate_watermark
            .max(descriptor.last_modified.saturating_add(1));
    }

    pub fn record_failure(&mut self, filename: &str, cause: String) {
        self.failed.push(FailedFile {
            filename: filename.to_string(),
            cause,
        });
    }

    pub fn candidate_watermark(&self) -> u64 {
        self.candidate_watermark
    }

    /// The value to persist at the end of the run, if there is anything to record.
    pub fn watermark_to_commit(&self) -> Option<u64> {
        (self.candidate_watermark > 0).then_some(self.candidate_watermark)
    }

    pub fn into_summary(self, watermark_committed: bool) -> SyncSummary {
        SyncSummary {
            watermark: self.watermark_to_commit(),
            elapsed: self.stats.elapsed(),
            run_prefix: self.prefix,
            copied: self.stats.files_copied,
            observed: self.observed,
            failed: self.failed,
            prior_watermark: self.prior_watermark,
            watermark_committed,
            listed_bytes: self.stats.listed_bytes,
            transferred_bytes: self.stats.transferred_bytes,
        }
    }
}

/// Outcome of a run that was not aborted.
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub run_prefix: String,
    pub copied: usize,
    /// Descriptors seen, copied or not
    pub observed: usize,
    pub failed: Vec<FailedFile>,
    pub prior_watermark: Option<u64>,
    /// Watermark this run tried to persist
    pub watermark: Option<u64>,
    /// False when persisting `watermark` failed; the next run resumes
    /// from `prior_watermark` and may copy some files again.
    pub watermark_committed: bool,
    pub listed_bytes: u64,
    pub transferred_bytes: u64,
    pub elapsed: Duration,
}
