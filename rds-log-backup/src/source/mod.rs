//! The log source: listing descriptors and downloading file contents.

pub mod fetcher;
pub mod rds;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::utils::Result;
pub use fetcher::SignedLogFetcher;
pub use rds::RdsLogLister;

/// One log file as reported by the listing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFileDescriptor {
    pub name: String,
    pub size_bytes: u64,
    /// Epoch timestamp in the listing API's own unit.
    pub last_modified: u64,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub descriptors: Vec<LogFileDescriptor>,
    pub next_cursor: Option<String>,
}

impl ListingPage {
    /// The cursor for the following page, if any. An empty cursor is terminal.
    pub fn continuation(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Query applied to every page of one listing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFilter {
    pub instance_id: String,
    /// Substring the file name must contain. Empty matches everything.
    pub name_contains: String,
    pub min_size: u64,
    pub modified_since: u64,
}

/// Enumerates log files page by page.
#[async_trait]
pub trait LogFileLister: Send + Sync {
    async fn list_page(&self, filter: &ListingFilter, cursor: Option<&str>) -> Result<ListingPage>;
}

/// Downloads the raw (still compressed) contents of one log file.
///
/// Per-file problems are reported as `SyncError::DownloadFailed`.
#[async_trait]
pub trait LogFetcher: Send + Sync {
    async fn fetch(
        &self,
        descriptor: &LogFileDescriptor,
        instance_id: &str,
        region: &str,
    ) -> Result<Bytes>;
}
