//! Log file listing through the RDS `DescribeDBLogFiles` API.

use async_trait::async_trait;
use aws_sdk_rds::error::DisplayErrorContext;
use aws_sdk_rds::types::DescribeDbLogFilesDetails;
use aws_sdk_rds::Client as RdsClient;
use tracing::{debug, warn};

use super::{ListingFilter, ListingPage, LogFileDescriptor, LogFileLister};
use crate::utils::{Result, SyncError};

pub struct RdsLogLister {
    client: RdsClient,
}

impl RdsLogLister {
    pub fn new(client: RdsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogFileLister for RdsLogLister {
    async fn list_page(&self, filter: &ListingFilter, cursor: Option<&str>) -> Result<ListingPage> {
        let mut request = self
            .client
            .describe_db_log_files()
            .db_instance_identifier(&filter.instance_id)
            .file_last_written(clamp_to_i64(filter.modified_since))
            .file_size(clamp_to_i64(filter.min_size));

        if !filter.name_contains.is_empty() {
            request = request.filename_contains(&filter.name_contains);
        }
        if let Some(marker) = cursor {
            request = request.marker(marker);
        }

        let output = request
            .send()
            .await
            .map_err(|e| SyncError::ListingFailed(DisplayErrorContext(&e).to_string()))?;

        let descriptors: Vec<LogFileDescriptor> = output
            .describe_db_log_files()
            .iter()
            .filter_map(to_descriptor)
            .collect();

        debug!(
            "Listed {} log file(s) for {} (more: {})",
            descriptors.len(),
            filter.instance_id,
            output.marker().map_or(false, |m| !m.is_empty())
        );

        Ok(ListingPage {
            descriptors,
            next_cursor: output.marker().map(str::to_string),
        })
    }
}

fn to_descriptor(details: &DescribeDbLogFilesDetails) -> Option<LogFileDescriptor> {
    let Some(name) = details.log_file_name() else {
        warn!("Skipping log file entry without a name");
        return None;
    };

    Some(LogFileDescriptor {
        name: name.to_string(),
        size_bytes: clamp_to_u64(details.size().unwrap_or(0)),
        last_modified: clamp_to_u64(details.last_written().unwrap_or(0)),
    })
}

fn clamp_to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
