//! Typed input of one backup run.
//!
//! The command line and the JSON trigger payload are two adapters over
//! [`SyncRequest`]; the engine never sees either form.

use serde::{Deserialize, Serialize};

use crate::utils::{Result, SyncError};

/// What to copy and where to put it.
///
/// Field names on the wire match the scheduler trigger payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(rename = "rds_instance_name")]
    pub instance_name: String,

    #[serde(rename = "s3_bucket_name")]
    pub bucket_name: String,

    #[serde(rename = "aws_region", alias = "region")]
    pub region: String,

    /// Only files whose name contains this string are listed.
    #[serde(rename = "log_prefix", default)]
    pub name_prefix: String,

    /// Minimum file size in bytes. Ignored on the first run.
    #[serde(default)]
    pub min_size: u64,
}

impl SyncRequest {
    pub fn new(
        instance_name: impl Into<String>,
        bucket_name: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            instance_name: instance_name.into(),
            bucket_name: bucket_name.into(),
            region: region.into(),
            name_prefix: String::new(),
            min_size: 0,
        }
    }

    pub fn with_name_prefix(mut self, name_prefix: impl Into<String>) -> Self {
        self.name_prefix = name_prefix.into();
        self
    }

    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    /// Parse a trigger payload such as
    /// `{"rds_instance_name": "db", "s3_bucket_name": "logs", "aws_region": "eu-west-1"}`.
    pub fn from_event_json(payload: &str) -> Result<Self> {
        let request: SyncRequest = serde_json::from_str(payload)?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("rds_instance_name", &self.instance_name),
            ("s3_bucket_name", &self.bucket_name),
            ("aws_region", &self.region),
        ] {
            if value.trim().is_empty() {
                return Err(SyncError::InvalidRequest(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}
