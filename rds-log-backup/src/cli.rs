//! Command line surface.

use std::path::PathBuf;

use clap::Parser;
use tokio::io::AsyncReadExt;

use crate::invocation::SyncRequest;
use crate::utils::{Result, SyncError};

/// Copy RDS log files to S3, resuming where the previous run stopped.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The RDS instance name
    #[arg(long, required_unless_present = "event", conflicts_with = "event")]
    pub rds_instance_name: Option<String>,

    /// The S3 bucket name
    #[arg(long, required_unless_present = "event", conflicts_with = "event")]
    pub s3_bucket_name: Option<String>,

    /// The AWS region
    #[arg(long, required_unless_present = "event", conflicts_with = "event")]
    pub aws_region: Option<String>,

    /// Filter logs with this prefix
    #[arg(long, default_value = "", conflicts_with = "event")]
    pub log_prefix: String,

    /// Filters logs less than the specified size in bytes
    #[arg(long, default_value_t = 0, conflicts_with = "event")]
    pub min_size: u64,

    /// Read the run parameters from a JSON trigger payload ('-' for stdin)
    #[arg(long, value_name = "FILE")]
    pub event: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Print the sync event stream to stdout as JSON lines
    #[arg(long)]
    pub json_events: bool,
}

impl Cli {
    /// Resolve the run parameters from flags or the trigger payload.
    pub async fn request(&self) -> Result<SyncRequest> {
        if let Some(path) = &self.event {
            let payload = if path.as_os_str() == "-" {
                let mut payload = String::new();
                tokio::io::stdin().read_to_string(&mut payload).await?;
                payload
            } else {
                tokio::fs::read_to_string(path).await?
            };
            return SyncRequest::from_event_json(&payload);
        }

        let required = |value: &Option<String>, flag: &str| {
            value
                .clone()
                .ok_or_else(|| SyncError::InvalidRequest(format!("--{} is required", flag)))
        };

        let request = SyncRequest::new(
            required(&self.rds_instance_name, "rds-instance-name")?,
            required(&self.s3_bucket_name, "s3-bucket-name")?,
            required(&self.aws_region, "aws-region")?,
        )
        .with_name_prefix(self.log_prefix.clone())
        .with_min_size(self.min_size);

        request.validate()?;
        Ok(request)
    }
}
