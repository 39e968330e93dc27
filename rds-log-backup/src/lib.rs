//! RDS log backup library
//!
//! Incrementally copies database log files from an RDS instance into an S3
//! bucket, resuming from a watermark persisted next to the copies.

pub mod cli;
pub mod config;
pub mod destination;
pub mod executor;
pub mod invocation;
pub mod signing;
pub mod source;
pub mod transfer;
pub mod utils;
pub mod watermark;

// Re-export commonly used types
pub use config::Config;
pub use executor::{SyncEngine, SyncEvent, SyncSummary};
pub use invocation::SyncRequest;
pub use utils::errors::SyncError;
