//! Utility modules for the log backup tool.

pub mod errors;
pub mod logger;

pub use errors::{Result, SyncError};
