//! Destination object store.

pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use s3::S3ObjectStore;

/// Errors reported by the destination store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Bucket or key does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bucket exists but cannot be accessed with the current credentials.
    #[error("access error: {0}")]
    AccessError(String),

    #[error("{0}")]
    Other(String),
}

/// Minimal object store surface used by a backup run.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket this store writes to.
    fn bucket(&self) -> &str;

    /// Check the bucket exists and is reachable.
    async fn head_bucket(&self) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    async fn put(&self, key: &str, body: Bytes) -> Result<(), StoreError>;
}
