//! Persisted high-water mark of listed log file timestamps.
//!
//! Stored per instance at `{instance}/backup_config` as a plain decimal
//! string. A missing object means no previous run has completed.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::destination::{ObjectStore, StoreError};
use crate::utils::{Result, SyncError};

/// Destination key holding the watermark for `instance`.
pub fn watermark_key(instance: &str) -> String {
    format!("{}/backup_config", instance)
}

pub struct WatermarkStore {
    store: Arc<dyn ObjectStore>,
}

impl WatermarkStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Read the watermark. `Ok(None)` on the first run.
    pub async fn load(&self, instance: &str) -> Result<Option<u64>> {
        let key = watermark_key(instance);
        let body = match self.store.get(&key).await {
            Ok(body) => body,
            Err(StoreError::NotFound(_)) => {
                debug!("No watermark at {}", key);
                return Ok(None);
            }
            Err(e) => {
                return Err(SyncError::WatermarkUnreadable {
                    key,
                    reason: e.to_string(),
                })
            }
        };

        let text = std::str::from_utf8(&body).map_err(|e| SyncError::WatermarkUnreadable {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        let value = text
            .trim()
            .parse::<u64>()
            .map_err(|e| SyncError::WatermarkUnreadable {
                key: key.clone(),
                reason: format!("'{}' is not a timestamp: {}", text.trim(), e),
            })?;

        Ok(Some(value))
    }

    pub async fn store(&self, instance: &str, value: u64) -> Result<()> {
        let key = watermark_key(instance);
        self.store
            .put(&key, Bytes::from(value.to_string()))
            .await
            .map_err(|e| SyncError::WatermarkPersistFailed {
                key,
                reason: e.to_string(),
            })
    }
}
