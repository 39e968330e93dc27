//! S3 implementation of the destination store.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;

use super::{ObjectStore, StoreError};

pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn head_bucket(&self) -> Result<(), StoreError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let message = DisplayErrorContext(&err).to_string();
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Err(StoreError::NotFound(format!("bucket {}", self.bucket)))
                } else {
                    Err(StoreError::AccessError(message))
                }
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let message = DisplayErrorContext(&err).to_string();
                let service_err = err.into_service_error();
                return if service_err.is_no_such_key() {
                    Err(StoreError::NotFound(format!("s3://{}/{}", self.bucket, key)))
                } else {
                    Err(StoreError::Other(message))
                };
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Other(format!("failed to read s3://{}/{}: {}", self.bucket, key, e)))?;
        Ok(body.into_bytes())
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StoreError::Other(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
