//! Downloads complete log files over presigned URLs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::ACCEPT_ENCODING;
use reqwest::StatusCode;
use tracing::debug;

use super::{LogFetcher, LogFileDescriptor};
use crate::config::SourceConfig;
use crate::signing::{self, CredentialSource, ServiceEndpoint};
use crate::utils::{Result, SyncError};

/// Fetches log files with one signed GET each.
///
/// Redirects are not followed and any status other than 200 is a failure.
/// The body is returned exactly as received (gzip on the wire).
pub struct SignedLogFetcher {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
    service: String,
    endpoint_override: Option<String>,
}

impl SignedLogFetcher {
    pub fn new(credentials: Arc<dyn CredentialSource>, settings: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            credentials,
            service: settings.service.clone(),
            endpoint_override: settings.endpoint.clone(),
        })
    }

    fn endpoint(&self, region: &str) -> Result<ServiceEndpoint> {
        match &self.endpoint_override {
            Some(url) => ServiceEndpoint::from_url(url, region, &self.service),
            None => Ok(ServiceEndpoint::for_region(region, &self.service)),
        }
    }
}

#[async_trait]
impl LogFetcher for SignedLogFetcher {
    async fn fetch(
        &self,
        descriptor: &LogFileDescriptor,
        instance_id: &str,
        region: &str,
    ) -> Result<Bytes> {
        // Session tokens rotate, so resolve credentials for every file.
        let credentials = self.credentials.credentials().await?;
        let endpoint = self.endpoint(region)?;
        let signed = signing::presign_download(
            &credentials,
            &endpoint,
            instance_id,
            &descriptor.name,
            Utc::now(),
        )?;

        debug!("Request URL: {}", loggable_url(&signed.url));

        let response = self
            .client
            .get(&signed.url)
            .header(ACCEPT_ENCODING, "gzip")
            .send()
            .await
            .map_err(|e| download_failed(&descriptor.name, e))?;

        let status = response.status();
        debug!("Response code: {}", status.as_u16());

        if status != StatusCode::OK {
            return Err(SyncError::DownloadFailed {
                filename: descriptor.name.clone(),
                cause: format!("HTTP error status {}", status.as_u16()),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| download_failed(&descriptor.name, e))
    }
}

fn download_failed(filename: &str, err: reqwest::Error) -> SyncError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "transport error"
    };
    SyncError::DownloadFailed {
        filename: filename.to_string(),
        cause: format!("{}: {}", kind, err),
    }
}

/// Scheme, host and path only. The query carries the session token and
/// signature, which must stay out of logs.
fn loggable_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
