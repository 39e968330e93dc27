//! Ephemeral AWS credentials and where they come from.

use std::fmt;

use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};

use crate::utils::{Result, SyncError};

/// An access key pair plus optional session token.
///
/// Never persisted. The secret and token are redacted from `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Both halves of the key pair must be present to sign anything.
    pub fn validate(&self) -> Result<()> {
        if self.access_key_id.is_empty() {
            return Err(SyncError::CredentialsUnavailable(
                "no access key is available".to_string(),
            ));
        }
        if self.secret_access_key.is_empty() {
            return Err(SyncError::CredentialsUnavailable(
                "no secret key is available".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "** redacted **"),
            )
            .finish()
    }
}

/// Supplies credentials on demand.
///
/// Called once per download so rotating session tokens are picked up.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credentials(&self) -> Result<Credentials>;
}

/// A fixed key pair, e.g. from explicit configuration.
#[async_trait]
impl CredentialSource for Credentials {
    async fn credentials(&self) -> Result<Credentials> {
        Ok(self.clone())
    }
}

/// Credentials resolved through the AWS default provider chain
/// (environment, profile, web identity, container and instance metadata).
pub struct AwsCredentialSource {
    provider: SharedCredentialsProvider,
}

impl AwsCredentialSource {
    pub fn new(provider: SharedCredentialsProvider) -> Self {
        Self { provider }
    }

    /// Take the provider chain from a loaded SDK config.
    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Result<Self> {
        config
            .credentials_provider()
            .map(Self::new)
            .ok_or_else(|| {
                SyncError::CredentialsUnavailable(
                    "no credential provider is configured".to_string(),
                )
            })
    }
}

#[async_trait]
impl CredentialSource for AwsCredentialSource {
    async fn credentials(&self) -> Result<Credentials> {
        let resolved = self
            .provider
            .provide_credentials()
            .await
            .map_err(|e| SyncError::CredentialsUnavailable(e.to_string()))?;

        let credentials = Credentials::new(
            resolved.access_key_id(),
            resolved.secret_access_key(),
            resolved.session_token().map(str::to_string),
        );
        credentials.validate()?;
        Ok(credentials)
    }
}
