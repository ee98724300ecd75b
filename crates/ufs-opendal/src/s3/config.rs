//! Amazon S3 configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// Default values
const DEFAULT_URL_EXPIRY_SECS: u64 = 120;
const DEFAULT_ACK_TIMEOUT_SECS: u64 = 6;

/// Amazon S3 configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    /// Bucket name.
    pub bucket: String,
    /// AWS region.
    pub region: String,
    /// Custom endpoint URL (for S3-compatible storage like MinIO, R2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Access key ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    /// Secret access key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    /// Key prefix within the bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Lifetime of presigned redirect URLs in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_expiry_secs: Option<u64>,
    /// How long finalize waits for the upload acknowledgement, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_timeout_secs: Option<u64>,
}

impl S3Config {
    /// Creates a new S3 configuration.
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            prefix: None,
            url_expiry_secs: None,
            ack_timeout_secs: None,
        }
    }

    /// Sets the custom endpoint (for S3-compatible storage).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the access credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// Sets the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Sets the lifetime of presigned URLs.
    #[must_use]
    pub fn with_url_expiry(mut self, expiry: Duration) -> Self {
        self.url_expiry_secs = Some(expiry.as_secs());
        self
    }

    /// Sets the upload acknowledgement timeout.
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Returns the lifetime of presigned URLs.
    #[inline]
    pub fn url_expiry(&self) -> Duration {
        Duration::from_secs(self.url_expiry_secs.unwrap_or(DEFAULT_URL_EXPIRY_SECS))
    }

    /// Returns the upload acknowledgement timeout.
    #[inline]
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs.unwrap_or(DEFAULT_ACK_TIMEOUT_SECS))
    }
}
