//! Object storage configuration.

use serde::{Deserialize, Serialize};

use crate::s3::S3Config;

/// Object storage service selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ObjectStoreConfig {
    /// In-process memory service.
    Memory {
        /// Key prefix.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
    /// Amazon S3 compatible storage.
    S3(S3Config),
}

impl ObjectStoreConfig {
    /// Returns the service name as a static string.
    pub fn service_name(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::S3(_) => "s3",
        }
    }
}
