//! Chunk collection errors.

use ufs_core::Error;

/// Result type for chunk collection operations.
pub type BlobResult<T, E = BlobError> = std::result::Result<T, E>;

/// Errors raised by chunk collections.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// A chunk the manifest references is absent.
    #[error("chunk {index} of '{key}' is missing")]
    MissingChunk { key: String, index: u64 },

    /// A chunk is shorter or longer than the manifest allows.
    #[error("chunk {index} of '{key}' has an unexpected length of {length} bytes")]
    ChunkLength { key: String, index: u64, length: usize },

    /// The object was already sealed.
    #[error("'{key}' is already sealed")]
    AlreadySealed { key: String },

    /// The stored manifest could not be decoded.
    #[error("manifest of '{key}' is corrupt: {source}")]
    CorruptManifest {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The collection could not be reached or refused the request.
    #[error("collection operation '{operation}' failed: {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },
}

impl BlobError {
    /// Creates a new operation error.
    pub fn operation(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            message: message.into(),
        }
    }
}

impl From<BlobError> for Error {
    fn from(err: BlobError) -> Self {
        let error = match &err {
            BlobError::AlreadySealed { .. } => Error::conflict(),
            BlobError::Operation { .. } => Error::backend(),
            BlobError::MissingChunk { .. }
            | BlobError::ChunkLength { .. }
            | BlobError::CorruptManifest { .. } => Error::backend().with_retryable(false),
        };
        error.with_message(err.to_string()).with_source(err)
    }
}
