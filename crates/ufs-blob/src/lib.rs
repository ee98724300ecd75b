#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for blob backend operations.
pub const TRACING_TARGET_BACKEND: &str = "ufs_blob::backend";

/// Tracing target for chunk collection operations.
pub const TRACING_TARGET_COLLECTION: &str = "ufs_blob::collection";

mod backend;
mod collection;
mod config;
mod error;
mod manifest;

#[doc(hidden)]
pub mod prelude;

pub use backend::{BlobBackend, BlobStore, DEFAULT_CHUNK_SIZE};
#[cfg(feature = "nats")]
#[cfg_attr(docsrs, doc(cfg(feature = "nats")))]
pub use collection::NatsChunkCollection;
pub use collection::{ChunkCollection, MemoryChunkCollection};
pub use config::{BlobConfig, CollectionConfig, NatsBlobConfig};
pub use error::{BlobError, BlobResult};
pub use manifest::ChunkManifest;
