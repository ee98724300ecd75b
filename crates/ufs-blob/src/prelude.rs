//! Prelude module for convenient imports.

pub use crate::backend::{BlobBackend, BlobStore};
#[cfg(feature = "nats")]
pub use crate::collection::NatsChunkCollection;
pub use crate::collection::{ChunkCollection, MemoryChunkCollection};
pub use crate::config::{BlobConfig, CollectionConfig, NatsBlobConfig};
pub use crate::error::{BlobError, BlobResult};
pub use crate::manifest::ChunkManifest;
