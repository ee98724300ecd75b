//! Prelude module for convenient imports.

pub use crate::backend::{OpendalBackend, OpendalStore};
pub use crate::config::ObjectStoreConfig;
pub use crate::s3::S3Config;
