#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for object storage operations.
pub const TRACING_TARGET_BACKEND: &str = "ufs_opendal::backend";

mod backend;
mod config;
mod error;
mod s3;
mod writer;

#[doc(hidden)]
pub mod prelude;

pub use backend::{OpendalBackend, OpendalStore};
pub use config::ObjectStoreConfig;
pub use s3::S3Config;
