#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for local backend operations.
pub const TRACING_TARGET_BACKEND: &str = "ufs_local::backend";

mod backend;
mod config;
mod error;

#[doc(hidden)]
pub mod prelude;

pub use backend::{LocalBackend, LocalStore};
pub use config::LocalConfig;
