#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for store lifecycle operations.
pub const TRACING_TARGET_STORE: &str = "ufs_core::store";

/// Tracing target for write and read streams.
pub const TRACING_TARGET_STREAM: &str = "ufs_core::stream";

/// Tracing target for registry operations.
pub const TRACING_TARGET_REGISTRY: &str = "ufs_core::registry";

/// Tracing target for access token operations.
pub const TRACING_TARGET_TOKENS: &str = "ufs_core::tokens";

mod backend;
mod catalog;
mod config;
mod error;
mod filter;
mod permissions;
mod registry;
mod tokens;

pub mod mime;
pub mod record;
pub mod store;
pub mod stream;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

#[doc(hidden)]
pub mod prelude;

pub use backend::{Backend, BackendWriter};
pub use catalog::{Catalog, MemoryCatalog};
pub use config::UfsConfig;
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use filter::{CustomCheck, Filter, ListRule, Rejection};
pub use permissions::{
    CallerContext, Operation, Predicate, StorePermissions, allow_all, authenticated, deny_all,
    owner_only, require_role,
};
pub use registry::{Registry, RegistryBuilder};
pub use tokens::{AccessToken, TokenConstraints, Tokens};
