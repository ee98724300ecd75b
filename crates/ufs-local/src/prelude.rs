//! Prelude module for convenient imports.

pub use crate::backend::{LocalBackend, LocalStore};
pub use crate::config::LocalConfig;
