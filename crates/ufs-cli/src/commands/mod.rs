//! Subcommands.

mod check;
mod import;

use clap::Subcommand;
pub use check::{CheckArgs, check};
pub use import::{ImportArgs, import};
use ufs_core::Registry;

/// Available subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Probes stores with a write, full and ranged reads, URLs and a delete.
    Check(CheckArgs),
    /// Uploads local files into a store.
    Import(ImportArgs),
    /// Lists the configured stores.
    Stores,
}

/// Prints one JSON line per registered store.
pub fn list_stores(registry: &Registry) -> anyhow::Result<()> {
    for store in registry.stores() {
        let line = serde_json::json!({
            "name": store.name(),
            "kind": store.kind(),
            "supports_range": store.supports_range(),
            "max_size": store.filter().max_size(),
        });
        println!("{line}");
    }
    Ok(())
}
