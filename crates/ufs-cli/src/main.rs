#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod commands;
mod config;

use std::process;

use anyhow::Context;

use crate::commands::Command;
use crate::config::{Cli, StoresManifest};

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "ufs_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "ufs_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "ufs_cli::config";
pub const TRACING_TARGET_COMMAND: &str = "ufs_cli::command";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::debug!(
            target: TRACING_TARGET_SHUTDOWN,
            "command completed successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %format!("{error:#}"),
            "command failed"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    cli.init_tracing();
    cli.log();

    let manifest = StoresManifest::load(&cli.stores).await?;
    let registry = manifest
        .build_registry(cli.ufs.clone())
        .await
        .context("failed to build store registry")?;
    let caller = cli.caller();

    match &cli.command {
        Command::Check(args) => commands::check(&registry, &caller, args).await,
        Command::Import(args) => commands::import(&registry, &caller, args).await,
        Command::Stores => commands::list_stores(&registry),
    }
}
