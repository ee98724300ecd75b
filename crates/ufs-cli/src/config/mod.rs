//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── ufs: UfsConfig        # Staging directory, tokens, public URLs
//! ├── stores: PathBuf       # JSON manifest of named stores
//! ├── user: String          # Caller the commands act as
//! ├── log_format: LogFormat # Text or JSON logs
//! └── command: Command      # check | import | stores
//! ```
//!
//! Process-wide options can be provided via CLI arguments or environment
//! variables. Stores themselves are described in the manifest, see
//! [`StoresManifest`].
//!
//! # Example
//!
//! ```bash
//! ufs --stores ./stores.json --ufs-base-url https://chat.example.com check
//!
//! UFS_STORES_FILE=./stores.json ufs import avatars ./me.png --token
//! ```

mod manifest;

use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
pub use manifest::StoresManifest;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use ufs_core::{CallerContext, UfsConfig};

use crate::commands::Command;
use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "ufs")]
#[command(about = "Probe and populate UFS file stores")]
#[command(version)]
pub struct Cli {
    /// Process-wide UFS configuration.
    #[clap(flatten)]
    pub ufs: UfsConfig,

    /// Path to the JSON manifest describing the stores.
    #[arg(long = "stores", env = "UFS_STORES_FILE", default_value = "stores.json")]
    pub stores: PathBuf,

    /// User id the commands act as.
    #[arg(long, env = "UFS_USER", default_value = "ufs")]
    pub user: String,

    /// Log output format.
    #[arg(long, env = "UFS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments so that its
    /// variables can be used as defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let json = self.log_format == LogFormat::Json;

        tracing_subscriber::registry()
            .with(filter)
            .with((!json).then(|| tracing_subscriber::fmt::layer()))
            .with(json.then(|| tracing_subscriber::fmt::layer().json()))
            .init();
    }

    /// Returns the caller commands run as.
    pub fn caller(&self) -> CallerContext {
        CallerContext::user(&self.user)
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            stores = %self.stores.display(),
            user = %self.user,
            tmp_dir = %self.ufs.tmp_dir().display(),
            token_ttl_secs = self.ufs.token_ttl().as_secs(),
            base_url = ?self.ufs.base_url(),
            stores_path = %self.ufs.stores_path(),
            "UFS configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [
            cfg!(feature = "s3").then_some("s3"),
            cfg!(feature = "nats").then_some("nats"),
            cfg!(feature = "dotenv").then_some("dotenv"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
