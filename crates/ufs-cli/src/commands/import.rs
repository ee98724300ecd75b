//! Uploads local files into a store.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Args;
use serde::Serialize;
use tokio::fs::File;
use ufs_core::mime::{self, DEFAULT_CONTENT_TYPE};
use ufs_core::record::{FileRecord, NewFile};
use ufs_core::stream::HashingReader;
use ufs_core::{CallerContext, Registry, TokenConstraints};

use crate::TRACING_TARGET_COMMAND;

/// Arguments of `ufs import`.
#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    /// Destination store.
    pub store: String,

    /// Files to upload.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Content type of every file. Resolved from the extension when omitted.
    #[arg(long)]
    pub content_type: Option<String>,

    /// Issue an access token and print the streaming URL.
    #[arg(long)]
    pub token: bool,

    /// Make issued tokens single-use.
    #[arg(long, requires = "token")]
    pub single_use: bool,
}

/// A file uploaded by `ufs import`.
#[derive(Debug, Clone, Serialize)]
pub struct ImportedFile {
    #[serde(flatten)]
    pub record: FileRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Uploads every path and prints one JSON line per file.
///
/// Stops at the first failure; files uploaded before it are kept.
pub async fn import(
    registry: &Registry,
    caller: &CallerContext,
    args: &ImportArgs,
) -> anyhow::Result<()> {
    for path in &args.paths {
        let imported = import_file(registry, caller, args, path)
            .await
            .with_context(|| format!("failed to import {}", path.display()))?;
        println!("{}", serde_json::to_string(&imported)?);
    }
    Ok(())
}

/// Uploads one file and verifies the stored ETag against the bytes read.
pub async fn import_file(
    registry: &Registry,
    caller: &CallerContext,
    args: &ImportArgs,
    path: &Path,
) -> anyhow::Result<ImportedFile> {
    let store = registry.store(&args.store)?;

    let file = File::open(path).await.context("failed to open file")?;
    let size = file.metadata().await.context("failed to stat file")?.len();
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        bail!("file name is not valid UTF-8");
    };

    let content_type = match &args.content_type {
        Some(content_type) => content_type.clone(),
        None => mime::extension_of(name)
            .and_then(|ext| registry.resolve_mime_type(&ext))
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_owned(),
    };

    let record = store
        .create(caller, NewFile::new(name, content_type, size))
        .await?;

    let mut writer = store.get_write_stream(caller, &record.id).await?;
    let mut reader = HashingReader::new(file);
    writer.copy_from(&mut reader).await?;
    let record = writer.finalize().await?;

    let expected = reader.into_fingerprint().finalize_hex();
    if record.etag.as_deref() != Some(expected.as_str()) {
        store.discard(&record.id).await?;
        bail!("stored etag does not match the file content");
    }

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        store = %record.store,
        file_id = %record.id,
        size = record.size,
        content_type = %record.content_type,
        "File imported"
    );

    let (token, url) = if args.token {
        let constraints = if args.single_use {
            TokenConstraints::single_use()
        } else {
            TokenConstraints::reusable()
        };
        let token = registry
            .issue_token(&args.store, &record.id, constraints)
            .await?;
        let url = registry.file_url(&record, Some(&token))?;
        (Some(token.token), Some(url.to_string()))
    } else {
        (None, None)
    };

    Ok(ImportedFile { record, token, url })
}
