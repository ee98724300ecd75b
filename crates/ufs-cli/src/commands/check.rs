//! Store health probe.

use std::time::Instant;

use anyhow::{Context, bail, ensure};
use clap::Args;
use serde::Serialize;
use ufs_core::record::{ByteRange, FileId, NewFile};
use ufs_core::store::Store;
use ufs_core::stream::Fingerprint;
use ufs_core::{CallerContext, Registry};

use crate::TRACING_TARGET_COMMAND;

const PROBE_NAME: &str = "ufs-check.txt";
const PROBE_CONTENT_TYPE: &str = "text/plain";
const PROBE_PAYLOAD: &[u8] = b"ufs store probe: 0123456789abcdefghijklmnopqrstuvwxyz\n";

/// Arguments of `ufs check`.
#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Stores to probe. All stores are probed when empty.
    pub stores: Vec<String>,
}

/// Outcome of probing one store.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub store: String,
    pub kind: &'static str,
    pub etag: String,
    pub ranged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub elapsed_ms: u128,
}

/// Probes the requested stores and prints one JSON report per store.
///
/// Every store is probed even if an earlier one fails.
pub async fn check(
    registry: &Registry,
    caller: &CallerContext,
    args: &CheckArgs,
) -> anyhow::Result<()> {
    let names: Vec<String> = if args.stores.is_empty() {
        registry.store_names().map(str::to_owned).collect()
    } else {
        args.stores.clone()
    };

    let mut failed = Vec::new();
    for name in &names {
        match probe(registry, caller, name).await {
            Ok(report) => println!("{}", serde_json::to_string(&report)?),
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET_COMMAND,
                    store = %name,
                    error = %format!("{err:#}"),
                    "Store probe failed"
                );
                failed.push(name.as_str());
            }
        }
    }

    if !failed.is_empty() {
        bail!("{} of {} stores failed: {}", failed.len(), names.len(), failed.join(", "));
    }
    Ok(())
}

/// Runs the probe sequence against one store.
///
/// The probe file is discarded when a step fails after it was created.
pub async fn probe(
    registry: &Registry,
    caller: &CallerContext,
    name: &str,
) -> anyhow::Result<ProbeReport> {
    let store = registry.store(name)?;
    let started = Instant::now();

    let file = NewFile::new(PROBE_NAME, PROBE_CONTENT_TYPE, PROBE_PAYLOAD.len() as u64);
    let record = store
        .create(caller, file)
        .await
        .context("failed to create probe record")?;

    let outcome = run_probe(registry, store.as_ref(), caller, &record.id).await;
    if outcome.is_err()
        && let Err(err) = store.discard(&record.id).await
    {
        tracing::warn!(
            target: TRACING_TARGET_COMMAND,
            store = %name,
            file_id = %record.id,
            error = %err,
            "Failed to discard probe file"
        );
    }

    let mut report = outcome?;
    report.elapsed_ms = started.elapsed().as_millis();

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        store = %report.store,
        kind = report.kind,
        elapsed_ms = report.elapsed_ms as u64,
        "Store probe passed"
    );

    Ok(report)
}

async fn run_probe(
    registry: &Registry,
    store: &dyn Store,
    caller: &CallerContext,
    id: &FileId,
) -> anyhow::Result<ProbeReport> {
    let mut writer = store
        .get_write_stream(caller, id)
        .await
        .context("failed to open write stream")?;
    writer.write(PROBE_PAYLOAD).await.context("failed to write")?;
    let record = writer.finalize().await.context("failed to finalize")?;

    let mut fingerprint = Fingerprint::new();
    fingerprint.update(PROBE_PAYLOAD);
    let expected = fingerprint.finalize_hex();
    ensure!(
        record.etag.as_deref() == Some(expected.as_str()),
        "etag {:?} does not match the written content",
        record.etag
    );
    ensure!(record.complete, "finalized record is not complete");

    let full = store
        .get_read_stream(caller, id, None)
        .await
        .context("failed to open read stream")?
        .read_to_end()
        .await
        .context("failed to read")?;
    ensure!(full[..] == *PROBE_PAYLOAD, "read back {} unexpected bytes", full.len());

    let ranged = store.supports_range();
    if ranged {
        let range = ByteRange::new(5, 15)?;
        let part = store
            .get_read_stream(caller, id, Some(range))
            .await
            .context("failed to open ranged read stream")?
            .read_to_end()
            .await
            .context("failed to read range")?;
        ensure!(
            part[..] == PROBE_PAYLOAD[5..=15],
            "ranged read returned {} unexpected bytes",
            part.len()
        );
    }

    let redirect_url = store
        .get_redirect_url(caller, id, true)
        .await
        .context("failed to build redirect url")?
        .map(String::from);

    let file_url = match registry.config().base_url() {
        Some(_) => Some(registry.file_url(&record, None)?.to_string()),
        None => None,
    };

    store.delete(caller, id).await.context("failed to delete")?;
    ensure!(
        store.find(id).await?.is_none(),
        "record still present after delete"
    );

    Ok(ProbeReport {
        store: store.name().to_owned(),
        kind: store.kind(),
        etag: expected,
        ranged,
        redirect_url,
        file_url,
        elapsed_ms: 0,
    })
}
