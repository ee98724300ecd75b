//! Cross-store duplication.

use futures::StreamExt;

use super::Store;
use crate::permissions::CallerContext;
use crate::record::{FileId, FileRecord};
use crate::stream::WriteStream;
use crate::{Error, Result, TRACING_TARGET_STORE};

/// Streams a completed file of `source` into a new record of `destination`.
///
/// The copy either completes or leaves nothing behind in the destination.
/// If the source file is deleted while the copy runs, the copy fails with a
/// not found error instead of producing a truncated file.
pub async fn copy_file(
    caller: &CallerContext,
    source: &dyn Store,
    id: &FileId,
    destination: &dyn Store,
) -> Result<FileRecord> {
    let mut reader = source.get_read_stream(caller, id, None).await?;
    let original = reader.record().clone();

    let created = destination.create_copy(caller, &original).await?;
    let mut writer = match destination.get_write_stream(caller, &created.id).await {
        Ok(writer) => writer,
        Err(err) => {
            if let Err(discard) = destination.discard(&created.id).await {
                tracing::warn!(
                    target: TRACING_TARGET_STORE,
                    store = %destination.name(),
                    file_id = %created.id,
                    error = %discard,
                    "Failed to discard copy destination"
                );
            }
            return Err(err);
        }
    };

    tracing::debug!(
        target: TRACING_TARGET_STORE,
        source = %source.name(),
        destination = %destination.name(),
        file_id = %id,
        copy_id = %created.id,
        "Copying file"
    );

    while let Some(chunk) = reader.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                abort_destination(writer, destination).await;
                if source_is_gone(source, id).await {
                    return Err(source_deleted(source, id));
                }
                return Err(err.with_context("copy", source.name(), id));
            }
        };
        // A failed write already rolled the destination back.
        writer.write(chunk).await?;
    }

    let still_present = match source.find(id).await {
        Ok(record) => record.is_some_and(|r| r.complete),
        Err(err) => {
            abort_destination(writer, destination).await;
            return Err(err);
        }
    };

    if !still_present {
        abort_destination(writer, destination).await;
        return Err(source_deleted(source, id));
    }

    let copied = writer.finalize().await?;

    tracing::info!(
        target: TRACING_TARGET_STORE,
        source = %source.name(),
        destination = %destination.name(),
        file_id = %id,
        copy_id = %copied.id,
        size = copied.size,
        "File copied"
    );

    Ok(copied)
}

/// Rolls back the destination upload of a failed copy.
async fn abort_destination(writer: WriteStream, destination: &dyn Store) {
    let copy_id = writer.id().clone();
    if let Err(err) = writer.abort().await {
        tracing::warn!(
            target: TRACING_TARGET_STORE,
            store = %destination.name(),
            file_id = %copy_id,
            error = %err,
            "Failed to abort copy destination"
        );
    }
}

/// Whether the source file was deleted or never completed.
///
/// A failing lookup counts as present so the original read error surfaces.
async fn source_is_gone(source: &dyn Store, id: &FileId) -> bool {
    match source.find(id).await {
        Ok(record) => !record.is_some_and(|r| r.complete),
        Err(_) => false,
    }
}

fn source_deleted(source: &dyn Store, id: &FileId) -> Error {
    tracing::warn!(
        target: TRACING_TARGET_STORE,
        source = %source.name(),
        file_id = %id,
        "Source deleted during copy"
    );
    Error::not_found()
        .with_message("source file was deleted during copy")
        .with_context("copy", source.name(), id)
}
