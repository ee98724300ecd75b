//! Stored file metadata.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{FileId, NewFile};

/// Metadata of one stored object.
///
/// A record is visible to readers once `complete` is set; until then it is
/// only returned by explicit in-progress lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique identifier.
    pub id: FileId,
    /// Logical file name.
    pub name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Normalized extension, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// Declared size while uploading, actual size once complete.
    pub size: u64,
    /// Name of the owning store.
    pub store: String,
    /// Backend-specific location (path, object key, chunk key).
    pub locator: String,
    /// Content fingerprint assigned on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Bytes received so far.
    pub progress: u64,
    /// Whether the upload was finalized.
    pub complete: bool,
    /// Whether a writer currently holds the record.
    pub uploading: bool,
    /// User that created the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Source file id when this record was produced by a copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<FileId>,
    /// Source store name when this record was produced by a copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_store: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Completion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl FileRecord {
    /// Builds an incomplete record for `file` owned by `store`.
    ///
    /// The locator is left empty; the store fills it in from its backend.
    pub fn pending(id: FileId, file: &NewFile, store: &str, user_id: Option<String>) -> Self {
        Self {
            id,
            name: file.name.clone(),
            content_type: file.content_type.clone(),
            extension: file.extension(),
            size: file.size,
            store: store.to_owned(),
            locator: String::new(),
            etag: None,
            progress: 0,
            complete: false,
            uploading: false,
            user_id,
            original_id: None,
            original_store: None,
            created_at: Timestamp::now(),
            completed_at: None,
        }
    }

    /// Returns `{id}.{ext}`, or the bare id for files without an extension.
    pub fn file_name(&self) -> String {
        match &self.extension {
            Some(ext) => format!("{}.{ext}", self.id),
            None => self.id.to_string(),
        }
    }

    /// Returns upload progress in `[0.0, 1.0]`.
    pub fn progress_ratio(&self) -> f64 {
        if self.complete {
            return 1.0;
        }
        if self.size == 0 {
            return 0.0;
        }
        (self.progress as f64 / self.size as f64).min(1.0)
    }

    /// Returns metadata describing this record, used as the template of a copy.
    pub fn to_new_file(&self) -> NewFile {
        NewFile {
            name: self.name.clone(),
            content_type: self.content_type.clone(),
            size: self.size,
            id: None,
            extension: self.extension.clone(),
        }
    }
}
