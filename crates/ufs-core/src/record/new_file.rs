//! Metadata supplied when a file is created.

use serde::{Deserialize, Serialize};

use super::FileId;
use crate::mime;

/// Metadata describing a file a caller wants to store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFile {
    /// Logical file name, usually the name the user uploaded.
    pub name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Caller-chosen identifier; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FileId>,
    /// Explicit extension; derived from `name` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl NewFile {
    /// Creates metadata for a file with the given name, type and size.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size,
            id: None,
            extension: None,
        }
    }

    /// Uses a caller-chosen identifier.
    #[must_use]
    pub fn with_id(mut self, id: FileId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the extension explicitly.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Returns the normalized extension: explicit if given, otherwise taken
    /// from the name.
    pub fn extension(&self) -> Option<String> {
        match &self.extension {
            Some(ext) => mime::normalize_extension(ext),
            None => mime::extension_of(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_from_name() {
        assert_eq!(NewFile::new("Photo.PNG", "image/png", 1).extension().as_deref(), Some("png"));
        assert_eq!(NewFile::new("README", "text/plain", 1).extension(), None);
    }

    #[test]
    fn explicit_extension_wins() {
        let file = NewFile::new("archive", "application/zip", 1).with_extension(".ZIP");
        assert_eq!(file.extension().as_deref(), Some("zip"));
    }
}
