//! Validated file identifiers.

use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Identifier of a stored file.
///
/// Ids end up in filesystem paths, object keys and NATS subjects, so only
/// ASCII alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileId(String);

impl FileId {
    /// Maximum accepted identifier length.
    pub const MAX_LEN: usize = 128;

    /// Creates an identifier, rejecting empty, oversized or unsafe values.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() || id.len() > Self::MAX_LEN {
            return Err(Error::validation()
                .with_message(format!("file id must be 1..={} characters", Self::MAX_LEN)));
        }

        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(Error::validation()
                .with_message(format!("file id contains invalid character {c:?}")));
        }

        Ok(Self(id))
    }

    /// Generates a new, time-ordered identifier.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for FileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for FileId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for FileId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<FileId> for String {
    fn from(value: FileId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn accepts_safe_identifiers() {
        assert!(FileId::new("abc-DEF_123").is_ok());
    }

    #[test]
    fn rejects_path_traversal() {
        let err = FileId::new("../etc/passwd").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(FileId::new("").is_err());
        assert!(FileId::new("a".repeat(FileId::MAX_LEN + 1)).is_err());
    }

    #[test]
    fn generated_ids_are_unique_and_valid() {
        let a = FileId::generate();
        let b = FileId::generate();
        assert_ne!(a, b);
        assert!(FileId::new(a.as_str()).is_ok());
    }

    #[test]
    fn deserialization_validates() {
        let ok: FileId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(ok.as_str(), "abc");
        assert!(serde_json::from_str::<FileId>("\"a/b\"").is_err());
    }
}
