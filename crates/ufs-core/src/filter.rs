//! Per-store validation of file metadata.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::mime;
use crate::record::NewFile;

/// Allow-list or deny-list of string patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListRule {
    /// Only matching values are accepted.
    Allow(Vec<String>),
    /// Matching values are rejected.
    Deny(Vec<String>),
}

impl ListRule {
    fn permits(&self, matches: impl Fn(&str) -> bool) -> bool {
        match self {
            Self::Allow(patterns) => patterns.iter().any(|p| matches(p)),
            Self::Deny(patterns) => !patterns.iter().any(|p| matches(p)),
        }
    }
}

/// Reason a file was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The content type is not accepted by this store.
    #[error("content type `{0}` is not accepted")]
    ContentType(String),

    /// The extension is registered for a different content type.
    #[error("extension `{extension}` does not match content type `{content_type}`")]
    ExtensionMismatch {
        extension: String,
        content_type: String,
    },

    /// The extension is not accepted by this store.
    #[error("extension `{0}` is not accepted")]
    Extension(String),

    /// The store only accepts files with an extension.
    #[error("file has no extension")]
    MissingExtension,

    /// The file is larger than the store accepts.
    #[error("file of {size} bytes exceeds the maximum of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    /// The file is smaller than the store accepts.
    #[error("file of {size} bytes is below the minimum of {min} bytes")]
    TooSmall { size: u64, min: u64 },

    /// A custom check rejected the file.
    #[error("{0}")]
    Custom(String),
}

/// Custom check run after the declarative rules.
pub type CustomCheck = Arc<dyn Fn(&NewFile) -> Result<(), String> + Send + Sync>;

/// Declarative rules a file must satisfy before a store accepts it.
///
/// Validation is a pure function of the metadata and the rules. Checks run
/// in order: content type, extension, size, custom check.
#[derive(Clone, Default)]
pub struct Filter {
    content_types: Option<ListRule>,
    extensions: Option<ListRule>,
    min_size: Option<u64>,
    max_size: Option<u64>,
    check: Option<CustomCheck>,
}

impl Filter {
    /// Creates a filter accepting everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts only the given content types. `image/*` style wildcards match
    /// a whole top-level type.
    #[must_use]
    pub fn allow_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_types = Some(ListRule::Allow(types.into_iter().map(Into::into).collect()));
        self
    }

    /// Rejects the given content types.
    #[must_use]
    pub fn deny_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_types = Some(ListRule::Deny(types.into_iter().map(Into::into).collect()));
        self
    }

    /// Accepts only the given extensions.
    #[must_use]
    pub fn allow_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = Some(ListRule::Allow(normalize_all(extensions)));
        self
    }

    /// Rejects the given extensions.
    #[must_use]
    pub fn deny_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = Some(ListRule::Deny(normalize_all(extensions)));
        self
    }

    /// Sets the minimum size in bytes.
    #[must_use]
    pub fn with_min_size(mut self, min: u64) -> Self {
        self.min_size = Some(min);
        self
    }

    /// Sets the maximum size in bytes.
    #[must_use]
    pub fn with_max_size(mut self, max: u64) -> Self {
        self.max_size = Some(max);
        self
    }

    /// Adds a custom check, run last.
    #[must_use]
    pub fn with_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&NewFile) -> Result<(), String> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    /// Returns the maximum size in bytes, if limited.
    #[inline]
    pub fn max_size(&self) -> Option<u64> {
        self.max_size
    }

    /// Validates file metadata against the rules.
    pub fn validate(&self, file: &NewFile) -> Result<(), Rejection> {
        let content_type = mime::essence(&file.content_type);

        if let Some(rule) = &self.content_types
            && !rule.permits(|pattern| content_type_matches(pattern, content_type))
        {
            return Err(Rejection::ContentType(content_type.to_owned()));
        }

        let extension = file.extension();

        if let Some(ext) = &extension
            && let Some(registered) = mime::lookup(ext)
            && !registered.eq_ignore_ascii_case(content_type)
            && !content_type.eq_ignore_ascii_case(mime::DEFAULT_CONTENT_TYPE)
        {
            return Err(Rejection::ExtensionMismatch {
                extension: ext.clone(),
                content_type: content_type.to_owned(),
            });
        }

        if let Some(rule) = &self.extensions {
            match &extension {
                Some(ext) if !rule.permits(|pattern| pattern == ext) => {
                    return Err(Rejection::Extension(ext.clone()));
                }
                None if matches!(rule, ListRule::Allow(_)) => {
                    return Err(Rejection::MissingExtension);
                }
                _ => {}
            }
        }

        if let Some(max) = self.max_size
            && file.size > max
        {
            return Err(Rejection::TooLarge {
                size: file.size,
                max,
            });
        }

        if let Some(min) = self.min_size
            && file.size < min
        {
            return Err(Rejection::TooSmall {
                size: file.size,
                min,
            });
        }

        if let Some(check) = &self.check {
            check(file).map_err(Rejection::Custom)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("content_types", &self.content_types)
            .field("extensions", &self.extensions)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("check", &self.check.is_some())
            .finish()
    }
}

fn normalize_all<I, S>(extensions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .filter_map(|ext| mime::normalize_extension(ext.as_ref()))
        .collect()
}

fn content_type_matches(pattern: &str, content_type: &str) -> bool {
    if pattern == "*" || pattern == "*/*" {
        return true;
    }
    match pattern.strip_suffix("/*") {
        Some(top) => content_type
            .split_once('/')
            .is_some_and(|(ty, _)| ty.eq_ignore_ascii_case(top)),
        None => pattern.eq_ignore_ascii_case(content_type),
    }
}
