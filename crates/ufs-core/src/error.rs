//! Error taxonomy shared by every store and adapter.

use std::fmt;

use strum::{AsRefStr, IntoStaticStr};

use crate::record::FileId;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with the UFS error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors a store can report.
///
/// Backend-native failures never cross the store boundary; adapters
/// translate them into one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// File metadata or a request argument was rejected.
    Validation,
    /// The caller is not allowed to perform the operation.
    Permission,
    /// The file is unknown or not yet completed.
    NotFound,
    /// Duplicate registration or a concurrent writer.
    Conflict,
    /// The backend cannot serve byte ranges.
    RangeNotSupported,
    /// The underlying storage failed.
    Backend,
}

impl ErrorKind {
    /// Returns whether errors of this kind are worth retrying by default.
    #[inline]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Backend)
    }
}

/// A structured error carrying the operation, store and file it relates to.
pub struct Error {
    kind: ErrorKind,
    operation: Option<&'static str>,
    store: Option<String>,
    file_id: Option<FileId>,
    message: Option<String>,
    retryable: bool,
    source: Option<BoxedError>,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            operation: None,
            store: None,
            file_id: None,
            message: None,
            retryable: kind.is_retryable(),
            source: None,
        }
    }

    /// Creates a new validation error.
    pub fn validation() -> Self {
        Self::new(ErrorKind::Validation)
    }

    /// Creates a new permission error.
    pub fn permission() -> Self {
        Self::new(ErrorKind::Permission)
    }

    /// Creates a new not found error.
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Creates a new conflict error.
    pub fn conflict() -> Self {
        Self::new(ErrorKind::Conflict)
    }

    /// Creates a new range not supported error.
    pub fn range_not_supported() -> Self {
        Self::new(ErrorKind::RangeNotSupported)
    }

    /// Creates a new backend error.
    pub fn backend() -> Self {
        Self::new(ErrorKind::Backend)
    }

    /// Adds a message to this error.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a source error to this error.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxedError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the operation this error occurred in.
    #[must_use]
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Sets the store this error occurred in.
    #[must_use]
    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    /// Sets the file this error relates to.
    #[must_use]
    pub fn with_file_id(mut self, file_id: &FileId) -> Self {
        self.file_id = Some(file_id.clone());
        self
    }

    /// Overrides whether this error is retryable.
    #[must_use]
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Fills in operation, store and file id where they are not set yet.
    #[must_use]
    pub fn with_context(mut self, operation: &'static str, store: &str, file_id: &FileId) -> Self {
        self.operation.get_or_insert(operation);
        if self.store.is_none() {
            self.store = Some(store.to_owned());
        }
        if self.file_id.is_none() {
            self.file_id = Some(file_id.clone());
        }
        self
    }

    /// Returns the error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error kind as a string.
    pub fn kind_str(&self) -> &'static str {
        self.kind.into()
    }

    /// Returns the operation, if known.
    pub fn operation(&self) -> Option<&'static str> {
        self.operation
    }

    /// Returns the store name, if known.
    pub fn store(&self) -> Option<&str> {
        self.store.as_deref()
    }

    /// Returns the file id, if known.
    pub fn file_id(&self) -> Option<&FileId> {
        self.file_id.as_ref()
    }

    /// Returns the message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns whether the operation may succeed if retried.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Returns whether this is a not found error.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("operation", &self.operation)
            .field("store", &self.store)
            .field("file_id", &self.file_id)
            .field("message", &self.message)
            .field("retryable", &self.retryable)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_ref())?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }

        let mut context = Vec::with_capacity(3);
        if let Some(operation) = self.operation {
            context.push(format!("operation={operation}"));
        }
        if let Some(store) = &self.store {
            context.push(format!("store={store}"));
        }
        if let Some(file_id) = &self.file_id {
            context.push(format!("file_id={file_id}"));
        }
        if !context.is_empty() {
            write!(f, " ({})", context.join(", "))?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
