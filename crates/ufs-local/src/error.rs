//! Translation of filesystem errors.

use std::io;

use ufs_core::Error;

/// Maps an I/O error into the store taxonomy.
///
/// Missing files become not found errors; everything else is a retryable
/// backend error.
pub(crate) fn from_io(err: io::Error, message: &'static str) -> Error {
    let error = match err.kind() {
        io::ErrorKind::NotFound => Error::not_found(),
        io::ErrorKind::PermissionDenied => Error::backend().with_retryable(false),
        _ => Error::backend(),
    };
    error.with_message(message).with_source(err)
}
