//! Translation of OpenDAL errors.

use std::io;

use opendal::ErrorKind as OpendalErrorKind;
use ufs_core::Error;

/// Maps an OpenDAL error into the store taxonomy.
pub(crate) fn from_opendal(err: opendal::Error) -> Error {
    let error = match err.kind() {
        OpendalErrorKind::NotFound => Error::not_found(),
        OpendalErrorKind::PermissionDenied
        | OpendalErrorKind::ConfigInvalid
        | OpendalErrorKind::Unsupported => Error::backend().with_retryable(false),
        _ => Error::backend(),
    };
    error.with_message(err.to_string()).with_source(err)
}

/// Maps an error yielded by an object byte stream.
///
/// OpenDAL byte streams wrap their `opendal::Error` into an `io::Error`.
pub(crate) fn from_read_stream(err: io::Error) -> Error {
    let fallback = if err.kind() == io::ErrorKind::NotFound {
        Error::not_found()
    } else {
        Error::backend()
    };

    match err.into_inner().map(|inner| inner.downcast::<opendal::Error>()) {
        Some(Ok(err)) => from_opendal(*err),
        Some(Err(inner)) => fallback.with_message(inner.to_string()).with_source(inner),
        None => fallback.with_message("failed to read object"),
    }
}
