//! Prelude module for convenient imports.

pub use crate::record::{ByteRange, FileId, FileRecord, NewFile};
pub use crate::store::{Store, UploadStore};
pub use crate::stream::{Completion, ReadStream, UploadPhase, WriteStream};
pub use crate::{
    Backend, BackendWriter, CallerContext, Error, ErrorKind, Filter, Operation, Registry,
    RegistryBuilder, Result, StorePermissions, TokenConstraints, Tokens, UfsConfig,
};
