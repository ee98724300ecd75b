//! The store contract and its lifecycle implementation.

mod copy;
mod upload_store;

use async_trait::async_trait;
pub use copy::copy_file;
pub use upload_store::UploadStore;
use url::Url;

use crate::filter::Filter;
use crate::permissions::{CallerContext, StorePermissions};
use crate::record::{ByteRange, FileId, FileRecord, NewFile};
use crate::stream::{ReadStream, WriteStream};
use crate::Result;

/// Uniform streaming interface over one named storage location.
///
/// Stores are selected at runtime through the [`Registry`] and used as
/// `Arc<dyn Store>`.
///
/// [`Registry`]: crate::Registry
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Registered name.
    fn name(&self) -> &str;

    /// Backend name (`local`, `opendal`, `blob`, ...).
    fn kind(&self) -> &'static str;

    /// Validation rules applied on create.
    fn filter(&self) -> &Filter;

    /// Authorization predicates.
    fn permissions(&self) -> &StorePermissions;

    /// Whether reads honor byte ranges.
    fn supports_range(&self) -> bool;

    /// Validates and persists an incomplete record for `file`.
    ///
    /// Fails with a validation error if the filter rejects the metadata and
    /// a permission error if insert is denied. Nothing is persisted on
    /// failure.
    async fn create(&self, caller: &CallerContext, file: NewFile) -> Result<FileRecord>;

    /// Creates an incomplete record that will receive a copy of `source`.
    async fn create_copy(&self, caller: &CallerContext, source: &FileRecord) -> Result<FileRecord>;

    /// Claims the single writer slot of an incomplete file.
    ///
    /// A second concurrent claim fails with a conflict.
    async fn get_write_stream(&self, caller: &CallerContext, id: &FileId) -> Result<WriteStream>;

    /// Streams a completed file, optionally restricted to an inclusive range.
    ///
    /// Incomplete files are not found.
    async fn get_read_stream(
        &self,
        caller: &CallerContext,
        id: &FileId,
        range: Option<ByteRange>,
    ) -> Result<ReadStream>;

    /// Removes the object and its record. Deleting an absent file succeeds.
    async fn delete(&self, caller: &CallerContext, id: &FileId) -> Result<()>;

    /// Returns a short-lived direct URL, or `None` when the file must be
    /// streamed.
    async fn get_redirect_url(
        &self,
        caller: &CallerContext,
        id: &FileId,
        force_download: bool,
    ) -> Result<Option<Url>>;

    /// Returns a completed record.
    async fn get_file(&self, id: &FileId) -> Result<FileRecord>;

    /// Returns a record whether or not it is complete.
    async fn find(&self, id: &FileId) -> Result<Option<FileRecord>>;

    /// Returns every record, incomplete ones included.
    async fn list(&self) -> Result<Vec<FileRecord>>;

    /// Removes a file without a permission check. Used to roll back
    /// internal operations.
    async fn discard(&self, id: &FileId) -> Result<()>;
}
