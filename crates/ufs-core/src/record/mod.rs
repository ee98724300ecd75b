//! File identifiers, metadata and stored records.

mod byte_range;
mod file_id;
mod file_record;
mod new_file;

pub use byte_range::ByteRange;
pub use file_id::FileId;
pub use file_record::FileRecord;
pub use new_file::NewFile;
