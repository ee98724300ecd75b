//! Streaming handles returned by stores.

mod fingerprint;
mod read_stream;
mod write_stream;

pub use fingerprint::{Fingerprint, HashingReader};
pub use read_stream::{ByteStream, ReadStream};
pub use write_stream::{Completion, UploadPhase, WriteStream};
