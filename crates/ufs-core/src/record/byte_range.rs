//! Inclusive byte ranges for partial reads.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An inclusive byte range `[start, end]`.
///
/// A range always satisfies `start <= end`, including after
/// deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawByteRange")]
pub struct ByteRange {
    start: u64,
    end: u64,
}

#[derive(Deserialize)]
struct RawByteRange {
    start: u64,
    end: u64,
}

impl TryFrom<RawByteRange> for ByteRange {
    type Error = Error;

    fn try_from(raw: RawByteRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl ByteRange {
    /// Creates a range, rejecting `start > end`.
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start > end {
            return Err(Error::validation()
                .with_message(format!("range start {start} is after end {end}")));
        }
        Ok(Self { start, end })
    }

    /// First byte offset.
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last byte offset, inclusive.
    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered by the range.
    #[inline]
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Fits the range to an object of `size` bytes.
    ///
    /// The end is clamped to the last byte; a start at or beyond the end of
    /// the object cannot be satisfied.
    pub fn clamp(self, size: u64) -> Result<Self> {
        if self.start > self.end {
            return Err(Error::validation().with_message(format!(
                "range start {} is after end {}",
                self.start, self.end
            )));
        }
        if self.start >= size {
            return Err(Error::validation().with_message(format!(
                "range start {} is beyond object of {size} bytes",
                self.start
            )));
        }
        Ok(Self {
            start: self.start,
            end: self.end.min(size - 1),
        })
    }

    /// Returns the half-open equivalent, as used by most client libraries.
    #[inline]
    pub fn as_std(&self) -> std::ops::Range<u64> {
        self.start..self.end + 1
    }

    /// Formats the range as an HTTP `Range` header value.
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}
