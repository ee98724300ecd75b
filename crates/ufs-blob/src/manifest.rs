//! Sealed object manifest.

use serde::{Deserialize, Serialize};

/// Describes a sealed chunk sequence.
///
/// Chunks `0..chunk_count` all hold `chunk_size` bytes except the last,
/// which holds the remainder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    /// Size of every chunk but the last.
    pub chunk_size: u64,
    /// Number of chunks.
    pub chunk_count: u64,
    /// Total object length.
    pub length: u64,
    /// Hex SHA-256 of the object.
    pub sha256: String,
}

impl ChunkManifest {
    /// Returns the expected length of chunk `index`.
    pub fn chunk_len(&self, index: u64) -> u64 {
        if index + 1 < self.chunk_count {
            self.chunk_size
        } else if index + 1 == self.chunk_count {
            self.length - self.chunk_size * index
        } else {
            0
        }
    }

    /// Returns the chunks covering the inclusive byte span `start..=end`
    /// together with the offset to skip in the first chunk and the number
    /// of bytes to keep from the last.
    pub fn span(&self, start: u64, end: u64) -> (std::ops::RangeInclusive<u64>, u64, u64) {
        let first = start / self.chunk_size;
        let last = end / self.chunk_size;
        (first..=last, start % self.chunk_size, end % self.chunk_size + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(length: u64) -> ChunkManifest {
        ChunkManifest {
            chunk_size: 4,
            chunk_count: length.div_ceil(4),
            length,
            sha256: String::new(),
        }
    }

    #[test]
    fn chunk_lengths() {
        let m = manifest(10);
        assert_eq!(m.chunk_count, 3);
        assert_eq!(m.chunk_len(0), 4);
        assert_eq!(m.chunk_len(1), 4);
        assert_eq!(m.chunk_len(2), 2);
        assert_eq!(m.chunk_len(3), 0);
        assert_eq!(manifest(8).chunk_len(1), 4);
    }

    #[test]
    fn spans() {
        let m = manifest(10);
        assert_eq!(m.span(0, 9), (0..=2, 0, 2));
        assert_eq!(m.span(5, 6), (1..=1, 1, 3));
        assert_eq!(m.span(3, 4), (0..=1, 3, 1));
    }
}
