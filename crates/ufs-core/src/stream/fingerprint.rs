//! SHA-256 content fingerprints used as ETags.

use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, ReadBuf};

/// Incremental SHA-256 over the bytes of an upload.
#[derive(Debug, Clone, Default)]
pub struct Fingerprint {
    hasher: Sha256,
    length: u64,
}

impl Fingerprint {
    /// Creates an empty fingerprint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds bytes into the fingerprint.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.length += data.len() as u64;
    }

    /// Number of bytes fed so far.
    #[inline]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Consumes the fingerprint and returns the raw digest.
    pub fn finalize(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }

    /// Consumes the fingerprint and returns the digest as lowercase hex.
    pub fn finalize_hex(self) -> String {
        hex::encode(self.finalize())
    }
}

pin_project! {
    /// An async reader that fingerprints data as it flows through.
    ///
    /// Used to compute the ETag of content read from disk or the network
    /// without buffering it.
    pub struct HashingReader<R> {
        #[pin]
        inner: R,
        fingerprint: Fingerprint,
    }
}

impl<R> HashingReader<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            fingerprint: Fingerprint::new(),
        }
    }

    /// Consumes the reader and returns the fingerprint of everything read.
    pub fn into_fingerprint(self) -> Fingerprint {
        self.fingerprint
    }
}

impl<R: AsyncRead> AsyncRead for HashingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();

        match this.inner.poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let new_bytes = &buf.filled()[before..];
                if !new_bytes.is_empty() {
                    this.fingerprint.update(new_bytes);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    const HELLO_SHA256: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

    #[test]
    fn empty_fingerprint() {
        let expected = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert_eq!(Fingerprint::new().finalize_hex(), expected);
    }

    #[test]
    fn incremental_updates_match_one_shot() {
        let mut fp = Fingerprint::new();
        fp.update(b"Hello, ");
        fp.update(b"World!");
        assert_eq!(fp.length(), 13);
        assert_eq!(fp.finalize_hex(), HELLO_SHA256);
    }

    #[tokio::test]
    async fn hashing_reader_chunked() {
        let data = b"Hello, World!";
        let mut reader = HashingReader::new(&data[..]);

        let mut buf = [0u8; 5];
        let mut total = Vec::new();
        loop {
            let n = reader.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            total.extend_from_slice(&buf[..n]);
        }

        assert_eq!(total, data);
        assert_eq!(reader.into_fingerprint().finalize_hex(), HELLO_SHA256);
    }
}
