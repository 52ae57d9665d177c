use std::io::{self, Read, Write};

use blobshard_types::Digest;
use sha2::{Digest as _, Sha256};

/// Incremental SHA-256 hasher producing a [`Digest`].
///
/// The store hashes a blob while its bytes are streamed elsewhere, so the
/// hasher is fed in chunks and finalized once the source is exhausted.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
    bytes: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more bytes into the hash.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes hashed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Consume the hasher and return the digest.
    pub fn finalize(self) -> Digest {
        let hash = self.inner.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Digest::from_hash(bytes)
    }

    /// One-shot hash of an in-memory buffer.
    pub fn hash(data: &[u8]) -> Digest {
        Digest::of(data)
    }

    /// Hash a reader to exhaustion.
    ///
    /// The reader is consumed exactly once; read errors are returned as-is.
    pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<Digest> {
        let mut writer = HashingWriter::new(io::sink());
        io::copy(&mut reader, &mut writer)?;
        let (_, digest, _) = writer.finish();
        Ok(digest)
    }
}

/// Writer adapter that hashes every byte passed through to `inner`.
///
/// This is the tee between the digest computation and the write stage:
/// copying a source into a `HashingWriter` wrapping a staging file yields
/// both the staged bytes and their digest from a single pass over the source.
pub struct HashingWriter<W> {
    inner: W,
    hasher: ContentHasher,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: ContentHasher::new(),
        }
    }

    /// Return the wrapped writer, the digest of everything written and the
    /// number of bytes written.
    pub fn finish(self) -> (W, Digest, u64) {
        let bytes = self.hasher.bytes_hashed();
        (self.inner, self.hasher.finalize(), bytes)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        // Only the bytes the inner writer accepted are part of the content.
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingReader {
        remaining: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream dropped"));
            }
            let n = buf.len().min(self.remaining);
            buf[..n].fill(b'x');
            self.remaining -= n;
            Ok(n)
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let id1 = ContentHasher::hash(b"hello world");
        let id2 = ContentHasher::hash(b"hello world");
        assert_eq!(id1, id2);
    }

    #[test]
    fn hash_reader_matches_known_vector() {
        let digest = ContentHasher::hash_reader(&b"file contents"[..]).unwrap();
        assert_eq!(
            digest.to_hex(),
            "7bb6f9f7a47a63e684925af3608c059edcc371eb81188c48c9714896fb1091fd"
        );
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut hasher = ContentHasher::new();
        hasher.update(b"Hello, ");
        hasher.update(b"world!");
        assert_eq!(hasher.bytes_hashed(), 13);
        assert_eq!(hasher.finalize(), ContentHasher::hash(b"Hello, world!"));
    }

    #[test]
    fn empty_input_hashes() {
        let digest = ContentHasher::hash_reader(io::empty()).unwrap();
        assert_eq!(
            digest.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hashing_writer_tees_bytes() {
        let mut writer = HashingWriter::new(Vec::new());
        io::copy(&mut &b"tee me"[..], &mut writer).unwrap();
        let (buf, digest, n) = writer.finish();
        assert_eq!(buf, b"tee me");
        assert_eq!(n, 6);
        assert_eq!(digest, ContentHasher::hash(b"tee me"));
    }

    #[test]
    fn read_error_is_surfaced_unchanged() {
        let err = ContentHasher::hash_reader(FailingReader { remaining: 10 }).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
