use std::io::Read;

use blobshard_types::Digest;

use crate::error::StoreResult;

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - A blob's name is the digest of its bytes; the store never accepts a
///   caller-chosen name.
/// - `create` fails with `AlreadyExists` when the digest is present, and the
///   check and the write are one atomic step.
/// - `insert` succeeds whether or not the digest is present.
/// - A failed write never leaves a partial blob visible to `get`.
/// - `get` of an absent digest fails with `NotFound`, distinct from I/O errors.
pub trait BlobStore: Send + Sync {
    /// Store a stream only if its digest is not already present.
    fn create(&self, reader: &mut dyn Read) -> StoreResult<Digest>;

    /// Store a stream, replacing any blob already stored under its digest.
    fn insert(&self, reader: &mut dyn Read) -> StoreResult<Digest>;

    /// Open a stored blob for sequential reading.
    fn get(&self, digest: &Digest) -> StoreResult<Box<dyn Read + Send>>;

    /// Check whether a blob is stored under `digest`.
    fn exists(&self, digest: &Digest) -> StoreResult<bool>;

    /// Insert an in-memory buffer.
    fn insert_bytes(&self, data: &[u8]) -> StoreResult<Digest> {
        self.insert(&mut &data[..])
    }

    /// Read a whole blob into memory.
    ///
    /// Convenience for small blobs; prefer [`BlobStore::get`] for streaming.
    fn read_to_vec(&self, digest: &Digest) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.get(digest)?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}
