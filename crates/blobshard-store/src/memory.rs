use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Read;
use std::sync::RwLock;

use blobshard_types::Digest;
use bytes::{Buf, Bytes};

use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and for embedding the store where durability is not
/// wanted. Writes buffer the whole input before hashing it, so blob size is
/// bounded by available memory. Readers share the stored bytes without
/// copying them.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<Digest, Bytes>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|b| b.len() as u64)
            .sum()
    }

    /// Return a sorted list of all stored digests.
    pub fn all_digests(&self) -> Vec<Digest> {
        let map = self.blobs.read().expect("lock poisoned");
        let mut digests: Vec<Digest> = map.keys().copied().collect();
        digests.sort();
        digests
    }

    fn buffer(reader: &mut dyn Read) -> StoreResult<(Digest, Bytes)> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok((Digest::of(&data), Bytes::from(data)))
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn create(&self, reader: &mut dyn Read) -> StoreResult<Digest> {
        let (digest, data) = Self::buffer(reader)?;
        let mut map = self.blobs.write().expect("lock poisoned");
        match map.entry(digest) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(digest)),
            Entry::Vacant(slot) => {
                slot.insert(data);
                Ok(digest)
            }
        }
    }

    fn insert(&self, reader: &mut dyn Read) -> StoreResult<Digest> {
        let (digest, data) = Self::buffer(reader)?;
        self.blobs
            .write()
            .expect("lock poisoned")
            .insert(digest, data);
        Ok(digest)
    }

    fn get(&self, digest: &Digest) -> StoreResult<Box<dyn Read + Send>> {
        let map = self.blobs.read().expect("lock poisoned");
        let data = map.get(digest).cloned().ok_or(StoreError::NotFound(*digest))?;
        Ok(Box::new(data.reader()))
    }

    fn exists(&self, digest: &Digest) -> StoreResult<bool> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.contains_key(digest))
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &count)
            .finish()
    }
}
