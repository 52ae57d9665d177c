use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use blobshard_types::Digest;

use crate::error::{StoreError, StoreResult};

/// Sequential reader over a stored blob.
///
/// Reads go straight to the underlying file; nothing is buffered beyond what
/// the caller asks for, so blobs of any size can be streamed out.
#[derive(Debug)]
pub struct BlobReader {
    digest: Digest,
    file: File,
}

impl BlobReader {
    pub(crate) fn open(digest: Digest, path: &Path) -> StoreResult<Self> {
        match File::open(path) {
            Ok(file) => Ok(Self { digest, file }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(digest)),
            Err(e) => Err(e.into()),
        }
    }

    /// Digest of the blob being read.
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Size of the blob in bytes.
    pub fn len(&self) -> StoreResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}
