//! Digest-to-path resolution.
//!
//! Blobs live at `<root>/<d[0:2]>/<d[2:4]>/<d>`, where `d` is the hex digest.
//! The two shard levels cap every directory at 256 entries (plus the blobs in
//! the leaf), however large the store grows. This layout is the durable
//! on-disk contract and must not change.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use blobshard_types::{Digest, TypeError};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Number of hex characters consumed by each shard level.
pub const SHARD_WIDTH: usize = 2;

/// Shortest digest string that can be sharded.
pub const MIN_DIGEST_LEN: usize = SHARD_WIDTH * 2;

/// Directory under the root that holds in-flight writes. Never a valid
/// shard name, so it cannot collide with blob directories.
pub const STAGING_DIR: &str = ".staging";

/// Split a hex digest into its two shard directory names.
pub fn shard_of(digest: &str) -> StoreResult<(&str, &str)> {
    if digest.len() < MIN_DIGEST_LEN {
        return Err(StoreError::DigestTooShort {
            digest: digest.to_string(),
            min: MIN_DIGEST_LEN,
        });
    }
    match (
        digest.get(..SHARD_WIDTH),
        digest.get(SHARD_WIDTH..MIN_DIGEST_LEN),
    ) {
        (Some(first), Some(second)) => Ok((first, second)),
        _ => Err(StoreError::InvalidDigest(TypeError::InvalidHex(format!(
            "`{digest}` is not ASCII"
        )))),
    }
}

/// Maps digests to locations under a fixed root directory.
#[derive(Clone, Debug)]
pub struct ShardLayout {
    root: PathBuf,
    staging: PathBuf,
}

impl ShardLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let staging = root.join(STAGING_DIR);
        Self { root, staging }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding in-flight writes.
    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Leaf shard directory for a digest.
    pub fn shard_dir(&self, digest: &Digest) -> PathBuf {
        let hex = digest.to_hex();
        let (first, second) = (&hex[..SHARD_WIDTH], &hex[SHARD_WIDTH..MIN_DIGEST_LEN]);
        self.root.join(first).join(second)
    }

    /// Full path of the blob file for a digest.
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.shard_dir(digest).join(digest.to_hex())
    }

    /// Ensure both shard levels for `digest` exist and return the leaf.
    ///
    /// Safe to call concurrently: losing a creation race is success. A level
    /// created here is made durable in its parent before this returns.
    pub fn prepare(&self, digest: &Digest) -> StoreResult<PathBuf> {
        let hex = digest.to_hex();
        let (first, second) = shard_of(&hex)?;
        let first_dir = self.root.join(first);
        ensure_dir(&first_dir)?;
        let leaf = first_dir.join(second);
        ensure_dir(&leaf)?;
        Ok(leaf)
    }

    /// Ensure the staging directory exists.
    pub fn prepare_staging(&self) -> StoreResult<&Path> {
        ensure_dir(&self.staging)?;
        Ok(&self.staging)
    }
}

/// Create a single directory level, accepting an existing directory.
///
/// Returns `true` if this call created the directory, in which case the
/// parent has been synced so the new entry survives a crash.
pub(crate) fn ensure_dir(path: &Path) -> StoreResult<bool> {
    match fs::create_dir(path) {
        Ok(()) => {
            if let Some(parent) = path.parent() {
                sync_dir(parent)?;
            }
            debug!(path = %path.display(), "created directory");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            if fs::metadata(path)?.is_dir() {
                Ok(false)
            } else {
                Err(StoreError::NotADirectory(path.to_path_buf()))
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Flush a directory's entries to stable storage.
#[cfg(unix)]
pub(crate) fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
pub(crate) fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
