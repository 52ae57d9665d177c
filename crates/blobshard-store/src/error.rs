use std::path::PathBuf;

use blobshard_types::{Digest, TypeError};

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A blob with this digest is already stored (exclusive create only).
    #[error("blob already exists: {0}")]
    AlreadyExists(Digest),

    /// No blob is stored under this digest.
    #[error("blob not found: {0}")]
    NotFound(Digest),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A digest string is too short to derive its shard directories.
    #[error("digest `{digest}` is too short to shard (need at least {min} characters)")]
    DigestTooShort { digest: String, min: usize },

    /// A path the store expects to be a directory is something else.
    #[error("{} exists but is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Stored bytes no longer hash to the blob's name.
    #[error("hash mismatch for {digest}: computed {computed}")]
    HashMismatch { digest: Digest, computed: Digest },

    /// A caller-supplied string is not a valid digest.
    #[error("invalid digest: {0}")]
    InvalidDigest(#[from] TypeError),
}

impl StoreError {
    /// Returns `true` for conditions callers are expected to handle
    /// (`AlreadyExists`, `NotFound`) rather than report as failures.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::AlreadyExists(_) | Self::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
