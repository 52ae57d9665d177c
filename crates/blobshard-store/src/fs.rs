//! Sharded filesystem blob store.
//!
//! # Write path
//!
//! Every write is staged: the input is streamed once through the hasher into
//! a temporary file under `<root>/.staging/`, flushed to disk, and only then
//! moved to its shard path. Moving is a single atomic rename, so readers see
//! either no blob or the complete blob, never a truncated one.
//!
//! - [`FsBlobStore::create`] publishes with a no-clobber rename. The
//!   filesystem decides atomically whether the target exists; exactly one of
//!   any number of concurrent creators wins.
//! - [`FsBlobStore::insert`] publishes with a plain rename, replacing any
//!   existing blob. Concurrent inserts resolve to the last rename.
//!
//! Staging on disk instead of in memory bounds blob size by free space
//! rather than RAM. The host is still responsible for capping input size.

use std::fs;
use std::io::{self, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use blobshard_types::Digest;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::hasher::{ContentHasher, HashingWriter};
use crate::layout::{sync_dir, ShardLayout, STAGING_DIR};
use crate::reader::BlobReader;
use crate::traits::BlobStore;

/// Prefix for staging file names.
const STAGING_PREFIX: &str = "blob-";

/// Staging files older than this are left over from a crashed writer and
/// are removed when a store is opened.
pub const STALE_STAGING_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Mode applied to published blobs (before umask).
#[cfg(unix)]
const BLOB_MODE: u32 = 0o644;

/// How a staged blob is published.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriteMode {
    /// Fail if the digest is already stored.
    Create,
    /// Replace whatever is stored.
    Insert,
}

/// Content-addressed blob store rooted at a directory.
///
/// The root is fixed at construction. Handles are cheap to share across
/// threads; the filesystem is the only synchronization point.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    layout: ShardLayout,
}

impl FsBlobStore {
    /// Open (or initialize) a store rooted at `root`.
    ///
    /// Relative paths are resolved against the current directory. The root
    /// is created if missing. Staging files older than [`STALE_STAGING_AGE`]
    /// are swept.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = std::path::absolute(root.as_ref())?;
        if let Err(e) = fs::create_dir_all(&root) {
            if root.exists() && !root.is_dir() {
                return Err(StoreError::NotADirectory(root));
            }
            return Err(e.into());
        }
        if !fs::metadata(&root)?.is_dir() {
            return Err(StoreError::NotADirectory(root));
        }

        let layout = ShardLayout::new(root);
        layout.prepare_staging()?;
        let store = Self { layout };
        let swept = store.sweep_staging(STALE_STAGING_AGE)?;
        info!(root = %store.root().display(), swept, "opened blob store");
        Ok(store)
    }

    /// Remove staging files last modified at least `older_than` ago.
    ///
    /// Returns the number of files removed. A file that vanishes while
    /// sweeping was finished by its writer and is not an error.
    pub fn sweep_staging(&self, older_than: Duration) -> StoreResult<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(self.layout.staging_dir())? {
            let entry = entry?;
            let is_staged = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(STAGING_PREFIX));
            if !is_staged || !entry.file_type()?.is_file() {
                continue;
            }
            let age = match entry.metadata() {
                Ok(meta) => meta.modified()?.elapsed().unwrap_or_default(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if age < older_than {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!(path = %entry.path().display(), ?age, "removed stale staging file");
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    /// Absolute root directory of the store.
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Digest-to-path mapping used by this store.
    pub fn layout(&self) -> &ShardLayout {
        &self.layout
    }

    /// Path a blob with this digest is (or would be) stored at.
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.layout.blob_path(digest)
    }

    /// Store `reader`'s bytes unless a blob with the same digest exists.
    ///
    /// Returns [`StoreError::AlreadyExists`] without modifying the store if
    /// the digest is already present.
    pub fn create<R: Read>(&self, reader: R) -> StoreResult<Digest> {
        self.write(reader, WriteMode::Create)
    }

    /// Store `reader`'s bytes, replacing any blob with the same digest.
    pub fn insert<R: Read>(&self, reader: R) -> StoreResult<Digest> {
        self.write(reader, WriteMode::Insert)
    }

    /// Open the blob stored under `digest`.
    pub fn get(&self, digest: &Digest) -> StoreResult<BlobReader> {
        BlobReader::open(*digest, &self.layout.blob_path(digest))
    }

    /// Check whether a blob is stored under `digest`.
    pub fn exists(&self, digest: &Digest) -> StoreResult<bool> {
        match fs::metadata(self.layout.blob_path(digest)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Re-hash a stored blob and check it still matches its name.
    pub fn verify(&self, digest: &Digest) -> StoreResult<()> {
        let computed = ContentHasher::hash_reader(self.get(digest)?)?;
        if computed != *digest {
            return Err(StoreError::HashMismatch {
                digest: *digest,
                computed,
            });
        }
        Ok(())
    }

    /// Iterate over the digests of all stored blobs in sorted order.
    ///
    /// Files that are not at the shard path their name implies are skipped,
    /// as is the staging area.
    pub fn digests(&self) -> impl Iterator<Item = StoreResult<Digest>> + '_ {
        WalkDir::new(self.layout.root())
            .max_depth(3)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() != 1 || entry.file_name() != STAGING_DIR)
            .filter_map(move |entry| match entry {
                Err(e) => Some(Err(StoreError::Io(e.into()))),
                Ok(entry) if entry.depth() == 3 && entry.file_type().is_file() => entry
                    .file_name()
                    .to_str()
                    .and_then(|name| Digest::from_hex(name).ok())
                    .filter(|digest| self.layout.blob_path(digest) == entry.path())
                    .map(Ok),
                Ok(_) => None,
            })
    }

    fn write<R: Read>(&self, mut reader: R, mode: WriteMode) -> StoreResult<Digest> {
        let staged = self.stage()?;
        let mut writer = HashingWriter::new(BufWriter::new(staged));
        io::copy(&mut reader, &mut writer)?;
        let (buffered, digest, size) = writer.finish();
        let staged = buffered.into_inner().map_err(|e| e.into_error())?;
        staged.as_file().sync_all()?;

        let shard = self.layout.prepare(&digest)?;
        let target = shard.join(digest.to_hex());
        publish(staged, &target, mode).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists if mode == WriteMode::Create => {
                StoreError::AlreadyExists(digest)
            }
            _ => StoreError::Io(e),
        })?;
        sync_dir(&shard)?;

        debug!(%digest, size, ?mode, "stored blob");
        Ok(digest)
    }

    fn stage(&self) -> StoreResult<NamedTempFile> {
        let staging = self.layout.prepare_staging()?;
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(BLOB_MODE));
        }
        Ok(builder.tempfile_in(staging)?)
    }
}

/// Move a flushed staging file into place. On failure the staging file is
/// dropped, which removes it.
fn publish(staged: NamedTempFile, target: &Path, mode: WriteMode) -> io::Result<()> {
    let result = match mode {
        WriteMode::Create => staged.persist_noclobber(target),
        WriteMode::Insert => staged.persist(target),
    };
    result.map(drop).map_err(|e| e.error)
}

impl BlobStore for FsBlobStore {
    fn create(&self, reader: &mut dyn Read) -> StoreResult<Digest> {
        FsBlobStore::create(self, reader)
    }

    fn insert(&self, reader: &mut dyn Read) -> StoreResult<Digest> {
        FsBlobStore::insert(self, reader)
    }

    fn get(&self, digest: &Digest) -> StoreResult<Box<dyn Read + Send>> {
        Ok(Box::new(FsBlobStore::get(self, digest)?))
    }

    fn exists(&self, digest: &Digest) -> StoreResult<bool> {
        FsBlobStore::exists(self, digest)
    }
}
