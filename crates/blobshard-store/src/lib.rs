//! Sharded content-addressed blob storage.
//!
//! Blobs are arbitrary byte streams named by the SHA-256 [`Digest`] of their
//! contents and stored as plain files at
//! `<root>/<digest[0:2]>/<digest[2:4]>/<digest>`. The file holds exactly the
//! input bytes; there is no header.
//!
//! # Operations
//!
//! - [`FsBlobStore::create`] -- store a stream, failing with
//!   [`StoreError::AlreadyExists`] if its digest is already present
//! - [`FsBlobStore::insert`] -- store a stream, replacing any existing blob
//! - [`FsBlobStore::get`] -- stream a blob back out by digest
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`FsBlobStore`] -- the sharded on-disk store
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. A blob's name is the digest of its bytes. The store never accepts a
//!    caller-chosen name.
//! 2. Stage, flush, then rename: a blob becomes visible only once it is
//!    complete and on stable storage.
//! 3. The filesystem is the only lock. Exclusive creation and directory
//!    creation are race-free without any in-process synchronization.
//! 4. Every operation blocks. Async hosts should call from a blocking pool.
//! 5. Errors are returned, never retried or logged on the caller's behalf.
//! 6. Nothing is ever deleted; there is no garbage collection.

pub mod error;
pub mod fs;
pub mod hasher;
pub mod layout;
pub mod memory;
pub mod reader;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use blobshard_types::Digest;
pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use hasher::{ContentHasher, HashingWriter};
pub use layout::{shard_of, ShardLayout};
pub use memory::InMemoryBlobStore;
pub use reader::BlobReader;
pub use traits::BlobStore;
