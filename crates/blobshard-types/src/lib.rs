//! Foundation types for blobshard.
//!
//! Every blob in the store is named by its [`Digest`]: the SHA-256 hash of
//! its bytes, rendered as 64 lowercase hex characters. Identical content
//! always produces the same digest, which is what lets the digest double as
//! the blob's file name.

pub mod digest;
pub mod error;

pub use digest::Digest;
pub use error::TypeError;
