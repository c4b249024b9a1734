//! Blob Storage Layer Abstraction
//!
//! This module provides an abstraction over the store holding raw uploaded
//! bytes, allowing the synchronizer to run against a local directory or an
//! in-memory map without affecting higher-level services.

pub mod local_store;
pub mod mock_store;
pub mod config;

use std::path::Path;

use crate::error::BlobError;

/// Trait defining the blob storage interface
pub trait BlobStore: Send + Sync {
    /// Store bytes under a name, overwriting any blob already stored there
    fn put_blob(&self, name: &str, data: &[u8]) -> Result<(), BlobError>;

    /// Remove a blob; an absent blob is an error
    fn remove_blob(&self, name: &str) -> Result<(), BlobError>;

    /// Check whether a blob is stored under a name
    fn blob_exists(&self, name: &str) -> bool;

    /// Read back the bytes of a blob
    fn read_blob(&self, name: &str) -> Result<Vec<u8>, BlobError>;

    /// On-disk directory holding the blobs, if the backend has one
    fn root(&self) -> Option<&Path>;
}

/// Blob name type
pub type BlobName = String;

/// Reduce an uploaded filename to a safe flat blob name.
///
/// Keeps only the last path component (either separator style) so a client
/// cannot address anything outside the blob directory. Returns `None` when
/// nothing usable is left.
pub fn sanitize_filename(filename: &str) -> Option<BlobName> {
    let base = filename
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("");

    match base {
        "" | "." | ".." => None,
        name if name.contains('\0') => None,
        name => Some(name.to_string()),
    }
}
