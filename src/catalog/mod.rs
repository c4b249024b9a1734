//! Catalog Storage Layer Abstraction
//!
//! This module provides an abstraction over the document collection that
//! holds track metadata, allowing the synchronizer to use SQLite or an
//! in-memory collection without affecting higher-level services.

pub mod sqlite_store;
pub mod mock_store;
pub mod config;


use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// URL prefix under which uploaded blobs are served
pub const SONGS_PREFIX: &str = "/songs";

/// Default name of the track collection
pub const DEFAULT_COLLECTION: &str = "mix_tape_songs";

/// Public path of a track, derived from its filename
pub fn public_path(filename: &str) -> String {
    format!("{}/{}", SONGS_PREFIX, filename)
}

/// A catalogued track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Track {
    /// Original uploaded file name, the logical identifier of the track
    pub filename: String,
    /// Public path of the blob, always `public_path(filename)`
    pub path: String,
    /// Upload time in seconds since the epoch
    pub uploaded: i64,
}

impl Track {
    /// Create a track record for a freshly ingested file
    pub fn new(filename: impl Into<String>, uploaded: i64) -> Self {
        let filename = filename.into();
        Self {
            path: public_path(&filename),
            filename,
            uploaded,
        }
    }
}

/// Trait defining the catalog storage interface
pub trait CatalogStore: Send + Sync {
    /// Count records carrying a filename
    fn count_by_filename(&self, filename: &str) -> Result<u64, CatalogError>;

    /// Insert a batch of records in one call
    fn insert_many(&self, tracks: &[Track]) -> Result<(), CatalogError>;

    /// Fetch every record in store order
    fn find_all(&self) -> Result<Vec<Track>, CatalogError>;

    /// Delete the first record carrying a filename, returning how many were removed
    fn delete_one(&self, filename: &str) -> Result<u64, CatalogError>;
}
