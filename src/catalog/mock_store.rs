//! Mock implementation of CatalogStore trait for testing

use crate::catalog::{CatalogStore, Track};
use crate::error::CatalogError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Catalog operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOp {
    Count,
    Insert,
    Query,
    Decode,
    Delete,
}

#[derive(Default)]
struct Failures {
    count: AtomicBool,
    insert: AtomicBool,
    query: AtomicBool,
    decode: AtomicBool,
    delete: AtomicBool,
}

impl Failures {
    fn flag(&self, op: CatalogOp) -> &AtomicBool {
        match op {
            CatalogOp::Count => &self.count,
            CatalogOp::Insert => &self.insert,
            CatalogOp::Query => &self.query,
            CatalogOp::Decode => &self.decode,
            CatalogOp::Delete => &self.delete,
        }
    }

    fn check(&self, op: CatalogOp) -> Result<(), CatalogError> {
        if !self.flag(op).load(Ordering::SeqCst) {
            return Ok(());
        }
        Err(match op {
            CatalogOp::Decode => CatalogError::Decode("mock: undecodable record".to_string()),
            _ => CatalogError::Unavailable(format!("mock: {:?} failed", op)),
        })
    }
}

/// Mock implementation of CatalogStore for testing. Records keep insertion order.
pub struct MockCatalogStore {
    tracks: Arc<Mutex<Vec<Track>>>,
    failures: Failures,
}

impl MockCatalogStore {
    /// Create a new mock catalog store
    pub fn new() -> Self {
        Self {
            tracks: Arc::new(Mutex::new(Vec::new())),
            failures: Failures::default(),
        }
    }

    /// Make an operation fail (or succeed again)
    pub fn set_failing(&self, op: CatalogOp, failing: bool) {
        self.failures.flag(op).store(failing, Ordering::SeqCst);
    }

    /// Get the number of records in the store
    pub fn record_count(&self) -> usize {
        self.tracks.lock().map(|tracks| tracks.len()).unwrap_or(0)
    }

    /// Clear all records and failure switches (useful for test cleanup)
    pub fn clear(&self) {
        if let Ok(mut tracks) = self.tracks.lock() {
            tracks.clear();
        }
        for op in [CatalogOp::Count, CatalogOp::Insert, CatalogOp::Query, CatalogOp::Decode, CatalogOp::Delete] {
            self.set_failing(op, false);
        }
    }

    fn records(&self) -> Result<MutexGuard<'_, Vec<Track>>, CatalogError> {
        self.tracks
            .lock()
            .map_err(|_| CatalogError::Unavailable("mock catalog lock poisoned".to_string()))
    }
}

impl Default for MockCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore for MockCatalogStore {
    fn count_by_filename(&self, filename: &str) -> Result<u64, CatalogError> {
        self.failures.check(CatalogOp::Count)?;
        Ok(self.records()?.iter().filter(|t| t.filename == filename).count() as u64)
    }

    fn insert_many(&self, tracks: &[Track]) -> Result<(), CatalogError> {
        self.failures.check(CatalogOp::Insert)?;
        self.records()?.extend_from_slice(tracks);
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<Track>, CatalogError> {
        self.failures.check(CatalogOp::Query)?;
        self.failures.check(CatalogOp::Decode)?;
        Ok(self.records()?.clone())
    }

    fn delete_one(&self, filename: &str) -> Result<u64, CatalogError> {
        self.failures.check(CatalogOp::Delete)?;
        let mut tracks = self.records()?;
        match tracks.iter().position(|t| t.filename == filename) {
            Some(index) => {
                tracks.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
