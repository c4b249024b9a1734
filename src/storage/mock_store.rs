//! Mock implementation of BlobStore trait for testing

use crate::error::BlobError;
use crate::storage::{BlobName, BlobStore};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use log::info;

/// Mock implementation of BlobStore for testing
pub struct MockBlobStore {
    // In-memory storage: blob name -> bytes
    blobs: Arc<Mutex<HashMap<BlobName, Vec<u8>>>>,
    // Names whose writes fail
    rejected: Arc<Mutex<HashSet<BlobName>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, BlobError> {
    mutex
        .lock()
        .map_err(|_| BlobError::Unavailable("mock blob store lock poisoned".to_string()))
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(Mutex::new(HashMap::new())),
            rejected: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Make every write to `name` fail until cleared
    pub fn reject_writes_for(&self, name: &str) {
        if let Ok(mut rejected) = self.rejected.lock() {
            rejected.insert(name.to_string());
        }
    }

    /// Get the number of blobs in the store
    pub fn blob_count(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }

    /// List all blob names
    pub fn list_blobs(&self) -> Vec<BlobName> {
        self.blobs
            .lock()
            .map(|blobs| blobs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Clear all data and rejections from the store
    pub fn clear(&self) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.clear();
        }
        if let Ok(mut rejected) = self.rejected.lock() {
            rejected.clear();
        }
    }
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for MockBlobStore {
    fn put_blob(&self, name: &str, data: &[u8]) -> Result<(), BlobError> {
        if lock(&self.rejected)?.contains(name) {
            return Err(BlobError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("mock rejected write for {}", name),
            )));
        }
        lock(&self.blobs)?.insert(name.to_string(), data.to_vec());
        info!("Mock: Wrote blob {} with size {}", name, data.len());
        Ok(())
    }

    fn remove_blob(&self, name: &str) -> Result<(), BlobError> {
        match lock(&self.blobs)?.remove(name) {
            Some(_) => {
                info!("Mock: Removed blob {}", name);
                Ok(())
            }
            None => Err(BlobError::NotFound(name.to_string())),
        }
    }

    fn blob_exists(&self, name: &str) -> bool {
        self.blobs
            .lock()
            .map(|blobs| blobs.contains_key(name))
            .unwrap_or(false)
    }

    fn read_blob(&self, name: &str) -> Result<Vec<u8>, BlobError> {
        lock(&self.blobs)?
            .get(name)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(name.to_string()))
    }

    fn root(&self) -> Option<&Path> {
        None
    }
}
