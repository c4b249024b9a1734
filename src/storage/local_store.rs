//! Local directory blob storage implementation

use crate::error::BlobError;
use crate::storage::{sanitize_filename, BlobStore};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use log::{debug, info};

/// Flat directory of uploaded files, one file per sanitized name
pub struct LocalBlobStore {
    storage_path: PathBuf,
}

impl LocalBlobStore {
    /// Open the blob directory, creating it if needed
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, BlobError> {
        let storage_path = base_path.as_ref().to_path_buf();
        if !storage_path.exists() {
            fs::create_dir_all(&storage_path)?;
            info!("Created blob directory: {}", storage_path.display());
        }
        info!("Using blob directory: {}", storage_path.display());
        Ok(Self { storage_path })
    }

    /// Resolve a blob name to its file path. Names that would change under
    /// sanitization are refused rather than silently rewritten.
    fn blob_path(&self, name: &str) -> Result<PathBuf, BlobError> {
        match sanitize_filename(name) {
            Some(clean) if clean == name => Ok(self.storage_path.join(clean)),
            _ => Err(BlobError::InvalidName(name.to_string())),
        }
    }
}

impl BlobStore for LocalBlobStore {
    fn put_blob(&self, name: &str, data: &[u8]) -> Result<(), BlobError> {
        let path = self.blob_path(name)?;
        let mut file = File::create(&path)?;
        file.write_all(data)?;
        file.flush()?;
        debug!("Wrote blob {} ({} bytes)", path.display(), data.len());
        Ok(())
    }

    fn remove_blob(&self, name: &str) -> Result<(), BlobError> {
        let path = self.blob_path(name)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BlobError::NotFound(name.to_string()),
            _ => BlobError::Io(e),
        })?;
        debug!("Removed blob {}", path.display());
        Ok(())
    }

    fn blob_exists(&self, name: &str) -> bool {
        self.blob_path(name).map(|path| path.is_file()).unwrap_or(false)
    }

    fn read_blob(&self, name: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.blob_path(name)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BlobError::NotFound(name.to_string()),
            _ => BlobError::Io(e),
        })
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.storage_path)
    }
}
