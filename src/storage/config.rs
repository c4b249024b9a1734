//! Configuration for blob storage backends

use crate::error::BlobError;
use crate::storage::{BlobStore, local_store::LocalBlobStore, mock_store::MockBlobStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use log::info;

/// Available blob storage backends
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum BlobBackend {
    #[default]
    LocalFS,
    Mock,
}

impl std::str::FromStr for BlobBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "localfs" | "local" | "fs" => Ok(BlobBackend::LocalFS),
            "mock" => Ok(BlobBackend::Mock),
            _ => Err(format!("Unknown blob backend: {}", s))
        }
    }
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Blob backend type
    pub backend: BlobBackend,
    /// Directory holding uploaded files
    pub base_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackend::default(),
            base_path: "uploads".to_string(),
        }
    }
}

impl StorageConfig {
    /// Create a blob store instance based on the configuration
    pub fn create_store(&self) -> Result<Arc<dyn BlobStore>, BlobError> {
        match self.backend {
            BlobBackend::LocalFS => {
                info!("Creating local blob store at {}", self.base_path);
                Ok(Arc::new(LocalBlobStore::new(&self.base_path)?))
            }
            BlobBackend::Mock => {
                info!("Creating mock blob store");
                Ok(Arc::new(MockBlobStore::new()))
            }
        }
    }
}
