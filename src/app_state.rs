//! Application State Management
//!
//! This module provides the application state that contains the
//! synchronizer and its stores, following the dependency injection pattern.

use std::sync::Arc;
use log::info;

use crate::catalog::{CatalogStore, mock_store::MockCatalogStore};
use crate::config::AppConfig;
use crate::service::catalog_service::CatalogSynchronizer;
use crate::storage::{BlobStore, mock_store::MockBlobStore};

/// Application state shared by every worker
#[derive(Clone)]
pub struct AppState {
    pub synchronizer: Arc<CatalogSynchronizer>,
    pub config: AppConfig,
}

impl AppState {
    /// Create application state from configuration
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application state with configuration");

        let blob_backend = config.storage.create_store()?;
        let catalog_backend = config.catalog.create_store()?;

        let synchronizer = CatalogSynchronizer::new(blob_backend, catalog_backend)
            .with_compensation(config.ingest.compensate_failed_inserts);

        info!("Application state initialized successfully");
        Ok(Self::with_synchronizer(synchronizer, config))
    }

    /// Create application state around an already built synchronizer
    pub fn with_synchronizer(synchronizer: CatalogSynchronizer, config: AppConfig) -> Self {
        Self {
            synchronizer: Arc::new(synchronizer),
            config,
        }
    }

    /// Create application state for testing with mock backends
    pub fn new_for_testing() -> Self {
        let blob_backend: Arc<dyn BlobStore> = Arc::new(MockBlobStore::new());
        let catalog_backend: Arc<dyn CatalogStore> = Arc::new(MockCatalogStore::new());
        Self::with_synchronizer(CatalogSynchronizer::new(blob_backend, catalog_backend), AppConfig::default())
    }
}
