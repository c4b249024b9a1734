//! Configuration for catalog storage backends

use crate::catalog::{CatalogStore, DEFAULT_COLLECTION, sqlite_store::SQLiteCatalogStore, mock_store::MockCatalogStore};
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use log::info;

/// Available catalog storage backends
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum CatalogBackend {
    #[default]
    SQLite,
    Mock,
}

impl std::str::FromStr for CatalogBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(CatalogBackend::SQLite),
            "mock" => Ok(CatalogBackend::Mock),
            _ => Err(format!("Unknown catalog backend: {}", s))
        }
    }
}

/// Catalog backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog backend type
    pub backend: CatalogBackend,
    /// Database file path
    pub db_path: String,
    /// Collection holding the track records
    pub collection: String,
    /// Enable WAL mode
    pub wal_mode: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            backend: CatalogBackend::default(),
            db_path: "./data/catalog.db".to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            wal_mode: true,
        }
    }
}

impl CatalogConfig {
    /// Create a catalog store instance based on the configuration
    pub fn create_store(&self) -> Result<Arc<dyn CatalogStore>, CatalogError> {
        match self.backend {
            CatalogBackend::SQLite => {
                info!("Creating SQLite catalog store at {} (collection {}, wal_mode {})",
                      self.db_path, self.collection, self.wal_mode);
                Ok(Arc::new(SQLiteCatalogStore::open(&self.db_path, &self.collection, self.wal_mode)?))
            }
            CatalogBackend::Mock => {
                info!("Creating mock catalog store");
                Ok(Arc::new(MockCatalogStore::new()))
            }
        }
    }
}
