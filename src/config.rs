//! Application Configuration
//!
//! This module provides configuration management for the application,
//! supporting YAML configuration files with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{env, fs};
use log::{info, warn};

pub use crate::catalog::config::{CatalogBackend, CatalogConfig};
pub use crate::storage::config::{BlobBackend, StorageConfig};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "MIXTAPE_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Blob storage configuration
    pub storage: StorageConfig,
    /// Catalog configuration
    pub catalog: CatalogConfig,
    /// Ingest behaviour
    pub ingest: IngestConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum accepted upload size in bytes
    pub max_payload_size: u64,
}

/// Ingest configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Remove freshly written blobs when the catalog insert fails
    pub compensate_failed_inserts: bool,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to log configuration file
    pub config_file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: 4,
            max_payload_size: 1073741824, // 1GB
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            allowed_origins: strings(&["*"]),
            allowed_methods: strings(&["GET", "POST", "PUT", "DELETE", "OPTIONS"]),
            allowed_headers: strings(&["Origin", "Content-Type"]),
            expose_headers: strings(&["Content-Length"]),
            allow_credentials: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "server_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `$MIXTAPE_CONFIG` or `config.yaml`, use defaults if not found
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.yaml".to_string());
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file, use defaults if it does not exist
    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = config_path.as_ref();
        if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            let config: AppConfig = serde_yaml::from_str(&content)?;
            config.validate()?;
            info!("Loaded configuration from {}", config_path.display());
            Ok(config)
        } else {
            warn!("Config file {} not found, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Reject values the server cannot start with
    pub fn validate(&self) -> Result<(), String> {
        if self.server.workers == 0 {
            return Err("server.workers must be at least 1".to_string());
        }
        Ok(())
    }

    /// Let `BLOB_BACKEND` and `CATALOG_BACKEND` override the file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("BLOB_BACKEND") {
            match value.parse::<BlobBackend>() {
                Ok(backend) => {
                    info!("Using blob backend from environment: {:?}", backend);
                    self.storage.backend = backend;
                }
                Err(e) => warn!("Invalid blob backend in environment: {}. Keeping {:?}.", e, self.storage.backend),
            }
        }
        if let Ok(value) = env::var("CATALOG_BACKEND") {
            match value.parse::<CatalogBackend>() {
                Ok(backend) => {
                    info!("Using catalog backend from environment: {:?}", backend);
                    self.catalog.backend = backend;
                }
                Err(e) => warn!("Invalid catalog backend in environment: {}. Keeping {:?}.", e, self.catalog.backend),
            }
        }
    }
}
