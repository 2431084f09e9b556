//! Store factory
//!
//! Builds the durable store selected by configuration.

use std::sync::Arc;

use crate::config::config::{StorageBackend, StorageConfig};
use crate::error::{GraphError, Result};
use crate::storage::repository::{GraphStore, JsonFileStore, MemoryStore};

/// Store factory
pub struct StoreFactory;

impl StoreFactory {
    /// Create the store described by `config`
    pub fn create(config: &StorageConfig) -> Result<Arc<dyn GraphStore>> {
        match config.backend {
            StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StorageBackend::Json => {
                if config.data_dir.as_os_str().is_empty() {
                    return Err(GraphError::Config(
                        "storage.data_dir is required for the json backend".into(),
                    ));
                }
                Ok(Arc::new(JsonFileStore::new(config.data_dir.clone())))
            }
        }
    }
}
