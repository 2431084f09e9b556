//! Configuration
//!
//! Layered configuration loading: defaults, TOML or YAML files, then
//! environment variables.

pub mod config;
pub mod loader;

pub use config::{AppConfig, LoggingConfig, NotificationConfig, StorageBackend, StorageConfig};
pub use loader::ConfigLoader;
