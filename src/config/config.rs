use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Durable store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on exit
    #[default]
    Memory,
    /// One JSON document per graph under `data_dir`
    Json,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend kind
    pub backend: StorageBackend,
    /// Data directory for file backends
    pub data_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter, overridden by RUST_LOG
    pub level: String,
    /// JSON formatted output
    pub structured: bool,
    /// Directory for daily rolling log files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotificationConfig {
    /// Log every dispatched event at debug level
    pub log_events: bool,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Name of the graph to open
    pub graph_name: String,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Notification configuration
    pub notifications: NotificationConfig,
    /// Environment
    pub environment: String,
}

impl AppConfig {
    /// Development defaults
    pub fn development() -> Self {
        Self {
            graph_name: "default".into(),
            storage: StorageConfig {
                backend: StorageBackend::Json,
                data_dir: PathBuf::from("./data/graphs"),
            },
            logging: LoggingConfig {
                level: "debug".into(),
                structured: false,
                log_dir: None,
            },
            notifications: NotificationConfig { log_events: true },
            environment: "development".into(),
        }
    }

    /// Production defaults
    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = "production".into();
        config.logging.level = "info".into();
        config.logging.structured = true;
        config.logging.log_dir = Some(PathBuf::from("./logs"));
        config.notifications.log_events = false;
        config
    }

    /// In-memory configuration for tests and tools
    pub fn in_memory(graph_name: &str) -> Self {
        let mut config = Self::development();
        config.graph_name = graph_name.into();
        config.storage.backend = StorageBackend::Memory;
        config.storage.data_dir = PathBuf::new();
        config.environment = "test".into();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.graph_name, "default");
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_production_overrides() {
        let config = AppConfig::production();
        assert_eq!(config.environment, "production");
        assert!(config.logging.structured);
        assert!(!config.notifications.log_events);
    }

    #[test]
    fn test_backend_serialization() {
        let json = serde_json::to_string(&StorageBackend::Json).unwrap();
        assert_eq!(json, "\"json\"");
        let back: StorageBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(back, StorageBackend::Memory);
    }
}
