use crate::config::config::{AppConfig, StorageBackend};
use crate::storage::repository::validate_graph_name;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml, Yaml},
};
use std::path::{Path, PathBuf};

/// Environment variable prefix; `__` separates nested keys
pub const ENV_PREFIX: &str = "GRAPHKIT_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the default locations.
    ///
    /// Layers, later ones win:
    /// 1. development defaults
    /// 2. ./graphkit.toml
    /// 3. ./graphkit.yaml
    /// 4. GRAPHKIT_* environment variables
    pub fn load() -> Result<AppConfig, figment::Error> {
        Self::figment()
            .merge(Toml::file(default_config_path()))
            .merge(Yaml::file("graphkit.yaml"))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Load configuration from a specific file; YAML if the extension says so
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig, figment::Error> {
        let path = path.as_ref();
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::figment().merge(Yaml::file(path)),
            _ => Self::figment().merge(Toml::file(path)),
        };

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::development()))
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if validate_graph_name(&config.graph_name).is_err() {
            return Err(ConfigValidationError::InvalidGraphName(
                config.graph_name.clone(),
            ));
        }

        if config.storage.backend == StorageBackend::Json
            && config.storage.data_dir.as_os_str().is_empty()
        {
            return Err(ConfigValidationError::MissingDataDir);
        }

        if let Some(dir) = &config.logging.log_dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigValidationError::InvalidPath("logging.log_dir".into()));
            }
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("invalid graph name: '{0}'")]
    InvalidGraphName(String),

    #[error("storage.data_dir is required for the json backend")]
    MissingDataDir,

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl From<ConfigValidationError> for crate::error::GraphError {
    fn from(e: ConfigValidationError) -> Self {
        crate::error::GraphError::Config(e.to_string())
    }
}

/// Default configuration file path
pub fn default_config_path() -> PathBuf {
    PathBuf::from("graphkit.toml")
}

/// Whether the default configuration file exists
pub fn config_exists() -> bool {
    default_config_path().exists()
}
