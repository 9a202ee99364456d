use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{MigrationError, Result};

/// Where the documents go
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_STORE_URI.to_string(),
            database: DEFAULT_DB_NAME.to_string(),
            collection: DEFAULT_COLLECTION_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub input_path: PathBuf,
    pub store: StoreConfig,
    pub wait_timeout_secs: u64,
    pub wait_interval_secs: u64,
    pub log_dir: PathBuf,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_CSV_FILE),
            store: StoreConfig::default(),
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
            wait_interval_secs: DEFAULT_WAIT_INTERVAL_SECS,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input_path: Option<PathBuf>,
    pub store_uri: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub wait_timeout_secs: Option<u64>,
    pub log_dir: Option<PathBuf>,
}

impl MigrationConfig {
    /// Defaults, then the TOML file (explicit path or `PATIENT_LOADER_CONFIG`),
    /// then environment variables.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(ENV_CONFIG_FILE).ok().map(PathBuf::from);
        let mut config = match config_path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MigrationError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay values found through `lookup` (normally the process environment)
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup(ENV_INPUT_CSV_FILE) {
            self.input_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_DB_NAME) {
            self.store.database = v;
        }
        if let Some(v) = lookup(ENV_COLLECTION_NAME) {
            self.store.collection = v;
        }
        if let Some(v) = lookup(ENV_STORE_URI) {
            self.store.uri = v;
        }
        if let Some(v) = lookup(ENV_WAIT_TIMEOUT_SECS) {
            self.wait_timeout_secs = v.trim().parse().map_err(|e| {
                MigrationError::Config(format!("{ENV_WAIT_TIMEOUT_SECS}={v:?}: {e}"))
            })?;
        }
        Ok(())
    }

    /// Apply command-line values, which win over everything else
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(v) = overrides.input_path {
            self.input_path = v;
        }
        if let Some(v) = overrides.store_uri {
            self.store.uri = v;
        }
        if let Some(v) = overrides.database {
            self.store.database = v;
        }
        if let Some(v) = overrides.collection {
            self.store.collection = v;
        }
        if let Some(v) = overrides.wait_timeout_secs {
            self.wait_timeout_secs = v;
        }
        if let Some(v) = overrides.log_dir {
            self.log_dir = v;
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn wait_interval(&self) -> Duration {
        Duration::from_secs(self.wait_interval_secs)
    }
}
