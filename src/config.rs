//! Application configuration for the `geofix` binary.
//!
//! Stored at `~/.config/geofix/config.json`. A missing file means defaults;
//! every field is optional.

use crate::location::{
    FileStore, Geolocator, LocationError, Provider, ResolverConfig, StaticProvider,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const APP_NAME: &str = "geofix";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find config directory")]
    NoConfigDir,

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Location(#[from] LocationError),
}

/// User-entered coordinates, registered as the `manual` provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManualEntry {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub resolver: ResolverConfig,
    /// Overrides the default store location (~/.geofix/store.json).
    pub store_path: Option<PathBuf>,
    /// Default provider chain, by registered name.
    pub providers: Vec<String>,
    pub manual: Option<ManualEntry>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(FileStore::default_path)
    }

    /// Build a geolocator: file store, built-in providers registered, default
    /// chain set from `providers` (or every registered provider when empty).
    pub fn build(&self) -> Result<Geolocator, ConfigError> {
        let mut geo = Geolocator::new(Arc::new(FileStore::new(self.store_path())))
            .with_config(self.resolver)?;

        if let Some(m) = self.manual {
            let manual: Arc<dyn Provider> = Arc::new(StaticProvider::manual(m.latitude, m.longitude));
            geo.register_provider("manual", manual);
        }

        if self.providers.is_empty() {
            let all: Vec<String> = geo.registry().names().into_iter().map(str::to_string).collect();
            geo.set_default_provider_names(all.as_slice())?;
        } else {
            geo.set_default_provider_names(self.providers.as_slice())?;
        }
        Ok(geo)
    }
}
