//! Configuration management for the apetite runtime.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::vapid;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "apetite";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "cache.db";

/// Cache version that ships with this release. Bumping it makes the next
/// activation evict every cache created under the previous name.
const DEFAULT_CACHE_VERSION: &str = "meu-apetite-v1";

/// Public half of the VAPID key pair used to authorize push subscriptions.
const DEFAULT_VAPID_PUBLIC_KEY: &str =
    "BAswVXqfxOkOM1h9osfsETZbgKXK7xQ5XoOozfIXPGGGq9D1Gj9kia7T-B1CZ4yx1vsgRWqPtNn-I0htkrfcASY";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `APETITE_`)
/// 2. TOML config file at `~/.config/apetite/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Cache configuration.
    pub cache: CacheConfig,
    /// Push notification configuration.
    pub push: PushConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/apetite/cache.db`
    pub database_path: Option<PathBuf>,
}

/// Cache-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the cache version this release serves from.
    pub version: String,
    /// Origin the application is served from. Precache paths are joined to it.
    pub origin: String,
    /// App-shell paths fetched and cached during installation.
    pub precache: Vec<String>,
}

/// Push-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// base64url-encoded VAPID public key handed to new subscriptions.
    pub vapid_public_key: String,
    /// Base URL that minted subscription endpoints are rooted at.
    pub endpoint_base: String,
    /// Path opened when a notification click carries no target URL.
    pub fallback_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_CACHE_VERSION.to_string(),
            origin: "https://meuapetite.app".to_string(),
            precache: default_precache_paths(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            vapid_public_key: DEFAULT_VAPID_PUBLIC_KEY.to_string(),
            endpoint_base: "https://push.meuapetite.app/send".to_string(),
            fallback_url: "/orders".to_string(),
        }
    }
}

/// App-shell assets cached at install time.
fn default_precache_paths() -> Vec<String> {
    vec![
        "/".to_string(),
        "/static/js/main.js".to_string(),
        "/static/css/main.css".to_string(),
        "/images/logo192.png".to_string(),
        "/audio/notification.mp3".to_string(),
    ]
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `APETITE_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("APETITE_").split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate cache config
        if self.cache.version.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "cache version must not be empty".to_string(),
            });
        }

        if !self.cache.origin.starts_with("http://") && !self.cache.origin.starts_with("https://")
        {
            return Err(Error::ConfigValidation {
                message: format!("cache origin must be an http(s) URL: {}", self.cache.origin),
            });
        }

        for path in &self.cache.precache {
            if !path.starts_with('/') {
                return Err(Error::ConfigValidation {
                    message: format!("precache path must start with '/': {path}"),
                });
            }
        }

        // Validate push config
        if let Err(err) = vapid::decode_server_key(&self.push.vapid_public_key) {
            return Err(Error::ConfigValidation {
                message: format!("vapid_public_key does not decode: {err}"),
            });
        }

        if !self.push.endpoint_base.starts_with("http://")
            && !self.push.endpoint_base.starts_with("https://")
        {
            return Err(Error::ConfigValidation {
                message: format!(
                    "push endpoint_base must be an http(s) URL: {}",
                    self.push.endpoint_base
                ),
            });
        }

        if !self.push.fallback_url.starts_with('/') {
            return Err(Error::ConfigValidation {
                message: format!(
                    "push fallback_url must start with '/': {}",
                    self.push.fallback_url
                ),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Absolute URLs of the precache assets, joined onto the origin.
    #[must_use]
    pub fn precache_urls(&self) -> Vec<String> {
        let origin = self.cache.origin.trim_end_matches('/');
        self.cache
            .precache
            .iter()
            .map(|path| format!("{origin}{path}"))
            .collect()
    }
}
