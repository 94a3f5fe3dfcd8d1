//! Page-local persistent preferences.
//!
//! A small JSON-file-backed string key-value store: values are loaded once
//! when opened and every mutation is written straight back to disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use apetite_worker::Config;
use thiserror::Error;
use tracing::debug;

/// Key set once the user dismisses the install banner.
pub const PREF_INSTALL_BANNER_DISMISSED: &str = "install_banner_dismissed";

/// Key holding the user's preferred language.
pub const PREF_LANGUAGE: &str = "language";

const PREFS_FILE_NAME: &str = "prefs.json";

/// Errors from the preference store.
#[derive(Debug, Error)]
pub enum PrefsError {
    /// The preferences file could not be read.
    #[error("failed to read preferences at {path}: {source}")]
    Read {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The preferences file could not be written.
    #[error("failed to write preferences at {path}: {source}")]
    Write {
        /// File that failed to save.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The preferences file holds something other than a string map.
    #[error("preferences at {path} are not valid JSON: {source}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// Result type for preference operations.
pub type Result<T> = std::result::Result<T, PrefsError>;

/// JSON-file-backed string key-value store.
#[derive(Debug)]
pub struct PrefStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl PrefStore {
    /// Open the store at `path`, loading any existing values.
    ///
    /// A missing file is an empty store; the file is created on the first
    /// write.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| PrefsError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|source| PrefsError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            BTreeMap::new()
        };

        debug!("Opened preferences at {} ({} keys)", path.display(), values.len());
        Ok(Self { path, values })
    }

    /// Open the store at its default location under the app data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn open_default() -> Result<Self> {
        Self::open(Config::default_data_dir().join(PREFS_FILE_NAME))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Set a value and write the store back to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.values.insert(key.into(), value.into());
        self.save()
    }

    /// Remove a key and write the store back to disk.
    ///
    /// Returns `true` if the key was present. An absent key does not touch
    /// the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        if self.values.remove(key).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PrefsError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        let raw = serde_json::to_string_pretty(&self.values).map_err(|source| PrefsError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, raw).map_err(|source| PrefsError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("apetite-prefs-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let path = temp_path("missing");
        let store = PrefStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(store.get(PREF_LANGUAGE).is_none());
        // Nothing is written until the first set
        assert!(!path.exists());
    }

    #[test]
    fn test_set_get_roundtrip() {
        let path = temp_path("roundtrip");
        let mut store = PrefStore::open(&path).unwrap();
        store.set(PREF_LANGUAGE, "pt-BR").unwrap();
        assert_eq!(store.get(PREF_LANGUAGE), Some("pt-BR"));
        assert_eq!(store.len(), 1);

        // Values survive a reopen
        let reopened = PrefStore::open(&path).unwrap();
        assert_eq!(reopened.get(PREF_LANGUAGE), Some("pt-BR"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_set_overwrites() {
        let path = temp_path("overwrite");
        let mut store = PrefStore::open(&path).unwrap();
        store.set(PREF_LANGUAGE, "pt-BR").unwrap();
        store.set(PREF_LANGUAGE, "en-US").unwrap();
        assert_eq!(store.get(PREF_LANGUAGE), Some("en-US"));
        assert_eq!(store.len(), 1);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_remove() {
        let path = temp_path("remove");
        let mut store = PrefStore::open(&path).unwrap();
        store.set(PREF_INSTALL_BANNER_DISMISSED, "true").unwrap();
        assert!(store.contains(PREF_INSTALL_BANNER_DISMISSED));

        assert!(store.remove(PREF_INSTALL_BANNER_DISMISSED).unwrap());
        assert!(!store.contains(PREF_INSTALL_BANNER_DISMISSED));
        assert!(!store.remove(PREF_INSTALL_BANNER_DISMISSED).unwrap());

        // The removal reached the file
        let reopened = PrefStore::open(&path).unwrap();
        assert!(!reopened.contains(PREF_INSTALL_BANNER_DISMISSED));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_open_rejects_invalid_json() {
        let path = temp_path("invalid");
        fs::write(&path, "not json at all").unwrap();

        let result = PrefStore::open(&path);
        assert!(matches!(result, Err(PrefsError::Parse { .. })));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = std::env::temp_dir().join(format!("apetite-prefs-dir-{}", std::process::id()));
        let path = dir.join("nested").join("prefs.json");
        let mut store = PrefStore::open(&path).unwrap();
        store.set(PREF_LANGUAGE, "pt-BR").unwrap();
        assert!(path.exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_error_display_names_path() {
        let path = temp_path("display");
        fs::write(&path, "[1,2,3]").unwrap();

        let error = PrefStore::open(&path).unwrap_err();
        assert!(error.to_string().contains("apetite-prefs-display"));

        let _ = fs::remove_file(&path);
    }
}
