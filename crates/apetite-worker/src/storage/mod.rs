//! Storage layer for the apetite cache store.
//!
//! This module provides `SQLite`-based persistent storage for versioned
//! resource caches and the push subscription, including version eviction.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::resource::CachedResource;
use crate::subscription::PushSubscription;

/// Storage engine for cached resources and push state.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Named cache versions holding fetched resources
/// - URL-keyed resource lookup and replacement
/// - Eviction of every cache except the current version
/// - The single push subscription row
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        // Initialize schema
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Caches ===

    /// Create a named cache if it doesn't exist yet.
    ///
    /// Returns `true` if the cache was created, `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn ensure_cache(&self, name: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("INSERT OR IGNORE INTO caches (name) VALUES (?1)", [name])?;
        if affected > 0 {
            debug!("Created cache '{}'", name);
        }
        Ok(affected > 0)
    }

    /// Check whether a cache with the given name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn cache_exists(&self, name: &str) -> Result<bool> {
        let count: i32 = self.conn.query_row(
            "SELECT COUNT(*) FROM caches WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// List all cache names in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn cache_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM caches ORDER BY name")?;

        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(names)
    }

    /// Delete a cache and every resource stored under it.
    ///
    /// Returns `true` if a cache was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_cache(&self, name: &str) -> Result<bool> {
        self.conn
            .execute("DELETE FROM cache_entries WHERE cache_name = ?1", [name])?;
        let affected = self
            .conn
            .execute("DELETE FROM caches WHERE name = ?1", [name])?;
        if affected > 0 {
            debug!("Deleted cache '{}'", name);
        }
        Ok(affected > 0)
    }

    /// Delete every cache except the one named `keep`.
    ///
    /// Returns the names of the evicted caches. After this call the only
    /// cache left in storage is `keep` (if it exists).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_caches_except(&self, keep: &str) -> Result<Vec<String>> {
        let mut evicted = Vec::new();
        for name in self.cache_names()? {
            if name != keep {
                self.delete_cache(&name)?;
                evicted.push(name);
            }
        }
        Ok(evicted)
    }

    // === Resources ===

    /// Store a resource under the given cache, replacing any entry with the
    /// same URL. Creates the cache row if it's missing.
    ///
    /// Returns the row id of the stored entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_resource(&self, cache_name: &str, resource: &CachedResource) -> Result<i64> {
        self.ensure_cache(cache_name)?;

        let fetched_at = resource.fetched_at.to_rfc3339();
        self.conn.execute(
            r"
            INSERT OR REPLACE INTO cache_entries
                (cache_name, url, content_type, body, content_hash, fetched_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                cache_name,
                resource.url,
                resource.content_type,
                resource.body,
                resource.content_hash,
                fetched_at,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Cached {} in '{}' (id {})", resource.url, cache_name, id);
        Ok(id)
    }

    /// Look up a resource by URL in the given cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_resource(&self, cache_name: &str, url: &str) -> Result<Option<CachedResource>> {
        let result = self
            .conn
            .query_row(
                r"
                SELECT id, url, content_type, body, content_hash, fetched_at
                FROM cache_entries WHERE cache_name = ?1 AND url = ?2
                ",
                params![cache_name, url],
                Self::row_to_resource,
            )
            .optional()?;
        Ok(result)
    }

    /// List the URLs stored under a cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn resource_urls(&self, cache_name: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM cache_entries WHERE cache_name = ?1 ORDER BY url")?;

        let urls = stmt
            .query_map([cache_name], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(urls)
    }

    /// Count the resources stored under a cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn resource_count(&self, cache_name: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE cache_name = ?1",
            [cache_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // === Push subscription ===

    /// Get the push subscription, if one has been created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_subscription(&self) -> Result<Option<PushSubscription>> {
        let result = self
            .conn
            .query_row(
                "SELECT endpoint, server_key, created_at FROM push_subscription WHERE id = 1",
                [],
                |row| {
                    let endpoint: String = row.get(0)?;
                    let server_key: String = row.get(1)?;
                    let created_at_str: String = row.get(2)?;
                    Ok((endpoint, server_key, created_at_str))
                },
            )
            .optional()?;

        Ok(result.map(|(endpoint, server_key, created_at_str)| {
            let created_at = DateTime::parse_from_rfc3339(&created_at_str)
                .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));
            PushSubscription {
                endpoint,
                server_key,
                created_at,
            }
        }))
    }

    /// Store the push subscription, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_subscription(&self, subscription: &PushSubscription) -> Result<()> {
        self.conn.execute(
            r"
            INSERT OR REPLACE INTO push_subscription (id, endpoint, server_key, created_at)
            VALUES (1, ?1, ?2, ?3)
            ",
            params![
                subscription.endpoint,
                subscription.server_key,
                subscription.created_at.to_rfc3339(),
            ],
        )?;
        info!("Stored push subscription for {}", subscription.endpoint);
        Ok(())
    }

    // === Stats ===

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let cache_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM caches", [], |row| row.get(0))?;

        let entry_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;

        let has_subscription = self.get_subscription()?.is_some();

        // Get database file size
        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            cache_count,
            entry_count,
            has_subscription,
            db_size_bytes,
        })
    }

    /// Convert a database row to a `CachedResource` struct.
    fn row_to_resource(row: &rusqlite::Row) -> rusqlite::Result<CachedResource> {
        let id: i64 = row.get(0)?;
        let url: String = row.get(1)?;
        let content_type: Option<String> = row.get(2)?;
        let body: Vec<u8> = row.get(3)?;
        let content_hash: String = row.get(4)?;
        let fetched_at_str: String = row.get(5)?;

        let fetched_at = DateTime::parse_from_rfc3339(&fetched_at_str)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        Ok(CachedResource {
            id: Some(id),
            url,
            content_type,
            body,
            content_hash,
            fetched_at,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of named caches.
    pub cache_count: i64,
    /// Total number of cached resources across all caches.
    pub entry_count: i64,
    /// Whether a push subscription has been created.
    pub has_subscription: bool,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn create_test_resource(url: &str, body: &[u8]) -> CachedResource {
        CachedResource::new(
            url.to_string(),
            Some("text/html".to_string()),
            body.to_vec(),
        )
    }

    fn create_test_subscription() -> PushSubscription {
        PushSubscription {
            endpoint: "https://push.example.com/send/abc".to_string(),
            server_key: "AQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyA".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_in_memory() {
        let storage = Storage::open_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_ensure_cache_creates_once() {
        let storage = create_test_storage();

        assert!(storage.ensure_cache("meu-apetite-v1").unwrap());
        assert!(!storage.ensure_cache("meu-apetite-v1").unwrap());
        assert!(storage.cache_exists("meu-apetite-v1").unwrap());
    }

    #[test]
    fn test_cache_exists_false_for_unknown() {
        let storage = create_test_storage();
        assert!(!storage.cache_exists("unknown").unwrap());
    }

    #[test]
    fn test_cache_names_sorted() {
        let storage = create_test_storage();

        storage.ensure_cache("meu-apetite-v2").unwrap();
        storage.ensure_cache("meu-apetite-v1").unwrap();

        let names = storage.cache_names().unwrap();
        assert_eq!(names, vec!["meu-apetite-v1", "meu-apetite-v2"]);
    }

    #[test]
    fn test_delete_cache_removes_entries() {
        let storage = create_test_storage();

        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/", b"<html>"))
            .unwrap();
        assert_eq!(storage.resource_count("meu-apetite-v1").unwrap(), 1);

        assert!(storage.delete_cache("meu-apetite-v1").unwrap());
        assert!(!storage.cache_exists("meu-apetite-v1").unwrap());
        assert_eq!(storage.resource_count("meu-apetite-v1").unwrap(), 0);
    }

    #[test]
    fn test_delete_cache_nonexistent() {
        let storage = create_test_storage();
        assert!(!storage.delete_cache("nothing-here").unwrap());
    }

    #[test]
    fn test_delete_caches_except_keeps_only_current() {
        let storage = create_test_storage();

        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/", b"old"))
            .unwrap();
        storage
            .put_resource("meu-apetite-v2", &create_test_resource("/", b"new"))
            .unwrap();
        storage.ensure_cache("other-app-v1").unwrap();

        let evicted = storage.delete_caches_except("meu-apetite-v2").unwrap();
        assert_eq!(evicted, vec!["meu-apetite-v1", "other-app-v1"]);

        // Only the current cache survives, with its entries intact
        assert_eq!(storage.cache_names().unwrap(), vec!["meu-apetite-v2"]);
        assert_eq!(storage.resource_count("meu-apetite-v2").unwrap(), 1);
        assert!(storage.get_resource("meu-apetite-v1", "/").unwrap().is_none());
    }

    #[test]
    fn test_delete_caches_except_empty_storage() {
        let storage = create_test_storage();
        let evicted = storage.delete_caches_except("meu-apetite-v1").unwrap();
        assert!(evicted.is_empty());
    }

    #[test]
    fn test_put_and_get_resource() {
        let storage = create_test_storage();
        let resource = create_test_resource("https://meuapetite.app/", b"<html>home</html>");

        storage.put_resource("meu-apetite-v1", &resource).unwrap();

        let retrieved = storage
            .get_resource("meu-apetite-v1", "https://meuapetite.app/")
            .unwrap()
            .unwrap();
        assert_eq!(retrieved.url, "https://meuapetite.app/");
        assert_eq!(retrieved.body, b"<html>home</html>");
        assert_eq!(retrieved.content_type, Some("text/html".to_string()));
        assert_eq!(retrieved.content_hash, resource.content_hash);
        assert!(retrieved.id.is_some());
    }

    #[test]
    fn test_put_resource_replaces_same_url() {
        let storage = create_test_storage();

        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/app.js", b"v1"))
            .unwrap();
        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/app.js", b"v2"))
            .unwrap();

        assert_eq!(storage.resource_count("meu-apetite-v1").unwrap(), 1);
        let retrieved = storage
            .get_resource("meu-apetite-v1", "/app.js")
            .unwrap()
            .unwrap();
        assert_eq!(retrieved.body, b"v2");
    }

    #[test]
    fn test_get_resource_miss() {
        let storage = create_test_storage();
        storage.ensure_cache("meu-apetite-v1").unwrap();

        let result = storage.get_resource("meu-apetite-v1", "/missing").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_get_resource_wrong_cache() {
        let storage = create_test_storage();

        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/", b"x"))
            .unwrap();

        assert!(storage.get_resource("meu-apetite-v2", "/").unwrap().is_none());
    }

    #[test]
    fn test_same_url_in_two_caches() {
        let storage = create_test_storage();

        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/", b"old"))
            .unwrap();
        storage
            .put_resource("meu-apetite-v2", &create_test_resource("/", b"new"))
            .unwrap();

        let old = storage.get_resource("meu-apetite-v1", "/").unwrap().unwrap();
        let new = storage.get_resource("meu-apetite-v2", "/").unwrap().unwrap();
        assert_eq!(old.body, b"old");
        assert_eq!(new.body, b"new");
    }

    #[test]
    fn test_resource_urls() {
        let storage = create_test_storage();

        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/b.js", b"b"))
            .unwrap();
        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/a.css", b"a"))
            .unwrap();

        let urls = storage.resource_urls("meu-apetite-v1").unwrap();
        assert_eq!(urls, vec!["/a.css", "/b.js"]);
    }

    #[test]
    fn test_resource_count() {
        let storage = create_test_storage();
        storage.ensure_cache("meu-apetite-v1").unwrap();
        assert_eq!(storage.resource_count("meu-apetite-v1").unwrap(), 0);

        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/", b"x"))
            .unwrap();
        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/a", b"y"))
            .unwrap();

        assert_eq!(storage.resource_count("meu-apetite-v1").unwrap(), 2);
    }

    #[test]
    fn test_binary_body_round_trips() {
        let storage = create_test_storage();
        let body = vec![0u8, 159, 146, 150, 0, 255];
        let resource = CachedResource::new(
            "/audio/notification.mp3".to_string(),
            Some("audio/mpeg".to_string()),
            body.clone(),
        );

        storage.put_resource("meu-apetite-v1", &resource).unwrap();
        let retrieved = storage
            .get_resource("meu-apetite-v1", "/audio/notification.mp3")
            .unwrap()
            .unwrap();
        assert_eq!(retrieved.body, body);
        assert_eq!(retrieved.content_type, Some("audio/mpeg".to_string()));
    }

    #[test]
    fn test_large_body() {
        let storage = create_test_storage();
        let body = vec![7u8; 100_000];
        let resource = CachedResource::new("/static/js/main.js".to_string(), None, body);

        storage.put_resource("meu-apetite-v1", &resource).unwrap();
        let retrieved = storage
            .get_resource("meu-apetite-v1", "/static/js/main.js")
            .unwrap()
            .unwrap();
        assert_eq!(retrieved.body.len(), 100_000);
        assert!(retrieved.content_type.is_none());
    }

    #[test]
    fn test_get_subscription_none() {
        let storage = create_test_storage();
        assert!(storage.get_subscription().unwrap().is_none());
    }

    #[test]
    fn test_put_and_get_subscription() {
        let storage = create_test_storage();
        let subscription = create_test_subscription();

        storage.put_subscription(&subscription).unwrap();

        let retrieved = storage.get_subscription().unwrap().unwrap();
        assert_eq!(retrieved.endpoint, subscription.endpoint);
        assert_eq!(retrieved.server_key, subscription.server_key);
    }

    #[test]
    fn test_put_subscription_replaces() {
        let storage = create_test_storage();

        let mut subscription = create_test_subscription();
        storage.put_subscription(&subscription).unwrap();

        subscription.endpoint = "https://push.example.com/send/def".to_string();
        storage.put_subscription(&subscription).unwrap();

        let retrieved = storage.get_subscription().unwrap().unwrap();
        assert_eq!(retrieved.endpoint, "https://push.example.com/send/def");
        assert!(storage.stats().unwrap().has_subscription);
    }

    #[test]
    fn test_stats_empty() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();

        assert_eq!(stats.cache_count, 0);
        assert_eq!(stats.entry_count, 0);
        assert!(!stats.has_subscription);
    }

    #[test]
    fn test_stats_with_data() {
        let storage = create_test_storage();

        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/", b"x"))
            .unwrap();
        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/a", b"y"))
            .unwrap();
        storage.put_subscription(&create_test_subscription()).unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.cache_count, 1);
        assert_eq!(stats.entry_count, 2);
        assert!(stats.has_subscription);
    }

    #[test]
    fn test_path() {
        let storage = create_test_storage();
        assert_eq!(storage.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_open_file_based() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("apetite_test_{}.db", std::process::id()));

        // Open and create database
        let storage = Storage::open(&db_path).unwrap();
        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/", b"x"))
            .unwrap();
        assert_eq!(storage.resource_count("meu-apetite-v1").unwrap(), 1);

        // Verify path is correct
        assert_eq!(storage.path(), db_path);

        // Clean up
        drop(storage);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = std::env::temp_dir();
        let nested_path = temp_dir.join(format!(
            "apetite_test_{}/nested/db.sqlite",
            std::process::id()
        ));

        // Ensure parent doesn't exist
        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        // Open should create parent directories
        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        // Clean up
        drop(storage);
        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent.parent().unwrap());
        }
    }

    #[test]
    fn test_stats_db_size() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("apetite_size_test_{}.db", std::process::id()));

        let storage = Storage::open(&db_path).unwrap();
        storage
            .put_resource("meu-apetite-v1", &create_test_resource("/", b"x"))
            .unwrap();

        let stats = storage.stats().unwrap();
        // File-based storage should have non-zero size
        assert!(stats.db_size_bytes > 0);

        // Clean up
        drop(storage);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_storage_stats_debug() {
        let stats = StorageStats {
            cache_count: 1,
            entry_count: 5,
            has_subscription: true,
            db_size_bytes: 1024,
        };
        let debug_str = format!("{stats:?}");
        assert!(debug_str.contains("entry_count"));
        assert!(debug_str.contains('5'));
    }

    #[test]
    fn test_storage_stats_clone() {
        let stats = StorageStats {
            cache_count: 0,
            entry_count: 0,
            has_subscription: false,
            db_size_bytes: 512,
        };
        let cloned = stats.clone();
        assert_eq!(stats, cloned);
    }

    #[test]
    fn test_unicode_url() {
        let storage = create_test_storage();
        let resource = create_test_resource("/cardápio", "página".as_bytes());

        storage.put_resource("meu-apetite-v1", &resource).unwrap();
        let retrieved = storage
            .get_resource("meu-apetite-v1", "/cardápio")
            .unwrap()
            .unwrap();
        assert_eq!(retrieved.body, "página".as_bytes());
    }
}
