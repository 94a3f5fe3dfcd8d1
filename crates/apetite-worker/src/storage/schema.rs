//! `SQLite` schema definitions for the apetite cache store.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the caches table.
///
/// One row per named cache version. Only the current version should
/// survive activation.
pub const CREATE_CACHES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS caches (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the cache entries table.
pub const CREATE_CACHE_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS cache_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cache_name TEXT NOT NULL,
    url TEXT NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    content_hash TEXT NOT NULL,
    fetched_at TEXT NOT NULL
)
";

/// SQL statement to create the unique (cache, url) index entries are matched
/// and replaced through.
pub const CREATE_ENTRY_URL_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_cache_url ON cache_entries(cache_name, url)
";

/// SQL statement to create an index on `content_hash` for integrity checks.
pub const CREATE_ENTRY_HASH_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_entries_hash ON cache_entries(content_hash)
";

/// SQL statement to create the push subscription table.
///
/// The `CHECK (id = 1)` keeps this a single-row table: at most one
/// subscription exists per registration.
pub const CREATE_SUBSCRIPTION_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS push_subscription (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    endpoint TEXT NOT NULL,
    server_key TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_CACHES_TABLE,
    CREATE_CACHE_ENTRIES_TABLE,
    CREATE_ENTRY_URL_INDEX,
    CREATE_ENTRY_HASH_INDEX,
    CREATE_SUBSCRIPTION_TABLE,
    CREATE_METADATA_TABLE,
];
