//! Core resource types for the apetite cache.
//!
//! This module defines the fundamental data structure for a resource held
//! in a named cache version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fetched resource held in a cache.
///
/// Represents one URL-keyed entry with the response body and enough
/// metadata to serve it back without touching the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResource {
    /// Unique identifier for this entry (assigned by storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// URL this resource was fetched from and is matched by.
    pub url: String,

    /// Content type reported by the response, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Raw response body.
    pub body: Vec<u8>,

    /// BLAKE3 hash of the body for integrity checks.
    pub content_hash: String,

    /// When this resource was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl CachedResource {
    /// Create a new resource entry from a fetched body.
    ///
    /// Automatically computes the content hash and sets the fetch time to now.
    #[must_use]
    pub fn new(url: impl Into<String>, content_type: Option<String>, body: Vec<u8>) -> Self {
        let content_hash = Self::compute_hash(&body);
        Self {
            id: None,
            url: url.into(),
            content_type,
            body,
            content_hash,
            fetched_at: Utc::now(),
        }
    }

    /// Compute the BLAKE3 hash of the given body.
    #[must_use]
    pub fn compute_hash(body: &[u8]) -> String {
        blake3::hash(body).to_hex().to_string()
    }

    /// Check if this resource's body matches the given hash.
    #[must_use]
    pub fn matches_hash(&self, hash: &str) -> bool {
        self.content_hash == hash
    }

    /// Get the length of the body in bytes.
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Check if the body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
