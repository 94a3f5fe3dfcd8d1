//! Error types for the apetite worker runtime.
//!
//! This module defines all error types used throughout the worker crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for worker operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Network Errors ===
    /// A network fetch failed.
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        /// URL of the failed request.
        url: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },

    // === Notification Errors ===
    /// The platform refused to display a notification.
    #[error("failed to show notification '{title}': {message}")]
    NotificationShow {
        /// Title of the notification that could not be shown.
        title: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The platform failed to close a notification.
    #[error("failed to close notification {id}: {message}")]
    NotificationClose {
        /// Identifier of the notification.
        id: Uuid,
        /// Description of what went wrong.
        message: String,
    },

    /// The application server key is not valid base64url.
    #[error("invalid application server key: {message}")]
    ServerKeyDecode {
        /// Description of the decode failure.
        message: String,
    },

    // === Messaging Errors ===
    /// The worker task has terminated and can no longer accept events.
    #[error("worker is not running")]
    WorkerGone,

    // === Lifecycle Errors ===
    /// An event arrived in a lifecycle state that cannot serve it.
    #[error("cannot {operation} while worker is {state}")]
    Lifecycle {
        /// The operation that was attempted.
        operation: &'static str,
        /// The worker state at the time.
        state: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for worker operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a server key decode error.
    #[must_use]
    pub fn server_key(message: impl Into<String>) -> Self {
        Self::ServerKeyDecode {
            message: message.into(),
        }
    }

    /// Create a notification show error.
    #[must_use]
    pub fn notification_show(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotificationShow {
            title: title.into(),
            message: message.into(),
        }
    }

    /// Create a notification close error.
    #[must_use]
    pub fn notification_close(id: Uuid, message: impl Into<String>) -> Self {
        Self::NotificationClose {
            id,
            message: message.into(),
        }
    }

    /// Create a lifecycle error for an operation attempted in the wrong state.
    #[must_use]
    pub fn lifecycle(operation: &'static str, state: impl Into<String>) -> Self {
        Self::Lifecycle {
            operation,
            state: state.into(),
        }
    }

    /// Check if this error indicates the worker task has terminated.
    #[must_use]
    pub fn is_worker_gone(&self) -> bool {
        matches!(self, Self::WorkerGone)
    }

    /// Check if this error came from a lifecycle violation.
    #[must_use]
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(self, Self::Lifecycle { .. })
    }
}
