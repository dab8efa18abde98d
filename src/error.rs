//! Error types for share-inventory
//!
//! This module defines the error hierarchy that covers:
//! - Storage backend errors (listing, properties, reads)
//! - Checkpoint log errors
//! - Sink delivery errors
//! - Configuration and CLI errors
//!
//! Item-, directory- and namespace-level failures never surface through these
//! types past the walker: they are converted to error strings and counters.
//! What remains here is infrastructure failure and caller mistakes.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for share-inventory
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Checkpoint log errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Sink errors
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Control surface errors
    #[cfg(feature = "server")]
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage backend errors
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Failed to enumerate namespaces for an account
    #[error("Failed to list namespaces for '{account}': {reason}")]
    ListNamespacesFailed { account: String, reason: String },

    /// Directory listing failed
    #[error("Failed to read directory '{path}': {reason}")]
    ReadDirFailed { path: String, reason: String },

    /// Property lookup failed
    #[error("Failed to stat '{path}': {reason}")]
    StatFailed { path: String, reason: String },

    /// Content read failed
    #[error("Failed to read file '{path}': {reason}")]
    ReadFailed { path: String, reason: String },

    /// Permission denied
    #[error("Permission denied: '{path}'")]
    PermissionDenied { path: String },

    /// Path not found
    #[error("Path not found: '{path}'")]
    NotFound { path: String },

    /// Background task died before answering
    #[error("Storage task failed: {0}")]
    TaskFailed(String),
}

impl StorageError {
    /// Check if this error means the path vanished (common on live shares)
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    /// Map an io::Error for `path` onto the closest variant
    pub fn from_io(path: &str, err: &std::io::Error, fallback: fn(String, String) -> Self) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound {
                path: path.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path: path.to_string(),
            },
            _ => fallback(path.to_string(), err.to_string()),
        }
    }
}

/// Checkpoint log errors
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Payload (de)serialization failed
    #[error("Payload encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Failed to create the log database
    #[error("Failed to create checkpoint log at '{path}': {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    /// Log does not replay cleanly
    #[error("Corrupt checkpoint log for '{execution_id}': {reason}")]
    Corrupt { execution_id: String, reason: String },

    /// No manifest recorded for this run
    #[error("No run recorded with execution id '{0}'")]
    UnknownRun(String),

    /// Background task died before answering
    #[error("Checkpoint task failed: {0}")]
    TaskFailed(String),
}

/// Sink delivery errors
#[derive(Error, Debug)]
pub enum SinkError {
    /// Transport-level failure (connection, timeout)
    #[error("Transport error delivering to '{endpoint}': {reason}")]
    Transport { endpoint: String, reason: String },

    /// Record encoding failed
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Output file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sink was misconfigured
    #[error("Invalid sink configuration: {0}")]
    Invalid(String),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing storage target
    #[error("Storage account is required")]
    MissingAccount,

    /// Invalid batch size
    #[error("Invalid batch size {size}: must be between {min} and {max}")]
    InvalidBatchSize { size: usize, min: usize, max: usize },

    /// Invalid namespace concurrency
    #[error("Invalid namespace concurrency {count}: must be between 1 and {max}")]
    InvalidConcurrency { count: usize, max: usize },

    /// Invalid delivery attempt count
    #[error("Invalid delivery attempts {count}: must be between 1 and {max}")]
    InvalidDeliveryAttempts { count: u32, max: u32 },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Share name unusable as a single path component
    #[error("Invalid share name '{name}': {reason}")]
    InvalidNamespace { name: String, reason: &'static str },

    /// Sink selection error
    #[error("Invalid sink: {0}")]
    InvalidSink(String),
}

/// Control surface errors
#[cfg(feature = "server")]
#[derive(Error, Debug)]
pub enum ServerError {
    /// Run not found
    #[error("Scan not found: {0}")]
    ScanNotFound(String),

    /// Invalid request
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "server")]
impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        use axum::Json;

        let (status, message) = match &self {
            ServerError::ScanNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::InvalidParameter { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Config(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for ServerError
#[cfg(feature = "server")]
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Result type alias for InventoryError
pub type Result<T> = std::result::Result<T, InventoryError>;

/// Result type alias for StorageError
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for CheckpointError
pub type CheckpointResult<T> = std::result::Result<T, CheckpointError>;

/// Result type alias for SinkError
pub type SinkResult<T> = std::result::Result<T, SinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::ReadDirFailed {
            path: "docs/2023".into(),
            reason: "connection reset".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to read directory 'docs/2023': connection reset"
        );

        let err = ConfigError::InvalidBatchSize {
            size: 0,
            min: 1,
            max: 10_000,
        };
        assert!(err.to_string().contains("between 1 and 10000"));
    }

    #[test]
    fn test_from_io_maps_kinds() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = StorageError::from_io("a/b", &not_found, |path, reason| {
            StorageError::ReadDirFailed { path, reason }
        });
        assert!(err.is_not_found());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        let err = StorageError::from_io("a/b", &denied, |path, reason| {
            StorageError::ReadDirFailed { path, reason }
        });
        assert!(matches!(err, StorageError::PermissionDenied { .. }));

        let other = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = StorageError::from_io("a/b", &other, |path, reason| {
            StorageError::StatFailed { path, reason }
        });
        assert!(matches!(err, StorageError::StatFailed { .. }));
    }

    #[test]
    fn test_error_conversion() {
        let storage = StorageError::NotFound { path: "x".into() };
        let top: InventoryError = storage.into();
        assert!(matches!(top, InventoryError::Storage(_)));
    }
}
