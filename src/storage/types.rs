//! Types exchanged with storage backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A share (namespace) reported by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub name: String,
    /// Snapshots are virtual copies and are never scanned
    pub is_snapshot: bool,
}

impl NamespaceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_snapshot: false,
        }
    }

    pub fn snapshot(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_snapshot: true,
        }
    }
}

/// One entry from a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_directory: bool,
    /// Size as reported by the listing (0 for directories)
    pub size: u64,
}

impl DirEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            size,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            size: 0,
        }
    }
}

/// File properties fetched per retained file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProperties {
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}
