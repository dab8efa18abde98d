//! Storage backends
//!
//! The walker only reaches a share through [`StorageBackend`]. Paths are
//! share-relative, `/`-separated and the share root is the empty string.
//!
//! - [`local::LocalBackend`]: a directory whose subdirectories are shares
//! - [`memory::MemoryBackend`]: in-memory tree with failure injection

pub mod local;
pub mod memory;
pub mod types;

pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use types::{DirEntry, FileProperties, NamespaceInfo};

use crate::error::StorageResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Directory reader and namespace lister for one storage account
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Account name stamped on records
    fn account(&self) -> &str;

    /// Whether names differing only in case are distinct
    fn case_sensitive(&self) -> bool;

    /// Enumerate every namespace, snapshots included
    async fn list_namespaces(&self) -> StorageResult<Vec<NamespaceInfo>>;

    /// List the immediate children of `path`
    async fn list_entries(&self, namespace: &str, path: &str) -> StorageResult<Vec<DirEntry>>;

    /// Fetch size and timestamps of file `name` inside directory `path`
    async fn get_properties(
        &self,
        namespace: &str,
        path: &str,
        name: &str,
    ) -> StorageResult<FileProperties>;

    /// Read the full contents of file `name` inside directory `path`
    async fn read_bytes(&self, namespace: &str, path: &str, name: &str) -> StorageResult<Vec<u8>>;
}

/// Backend shared between spawned leaf tasks
pub type SharedBackend = Arc<dyn StorageBackend>;

/// Child path: `parent/name`, or just `name` under the root
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Human-readable form of a directory path
pub fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "(root)"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "docs"), "docs");
        assert_eq!(join_path("docs", "2023"), "docs/2023");
        assert_eq!(join_path("docs/2023", "q1.pdf"), "docs/2023/q1.pdf");
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(""), "(root)");
        assert_eq!(display_path("docs"), "docs");
    }
}
