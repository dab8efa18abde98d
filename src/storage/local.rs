//! Local filesystem backend
//!
//! The account is a directory; each immediate subdirectory is a share.
//! Subdirectories whose names start with `.snapshot` are reported as
//! snapshots. Symbolic links are never descended into; a link to a file is
//! reported with its target's properties. All filesystem calls run on the
//! blocking pool.

use super::types::{DirEntry, FileProperties, NamespaceInfo};
use super::StorageBackend;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const SNAPSHOT_PREFIX: &str = ".snapshot";

/// Shares rooted in a local (or mounted) directory
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    account: String,
    case_sensitive: bool,
}

impl LocalBackend {
    /// Backend over `root`; the account name is the root as given
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            account: root.display().to_string(),
            root,
            case_sensitive: cfg!(not(any(windows, target_os = "macos"))),
        }
    }

    /// Override the reported case sensitivity (e.g. for an SMB mount)
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_path(&self, namespace: &str, path: &str) -> PathBuf {
        let mut full = self.root.join(namespace);
        for part in path
            .split('/')
            .filter(|p| !p.is_empty() && *p != "." && *p != "..")
        {
            full.push(part);
        }
        full
    }
}

/// Properties of a regular file; links are followed only to files
fn regular_file_metadata(file: &Path, shown: &str) -> StorageResult<fs::Metadata> {
    let metadata = fs::metadata(file).map_err(|e| {
        StorageError::from_io(shown, &e, |path, reason| StorageError::StatFailed { path, reason })
    })?;

    if metadata.is_file() {
        Ok(metadata)
    } else if metadata.is_dir() {
        Err(StorageError::StatFailed {
            path: shown.to_string(),
            reason: "link to a directory is not followed".into(),
        })
    } else {
        Err(StorageError::StatFailed {
            path: shown.to_string(),
            reason: "not a regular file".into(),
        })
    }
}

/// Run blocking filesystem work off the async workers
async fn blocking<T, F>(f: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::TaskFailed(e.to_string()))?
}

fn to_utc(time: std::io::Result<std::time::SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn account(&self) -> &str {
        &self.account
    }

    fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    async fn list_namespaces(&self) -> StorageResult<Vec<NamespaceInfo>> {
        let root = self.root.clone();
        let account = self.account.clone();

        blocking(move || {
            let list_failed = |e: std::io::Error| StorageError::ListNamespacesFailed {
                account: account.clone(),
                reason: e.to_string(),
            };

            let mut namespaces = Vec::new();
            for entry in fs::read_dir(&root).map_err(list_failed)? {
                let entry = entry.map_err(list_failed)?;
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if !is_dir {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                namespaces.push(NamespaceInfo {
                    is_snapshot: name.starts_with(SNAPSHOT_PREFIX),
                    name,
                });
            }

            namespaces.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(namespaces)
        })
        .await
    }

    async fn list_entries(&self, namespace: &str, path: &str) -> StorageResult<Vec<DirEntry>> {
        let dir = self.dir_path(namespace, path);
        let shown = format!("{}/{}", namespace, path);

        blocking(move || {
            let read_failed = |e: std::io::Error| {
                StorageError::from_io(&shown, &e, |path, reason| StorageError::ReadDirFailed {
                    path,
                    reason,
                })
            };

            let mut entries = Vec::new();
            for entry in fs::read_dir(&dir).map_err(read_failed)? {
                let entry = entry.map_err(read_failed)?;
                let name = entry.file_name().to_string_lossy().into_owned();

                // Only real directories are descended into. Links, special
                // files and entries whose type is unreadable go to the leaf
                // as files, where the property lookup reports them.
                match entry.file_type() {
                    Ok(t) if t.is_dir() => entries.push(DirEntry::directory(name)),
                    Ok(t) if t.is_file() => {
                        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                        entries.push(DirEntry::file(name, size));
                    }
                    Ok(t) if t.is_symlink() => {
                        debug!(path = %shown, name = %name, "Symlink not followed");
                        entries.push(DirEntry::file(name, 0));
                    }
                    _ => entries.push(DirEntry::file(name, 0)),
                }
            }

            entries.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(entries)
        })
        .await
    }

    async fn get_properties(
        &self,
        namespace: &str,
        path: &str,
        name: &str,
    ) -> StorageResult<FileProperties> {
        let file = self.dir_path(namespace, path).join(name);
        let shown = super::join_path(&format!("{}/{}", namespace, path), name);

        blocking(move || {
            let metadata = regular_file_metadata(&file, &shown)?;
            Ok(FileProperties {
                size: metadata.len(),
                created_at: to_utc(metadata.created()),
                modified_at: to_utc(metadata.modified()),
            })
        })
        .await
    }

    async fn read_bytes(&self, namespace: &str, path: &str, name: &str) -> StorageResult<Vec<u8>> {
        let file = self.dir_path(namespace, path).join(name);
        let shown = super::join_path(&format!("{}/{}", namespace, path), name);

        blocking(move || {
            regular_file_metadata(&file, &shown)?;
            fs::read(&file).map_err(|e| {
                StorageError::from_io(&shown, &e, |path, reason| StorageError::ReadFailed {
                    path,
                    reason,
                })
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn share_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("finance/2023")).unwrap();
        fs::create_dir_all(root.join("hr")).unwrap();
        fs::create_dir_all(root.join(".snapshot-hourly")).unwrap();
        fs::write(root.join("stray.txt"), b"not a share").unwrap();
        fs::write(root.join("finance/budget.xlsx"), vec![0u8; 2048]).unwrap();
        fs::write(root.join("finance/2023/q1.pdf"), b"%PDF-1.5").unwrap();
        tmp
    }

    #[tokio::test]
    async fn test_list_namespaces_marks_snapshots() {
        let tmp = share_tree();
        let backend = LocalBackend::new(tmp.path());

        let namespaces = backend.list_namespaces().await.unwrap();
        let names: Vec<_> = namespaces.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec![".snapshot-hourly", "finance", "hr"]);
        assert!(namespaces[0].is_snapshot);
        assert!(!namespaces[1].is_snapshot);
    }

    #[tokio::test]
    async fn test_list_entries_root_and_nested() {
        let tmp = share_tree();
        let backend = LocalBackend::new(tmp.path());

        let root = backend.list_entries("finance", "").await.unwrap();
        assert_eq!(
            root,
            vec![DirEntry::directory("2023"), DirEntry::file("budget.xlsx", 2048)]
        );

        let nested = backend.list_entries("finance", "2023").await.unwrap();
        assert_eq!(nested, vec![DirEntry::file("q1.pdf", 8)]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_not_found() {
        let tmp = share_tree();
        let backend = LocalBackend::new(tmp.path());

        let err = backend.list_entries("finance", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_properties_and_read() {
        let tmp = share_tree();
        let backend = LocalBackend::new(tmp.path());

        let props = backend
            .get_properties("finance", "2023", "q1.pdf")
            .await
            .unwrap();
        assert_eq!(props.size, 8);
        assert!(props.modified_at.is_some());

        let bytes = backend.read_bytes("finance", "2023", "q1.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.5");

        let err = backend
            .get_properties("finance", "2023", "missing.pdf")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_are_not_descended() {
        let tmp = share_tree();
        let root = tmp.path();
        std::os::unix::fs::symlink("..", root.join("finance/2023/up")).unwrap();
        std::os::unix::fs::symlink("q1.pdf", root.join("finance/2023/alias.pdf")).unwrap();
        let backend = LocalBackend::new(root);

        let nested = backend.list_entries("finance", "2023").await.unwrap();
        assert_eq!(
            nested,
            vec![
                DirEntry::file("alias.pdf", 0),
                DirEntry::file("q1.pdf", 8),
                DirEntry::file("up", 0),
            ]
        );

        let alias = backend.get_properties("finance", "2023", "alias.pdf").await.unwrap();
        assert_eq!(alias.size, 8);

        let up = backend.get_properties("finance", "2023", "up").await.unwrap_err();
        assert!(matches!(up, StorageError::StatFailed { .. }));
        assert!(backend.read_bytes("finance", "2023", "up").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_link_is_listed() {
        let tmp = share_tree();
        let root = tmp.path();
        std::os::unix::fs::symlink("/nonexistent/target", root.join("hr/dangling.txt")).unwrap();
        fs::write(root.join("hr/ok.txt"), b"ok").unwrap();
        let backend = LocalBackend::new(root);

        let entries = backend.list_entries("hr", "").await.unwrap();
        assert_eq!(
            entries,
            vec![DirEntry::file("dangling.txt", 0), DirEntry::file("ok.txt", 2)]
        );
        assert!(backend
            .get_properties("hr", "", "dangling.txt")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_dir_path_stays_under_root() {
        let backend = LocalBackend::new("/data/acct");
        assert_eq!(
            backend.dir_path("finance", "../../etc/./x"),
            PathBuf::from("/data/acct/finance/etc/x")
        );
    }
}
