//! In-memory backend
//!
//! Holds a tree per namespace and lets callers inject directory, property
//! and read failures, so traversal behavior can be exercised without a
//! real share.

use super::types::{DirEntry, FileProperties, NamespaceInfo};
use super::{join_path, StorageBackend};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type ListHook = Arc<dyn Fn(&str, &str) + Send + Sync>;

#[derive(Debug, Clone)]
struct MemoryFile {
    size: u64,
    content: Option<Vec<u8>>,
    created_at: Option<DateTime<Utc>>,
    modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct MemoryNamespace {
    is_snapshot: bool,
    dirs: BTreeSet<String>,
    files: BTreeMap<String, MemoryFile>,
}

#[derive(Default)]
struct Failures {
    discovery: bool,
    list: HashSet<(String, String)>,
    properties: HashSet<(String, String)>,
    read: HashSet<(String, String)>,
}

/// In-memory storage account
pub struct MemoryBackend {
    account: String,
    case_sensitive: bool,
    default_modified: DateTime<Utc>,
    namespaces: RwLock<BTreeMap<String, MemoryNamespace>>,
    failures: RwLock<Failures>,
    list_hook: RwLock<Option<ListHook>>,
    list_calls: AtomicUsize,
    properties_calls: AtomicUsize,
    read_calls: AtomicUsize,
}

fn parent_of(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

impl MemoryBackend {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            case_sensitive: true,
            default_modified: DateTime::<Utc>::default(),
            namespaces: RwLock::new(BTreeMap::new()),
            failures: RwLock::new(Failures::default()),
            list_hook: RwLock::new(None),
            list_calls: AtomicUsize::new(0),
            properties_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Modification time given to files added without explicit times
    pub fn with_default_modified(mut self, at: DateTime<Utc>) -> Self {
        self.default_modified = at;
        self
    }

    pub fn add_namespace(&self, name: &str) {
        self.namespaces
            .write()
            .entry(name.to_string())
            .or_default();
    }

    pub fn add_snapshot(&self, name: &str) {
        self.namespaces
            .write()
            .entry(name.to_string())
            .or_default()
            .is_snapshot = true;
    }

    /// Add a directory (and its ancestors)
    pub fn add_dir(&self, namespace: &str, path: &str) {
        let mut namespaces = self.namespaces.write();
        let ns = namespaces.entry(namespace.to_string()).or_default();
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = join_path(&current, part);
            ns.dirs.insert(current.clone());
        }
    }

    /// Add a file with content; its directory is created as needed
    pub fn add_file(&self, namespace: &str, path: &str, content: impl Into<Vec<u8>>) {
        let content = content.into();
        let modified = self.default_modified;
        self.insert_file(
            namespace,
            path,
            MemoryFile {
                size: content.len() as u64,
                content: Some(content),
                created_at: Some(modified),
                modified_at: Some(modified),
            },
        );
    }

    /// Add a file of `size` zero bytes without materializing its content
    pub fn add_sized_file(&self, namespace: &str, path: &str, size: u64) {
        let modified = self.default_modified;
        self.insert_file(
            namespace,
            path,
            MemoryFile {
                size,
                content: None,
                created_at: Some(modified),
                modified_at: Some(modified),
            },
        );
    }

    /// Override the timestamps of an existing file
    pub fn set_times(
        &self,
        namespace: &str,
        path: &str,
        created_at: Option<DateTime<Utc>>,
        modified_at: Option<DateTime<Utc>>,
    ) {
        if let Some(file) = self
            .namespaces
            .write()
            .get_mut(namespace)
            .and_then(|ns| ns.files.get_mut(path))
        {
            file.created_at = created_at;
            file.modified_at = modified_at;
        }
    }

    fn insert_file(&self, namespace: &str, path: &str, file: MemoryFile) {
        let (parent, _) = parent_of(path);
        self.add_dir(namespace, parent);
        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .files
            .insert(path.to_string(), file);
    }

    /// Make namespace discovery fail
    pub fn fail_discovery(&self) {
        self.failures.write().discovery = true;
    }

    /// Make listing directory `path` fail
    pub fn fail_list(&self, namespace: &str, path: &str) {
        self.failures
            .write()
            .list
            .insert((namespace.to_string(), path.to_string()));
    }

    /// Make property lookups of file `path` fail
    pub fn fail_properties(&self, namespace: &str, path: &str) {
        self.failures
            .write()
            .properties
            .insert((namespace.to_string(), path.to_string()));
    }

    /// Make reads of file `path` fail
    pub fn fail_read(&self, namespace: &str, path: &str) {
        self.failures
            .write()
            .read
            .insert((namespace.to_string(), path.to_string()));
    }

    /// Remove every injected failure
    pub fn clear_failures(&self) {
        *self.failures.write() = Failures::default();
    }

    /// Called with `(namespace, path)` before every directory listing
    pub fn set_list_hook(&self, hook: impl Fn(&str, &str) + Send + Sync + 'static) {
        *self.list_hook.write() = Some(Arc::new(hook));
    }

    /// Number of directory listings served so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of property lookups served so far
    pub fn properties_calls(&self) -> usize {
        self.properties_calls.load(Ordering::SeqCst)
    }

    /// Number of content reads served so far
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    fn file(&self, namespace: &str, path: &str) -> StorageResult<MemoryFile> {
        self.namespaces
            .read()
            .get(namespace)
            .and_then(|ns| ns.files.get(path))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                path: format!("{}/{}", namespace, path),
            })
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn account(&self) -> &str {
        &self.account
    }

    fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    async fn list_namespaces(&self) -> StorageResult<Vec<NamespaceInfo>> {
        if self.failures.read().discovery {
            return Err(StorageError::ListNamespacesFailed {
                account: self.account.clone(),
                reason: "injected failure".into(),
            });
        }

        Ok(self
            .namespaces
            .read()
            .iter()
            .map(|(name, ns)| NamespaceInfo {
                name: name.clone(),
                is_snapshot: ns.is_snapshot,
            })
            .collect())
    }

    async fn list_entries(&self, namespace: &str, path: &str) -> StorageResult<Vec<DirEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let hook = self.list_hook.read().clone();
        if let Some(hook) = hook {
            hook(namespace, path);
        }

        let display = format!("{}/{}", namespace, path);
        if self
            .failures
            .read()
            .list
            .contains(&(namespace.to_string(), path.to_string()))
        {
            return Err(StorageError::ReadDirFailed {
                path: display,
                reason: "injected failure".into(),
            });
        }

        let namespaces = self.namespaces.read();
        let ns = namespaces
            .get(namespace)
            .ok_or_else(|| StorageError::NotFound {
                path: display.clone(),
            })?;

        if !path.is_empty() && !ns.dirs.contains(path) {
            return Err(StorageError::NotFound { path: display });
        }

        let dirs = ns
            .dirs
            .iter()
            .filter(|d| parent_of(d).0 == path)
            .map(|d| DirEntry::directory(parent_of(d).1));
        let files = ns
            .files
            .iter()
            .filter(|(f, _)| parent_of(f).0 == path)
            .map(|(f, file)| DirEntry::file(parent_of(f).1, file.size));

        Ok(dirs.chain(files).collect())
    }

    async fn get_properties(
        &self,
        namespace: &str,
        path: &str,
        name: &str,
    ) -> StorageResult<FileProperties> {
        self.properties_calls.fetch_add(1, Ordering::SeqCst);
        let file_path = join_path(path, name);
        if self
            .failures
            .read()
            .properties
            .contains(&(namespace.to_string(), file_path.clone()))
        {
            return Err(StorageError::StatFailed {
                path: format!("{}/{}", namespace, file_path),
                reason: "injected failure".into(),
            });
        }

        let file = self.file(namespace, &file_path)?;
        Ok(FileProperties {
            size: file.size,
            created_at: file.created_at,
            modified_at: file.modified_at,
        })
    }

    async fn read_bytes(&self, namespace: &str, path: &str, name: &str) -> StorageResult<Vec<u8>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let file_path = join_path(path, name);
        if self
            .failures
            .read()
            .read
            .contains(&(namespace.to_string(), file_path.clone()))
        {
            return Err(StorageError::ReadFailed {
                path: format!("{}/{}", namespace, file_path),
                reason: "injected failure".into(),
            });
        }

        let file = self.file(namespace, &file_path)?;
        Ok(file
            .content
            .unwrap_or_else(|| vec![0u8; file.size as usize]))
    }
}
