//! In-memory checkpoint store
//!
//! Lives as long as the process. Used by tests and by callers that do not
//! need resumability across restarts; appends can be made to fail after a
//! given count.

use super::{CheckpointEntry, CheckpointStore};
use crate::error::{CheckpointError, CheckpointResult};
use async_trait::async_trait;
use parking_lot::Mutex;

#[derive(Default)]
struct Inner {
    entries: Vec<(String, CheckpointEntry)>,
    appends_before_failure: Option<usize>,
}

/// Process-local checkpoint log
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with one run's entries
    pub fn with_entries(execution_id: &str, entries: Vec<CheckpointEntry>) -> Self {
        let store = Self::new();
        store.inner.lock().entries = entries
            .into_iter()
            .map(|e| (execution_id.to_string(), e))
            .collect();
        store
    }

    /// Accept `count` more appends, then fail every later one
    pub fn fail_appends_after(&self, count: usize) {
        self.inner.lock().appends_before_failure = Some(count);
    }

    /// Snapshot of one run's entries
    pub fn entries(&self, execution_id: &str) -> Vec<CheckpointEntry> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|(id, _)| id == execution_id)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn append(&self, execution_id: &str, entry: &CheckpointEntry) -> CheckpointResult<()> {
        let mut inner = self.inner.lock();
        if let Some(remaining) = inner.appends_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(CheckpointError::TaskFailed(format!(
                    "append of '{}' entry rejected",
                    entry.kind()
                )));
            }
            *remaining -= 1;
        }
        inner.entries.push((execution_id.to_string(), entry.clone()));
        Ok(())
    }

    async fn load(&self, execution_id: &str) -> CheckpointResult<Vec<CheckpointEntry>> {
        Ok(self.entries(execution_id))
    }

    async fn list_runs(&self) -> CheckpointResult<Vec<String>> {
        let inner = self.inner.lock();
        let mut runs: Vec<String> = Vec::new();
        for (id, _) in &inner.entries {
            if !runs.contains(id) {
                runs.push(id.clone());
            }
        }
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::tests::{manifest, wave};

    #[tokio::test]
    async fn test_append_load_and_list() {
        let store = MemoryStore::new();
        store
            .append("r1", &CheckpointEntry::Manifest(manifest(&["a"])))
            .await
            .unwrap();
        store
            .append("r2", &CheckpointEntry::Manifest(manifest(&[])))
            .await
            .unwrap();
        store.append("r1", &CheckpointEntry::Wave(wave("a", 1))).await.unwrap();

        assert_eq!(store.load("r1").await.unwrap().len(), 2);
        assert_eq!(store.list_runs().await.unwrap(), vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn test_append_failure_injection() {
        let store = MemoryStore::new();
        store.fail_appends_after(1);

        assert!(store
            .append("r1", &CheckpointEntry::Manifest(manifest(&["a"])))
            .await
            .is_ok());
        assert!(store
            .append("r1", &CheckpointEntry::Wave(wave("a", 1)))
            .await
            .is_err());
        assert_eq!(store.entries("r1").len(), 1);
    }
}
