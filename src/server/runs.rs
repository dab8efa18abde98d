//! Registry of runs started through the control surface

use crate::status::{RunPhase, RunStatus, StatusHandle};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct RunEntry {
    status: StatusHandle,
    cancel: Arc<AtomicBool>,
    registered_at: DateTime<Utc>,
    /// Set when the run stopped with an error instead of a report
    error: Option<String>,
}

/// Short listing entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub execution_id: String,
    pub storage_account: String,
    pub phase: RunPhase,
    pub started_at: DateTime<Utc>,
    pub files_processed: u64,
}

/// Full view of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunView {
    #[serde(flatten)]
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cancel_requested: bool,
}

#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<String, RunEntry>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, execution_id: &str, status: StatusHandle, cancel: Arc<AtomicBool>) {
        self.runs.write().insert(
            execution_id.to_string(),
            RunEntry {
                status,
                cancel,
                registered_at: Utc::now(),
                error: None,
            },
        );
    }

    /// Record that a run stopped with an error
    pub fn mark_failed(&self, execution_id: &str, error: String) {
        if let Some(entry) = self.runs.write().get_mut(execution_id) {
            entry.status.set_phase(RunPhase::Failed);
            entry.error = Some(error);
        }
    }

    pub fn get(&self, execution_id: &str) -> Option<RunView> {
        self.runs.read().get(execution_id).map(|entry| RunView {
            status: entry.status.snapshot(),
            error: entry.error.clone(),
            cancel_requested: entry.cancel.load(Ordering::SeqCst),
        })
    }

    /// Every known run, oldest first
    pub fn list(&self) -> Vec<RunSummary> {
        let runs = self.runs.read();
        let mut entries: Vec<(&String, &RunEntry)> = runs.iter().collect();
        entries.sort_by_key(|(_, e)| e.registered_at);
        entries
            .into_iter()
            .map(|(id, entry)| {
                let status = entry.status.snapshot();
                RunSummary {
                    execution_id: id.clone(),
                    storage_account: status.storage_account,
                    phase: status.phase,
                    started_at: status.started_at,
                    files_processed: status.files_processed,
                }
            })
            .collect()
    }

    /// Ask a run to stop at its next wave boundary; false if unknown
    pub fn cancel(&self, execution_id: &str) -> bool {
        match self.runs.read().get(execution_id) {
            Some(entry) => {
                entry.cancel.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_cancel_and_fail() {
        let registry = RunRegistry::new();
        let cancel = Arc::new(AtomicBool::new(false));
        registry.register("r1", StatusHandle::new("r1", "acct"), Arc::clone(&cancel));

        assert!(registry.cancel("r1"));
        assert!(cancel.load(Ordering::SeqCst));
        assert!(!registry.cancel("missing"));

        registry.mark_failed("r1", "boom".into());
        let view = registry.get("r1").unwrap();
        assert_eq!(view.status.phase, RunPhase::Failed);
        assert_eq!(view.error.as_deref(), Some("boom"));
        assert!(view.cancel_requested);

        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].storage_account, "acct");
    }
}
