//! Run status side channel
//!
//! One structured [`RunStatus`] per run, written by the coordinator and the
//! namespace schedulers at wave and namespace boundaries and read through
//! [`StatusHandle::snapshot`] by the progress spinner and the HTTP surface.

use crate::walker::types::{NamespaceCounters, NamespaceOutcome, RunOutcome, RunReport};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Where the run as a whole stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Starting,
    Discovering,
    Scanning,
    Completed,
    NothingToDo,
    Cancelled,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::Completed | RunPhase::NothingToDo | RunPhase::Cancelled | RunPhase::Failed
        )
    }
}

impl From<RunOutcome> for RunPhase {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => RunPhase::Completed,
            RunOutcome::NothingToDo => RunPhase::NothingToDo,
            RunOutcome::Cancelled => RunPhase::Cancelled,
            RunOutcome::Failed => RunPhase::Failed,
        }
    }
}

/// Where one namespace stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespacePhase {
    Pending,
    Scanning,
    Draining,
    Completed,
    Cancelled,
    Failed,
}

impl From<NamespaceOutcome> for NamespacePhase {
    fn from(outcome: NamespaceOutcome) -> Self {
        match outcome {
            NamespaceOutcome::Completed => NamespacePhase::Completed,
            NamespaceOutcome::Cancelled => NamespacePhase::Cancelled,
            NamespaceOutcome::Failed => NamespacePhase::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamespaceProgress {
    pub namespace: String,
    pub phase: NamespacePhase,
    pub waves_completed: u32,
    pub counters: NamespaceCounters,
    /// Directories still in the frontier
    pub queued_directories: usize,
    pub error_count: u64,
}

impl NamespaceProgress {
    fn pending(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            phase: NamespacePhase::Pending,
            waves_completed: 0,
            counters: NamespaceCounters::default(),
            queued_directories: 0,
            error_count: 0,
        }
    }
}

/// Aggregate view of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub execution_id: String,
    pub storage_account: String,
    pub phase: RunPhase,
    pub started_at: DateTime<Utc>,
    pub files_processed: u64,
    pub bytes_processed: u64,
    pub directories_visited: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub error_count: u64,
    pub namespaces: Vec<NamespaceProgress>,
    /// Set once the run ends
    pub report: Option<RunReport>,
}

impl RunStatus {
    fn new(execution_id: &str, storage_account: &str) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            storage_account: storage_account.to_string(),
            phase: RunPhase::Starting,
            started_at: Utc::now(),
            files_processed: 0,
            bytes_processed: 0,
            directories_visited: 0,
            batches_sent: 0,
            batches_failed: 0,
            error_count: 0,
            namespaces: Vec::new(),
            report: None,
        }
    }

    /// Namespaces that reached a terminal phase
    pub fn namespaces_done(&self) -> usize {
        self.namespaces
            .iter()
            .filter(|n| {
                matches!(
                    n.phase,
                    NamespacePhase::Completed | NamespacePhase::Cancelled | NamespacePhase::Failed
                )
            })
            .count()
    }

    fn recompute_totals(&mut self) {
        self.files_processed = 0;
        self.bytes_processed = 0;
        self.directories_visited = 0;
        self.batches_sent = 0;
        self.batches_failed = 0;
        self.error_count = 0;
        for ns in &self.namespaces {
            self.files_processed += ns.counters.files_processed;
            self.bytes_processed += ns.counters.bytes_processed;
            self.directories_visited += ns.counters.directories_visited;
            self.batches_sent += ns.counters.batches_sent;
            self.batches_failed += ns.counters.batches_failed;
            self.error_count += ns.error_count;
        }
    }
}

/// Shared, cloneable handle to a run's status
#[derive(Debug, Clone)]
pub struct StatusHandle {
    inner: Arc<RwLock<RunStatus>>,
}

impl StatusHandle {
    pub fn new(execution_id: &str, storage_account: &str) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RunStatus::new(execution_id, storage_account))),
        }
    }

    /// Copy of the current status
    pub fn snapshot(&self) -> RunStatus {
        self.inner.read().clone()
    }

    pub fn phase(&self) -> RunPhase {
        self.inner.read().phase
    }

    pub(crate) fn reset(&self, execution_id: &str, storage_account: &str) {
        *self.inner.write() = RunStatus::new(execution_id, storage_account);
    }

    pub(crate) fn set_phase(&self, phase: RunPhase) {
        self.inner.write().phase = phase;
    }

    pub(crate) fn set_namespaces(&self, namespaces: &[String]) {
        let mut status = self.inner.write();
        status.namespaces = namespaces
            .iter()
            .map(|ns| NamespaceProgress::pending(ns))
            .collect();
        status.recompute_totals();
    }

    /// Apply `update` to one namespace's entry and refresh the totals
    pub(crate) fn update_namespace(&self, namespace: &str, update: impl FnOnce(&mut NamespaceProgress)) {
        let mut status = self.inner.write();
        if let Some(progress) = status.namespaces.iter_mut().find(|n| n.namespace == namespace) {
            update(progress);
        }
        status.recompute_totals();
    }

    pub(crate) fn finish(&self, report: &RunReport) {
        let mut status = self.inner.write();
        status.phase = report.status.into();
        status.report = Some(report.clone());
    }
}
