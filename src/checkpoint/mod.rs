//! Checkpoint log
//!
//! An append-only log, keyed by execution id, that makes a run resumable:
//!
//! - one [`RunManifest`] per run (the config, scan time and resolved namespaces)
//! - one [`WaveCheckpoint`] per namespace per completed wave
//! - one terminal [`NamespaceResult`] per namespace that finished
//!
//! [`replay`] is a pure fold over the entries; it rebuilds exactly the state
//! each scheduler had after its last checkpointed wave.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::ScanConfig;
use crate::error::{CheckpointError, CheckpointResult};
use crate::walker::types::{FileRecord, NamespaceCounters, NamespaceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything needed to resume a run without the original invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub config: ScanConfig,
    /// Namespaces after discovery (or the explicit list)
    pub namespaces: Vec<String>,
}

impl RunManifest {
    pub fn execution_id(&self) -> &str {
        &self.config.execution_id
    }
}

/// Scheduler state after one completed wave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveCheckpoint {
    pub namespace: String,
    pub wave_number: u32,
    /// Directories still queued, in order
    pub frontier: Vec<String>,
    /// Directories already dequeued
    pub visited: Vec<String>,
    pub counters: NamespaceCounters,
    /// Retained error strings
    pub errors: Vec<String>,
    /// Total errors, retained or not
    pub error_count: u64,
    /// Records accumulated but not yet part of a delivered batch
    pub pending: Vec<FileRecord>,
}

/// One log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum CheckpointEntry {
    Manifest(RunManifest),
    Wave(WaveCheckpoint),
    Finished(NamespaceResult),
}

impl CheckpointEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            CheckpointEntry::Manifest(_) => "manifest",
            CheckpointEntry::Wave(_) => "wave",
            CheckpointEntry::Finished(_) => "finished",
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            CheckpointEntry::Manifest(_) => None,
            CheckpointEntry::Wave(w) => Some(&w.namespace),
            CheckpointEntry::Finished(r) => Some(&r.file_share),
        }
    }

    pub fn wave_number(&self) -> Option<u32> {
        match self {
            CheckpointEntry::Wave(w) => Some(w.wave_number),
            _ => None,
        }
    }
}

/// Durable, append-only storage for checkpoint entries
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Append one entry to the run's log
    async fn append(&self, execution_id: &str, entry: &CheckpointEntry) -> CheckpointResult<()>;

    /// All entries of a run, in append order
    async fn load(&self, execution_id: &str) -> CheckpointResult<Vec<CheckpointEntry>>;

    /// Execution ids with at least one entry, oldest first
    async fn list_runs(&self) -> CheckpointResult<Vec<String>>;
}

/// Store shared between namespace schedulers
pub type SharedStore = Arc<dyn CheckpointStore>;

/// Where a namespace stands according to the log
#[derive(Debug, Clone, PartialEq)]
pub enum NamespaceState {
    /// No wave was checkpointed
    NotStarted,
    /// Resume from this checkpoint
    InProgress(WaveCheckpoint),
    /// Terminal result already logged
    Finished(NamespaceResult),
}

/// Run state rebuilt from the log
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayedRun {
    pub manifest: RunManifest,
    pub namespaces: BTreeMap<String, NamespaceState>,
}

impl ReplayedRun {
    /// Every namespace has a terminal entry
    pub fn is_finished(&self) -> bool {
        self.namespaces
            .values()
            .all(|s| matches!(s, NamespaceState::Finished(_)))
    }

    pub fn state(&self, namespace: &str) -> Option<&NamespaceState> {
        self.namespaces.get(namespace)
    }
}

/// Rebuild a run's state from its log entries
///
/// The first entry must be the manifest; every wave number must follow the
/// previous one for its namespace; nothing may follow a terminal entry.
pub fn replay(execution_id: &str, entries: &[CheckpointEntry]) -> CheckpointResult<ReplayedRun> {
    let corrupt = |reason: String| CheckpointError::Corrupt {
        execution_id: execution_id.to_string(),
        reason,
    };

    let mut iter = entries.iter();
    let manifest = match iter.next() {
        None => return Err(CheckpointError::UnknownRun(execution_id.to_string())),
        Some(CheckpointEntry::Manifest(m)) => m.clone(),
        Some(other) => {
            return Err(corrupt(format!(
                "log starts with a '{}' entry instead of the manifest",
                other.kind()
            )))
        }
    };

    let mut namespaces: BTreeMap<String, NamespaceState> = manifest
        .namespaces
        .iter()
        .map(|ns| (ns.clone(), NamespaceState::NotStarted))
        .collect();

    for entry in iter {
        match entry {
            CheckpointEntry::Manifest(_) => return Err(corrupt("duplicate manifest".into())),
            CheckpointEntry::Wave(wave) => {
                let state = open_state(&mut namespaces, &wave.namespace).map_err(corrupt)?;
                let previous = match state {
                    NamespaceState::InProgress(w) => w.wave_number,
                    _ => 0,
                };
                if wave.wave_number != previous + 1 {
                    return Err(corrupt(format!(
                        "namespace '{}' wave {} follows wave {}",
                        wave.namespace, wave.wave_number, previous
                    )));
                }
                *state = NamespaceState::InProgress(wave.clone());
            }
            CheckpointEntry::Finished(result) => {
                let state = open_state(&mut namespaces, &result.file_share).map_err(corrupt)?;
                *state = NamespaceState::Finished(result.clone());
            }
        }
    }

    Ok(ReplayedRun {
        manifest,
        namespaces,
    })
}

/// State of a namespace that may still receive entries
fn open_state<'a>(
    namespaces: &'a mut BTreeMap<String, NamespaceState>,
    namespace: &str,
) -> Result<&'a mut NamespaceState, String> {
    match namespaces.get_mut(namespace) {
        None => Err(format!("entry for unknown namespace '{}'", namespace)),
        Some(NamespaceState::Finished(_)) => {
            Err(format!("entry after terminal result for '{}'", namespace))
        }
        Some(state) => Ok(state),
    }
}

/// Load and replay a run in one step
pub async fn load_run(store: &dyn CheckpointStore, execution_id: &str) -> CheckpointResult<ReplayedRun> {
    let entries = store.load(execution_id).await?;
    replay(execution_id, &entries)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::walker::types::{ErrorLog, NamespaceOutcome};

    pub(crate) fn manifest(namespaces: &[&str]) -> RunManifest {
        RunManifest {
            config: ScanConfig::new("acct").with_execution_id("exec"),
            namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub(crate) fn wave(namespace: &str, n: u32) -> WaveCheckpoint {
        WaveCheckpoint {
            namespace: namespace.into(),
            wave_number: n,
            frontier: vec![format!("dir{n}")],
            visited: vec![String::new()],
            counters: NamespaceCounters {
                files_processed: n as u64,
                ..NamespaceCounters::default()
            },
            errors: Vec::new(),
            error_count: 0,
            pending: Vec::new(),
        }
    }

    fn finished(namespace: &str) -> NamespaceResult {
        NamespaceResult::from_counters(
            namespace,
            NamespaceOutcome::Completed,
            &NamespaceCounters::default(),
            2,
            ErrorLog::new(),
        )
    }

    #[test]
    fn test_replay_latest_wave_wins() {
        let entries = vec![
            CheckpointEntry::Manifest(manifest(&["a", "b", "c"])),
            CheckpointEntry::Wave(wave("a", 1)),
            CheckpointEntry::Wave(wave("b", 1)),
            CheckpointEntry::Wave(wave("a", 2)),
            CheckpointEntry::Finished(finished("b")),
        ];

        let run = replay("exec", &entries).unwrap();
        assert_eq!(run.state("a"), Some(&NamespaceState::InProgress(wave("a", 2))));
        assert!(matches!(run.state("b"), Some(NamespaceState::Finished(_))));
        assert_eq!(run.state("c"), Some(&NamespaceState::NotStarted));
        assert!(!run.is_finished());
    }

    #[test]
    fn test_replay_rejects_gaps() {
        let entries = vec![
            CheckpointEntry::Manifest(manifest(&["a"])),
            CheckpointEntry::Wave(wave("a", 1)),
            CheckpointEntry::Wave(wave("a", 3)),
        ];
        assert!(matches!(
            replay("exec", &entries),
            Err(CheckpointError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_replay_requires_manifest_first() {
        assert!(matches!(
            replay("exec", &[]),
            Err(CheckpointError::UnknownRun(_))
        ));
        assert!(matches!(
            replay("exec", &[CheckpointEntry::Wave(wave("a", 1))]),
            Err(CheckpointError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_replay_rejects_unknown_namespace_and_late_entries() {
        let unknown = vec![
            CheckpointEntry::Manifest(manifest(&["a"])),
            CheckpointEntry::Wave(wave("zzz", 1)),
        ];
        assert!(replay("exec", &unknown).is_err());

        let late = vec![
            CheckpointEntry::Manifest(manifest(&["a"])),
            CheckpointEntry::Finished(finished("a")),
            CheckpointEntry::Wave(wave("a", 1)),
        ];
        assert!(replay("exec", &late).is_err());
    }

    #[test]
    fn test_entry_encoding_is_tagged() {
        let entry = CheckpointEntry::Wave(wave("a", 1));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "wave");
        assert_eq!(json["payload"]["wave_number"], 1);

        let back: CheckpointEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
