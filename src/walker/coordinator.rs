//! Namespace fan-out coordinator
//!
//! Resolves the namespaces of a run, logs the run manifest, starts one
//! [`NamespaceScheduler`] per namespace under a semaphore sized by
//! `namespace_concurrency`, and folds the per-namespace results into a
//! [`RunReport`]. A failed namespace never aborts its siblings.

use super::leaf::LeafContext;
use super::scheduler::{NamespaceScheduler, SchedulerEnv};
use super::types::{ErrorLog, NamespaceCounters, NamespaceOutcome, NamespaceResult, RunOutcome, RunReport};
use crate::checkpoint::{load_run, CheckpointEntry, NamespaceState, RunManifest, SharedStore};
use crate::config::ScanConfig;
use crate::error::Result;
use crate::sink::{RetryPolicy, SharedSink};
use crate::status::{NamespacePhase, RunPhase, StatusHandle};
use crate::storage::SharedBackend;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Drives whole runs against one backend, sink and checkpoint store
pub struct Coordinator {
    backend: SharedBackend,
    sink: SharedSink,
    store: SharedStore,
    cancel: Arc<AtomicBool>,
    status: StatusHandle,
    retry: RetryPolicy,
}

impl Coordinator {
    pub fn new(backend: SharedBackend, sink: SharedSink, store: SharedStore) -> Self {
        Self {
            backend,
            sink,
            store,
            cancel: Arc::new(AtomicBool::new(false)),
            status: StatusHandle::new("", ""),
            retry: RetryPolicy::default(),
        }
    }

    /// Share a cancel flag with a signal handler or control surface
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Backoff used when `delivery_attempts` allows retries
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Publish status through an existing handle
    pub fn with_status(mut self, status: StatusHandle) -> Self {
        self.status = status;
        self
    }

    /// Cancel flag; setting it stops every namespace at its next wave boundary
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Read-only view of the current run
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Start a new run
    ///
    /// Returns `Err` only for an invalid configuration or an unwritable
    /// manifest; everything below that is reported in the [`RunReport`].
    pub async fn run(&self, config: ScanConfig) -> Result<RunReport> {
        config.validate()?;
        let execution_id = config.execution_id.clone();
        let account = config.storage_account.clone();
        self.status.reset(&execution_id, &account);

        info!(
            execution_id = %execution_id,
            account = %account,
            batch_size = config.batch_size,
            hashing = config.hash.enabled,
            namespace_concurrency = config.namespace_concurrency,
            "Starting inventory run"
        );

        let namespaces = if !config.namespaces.is_empty() {
            config.namespaces.clone()
        } else {
            self.status.set_phase(RunPhase::Discovering);
            match self.backend.list_namespaces().await {
                Ok(found) => {
                    let total = found.len();
                    let live: Vec<String> = found
                        .into_iter()
                        .filter(|ns| !ns.is_snapshot)
                        .map(|ns| ns.name)
                        .collect();
                    info!(discovered = total, scanning = live.len(), "Namespaces discovered");
                    live
                }
                Err(e) => {
                    error!(account = %account, error = %e, "Namespace discovery failed");
                    let mut report = RunReport::empty(
                        RunOutcome::Failed,
                        &execution_id,
                        &account,
                        Some(format!("Namespace discovery failed: {}", e)),
                    );
                    report.total_errors = 1;
                    self.status.finish(&report);
                    return Ok(report);
                }
            }
        };

        let manifest = RunManifest {
            config: config.clone(),
            namespaces: namespaces.clone(),
        };
        self.store
            .append(&execution_id, &CheckpointEntry::Manifest(manifest))
            .await?;

        let plans = namespaces
            .into_iter()
            .map(|ns| (ns, NamespaceState::NotStarted))
            .collect();
        self.fan_out(&config, plans).await
    }

    /// Continue a run from its checkpoint log
    ///
    /// Finished namespaces return their logged result; the others continue
    /// from their last wave checkpoint, or from the root when none exists.
    pub async fn resume(&self, execution_id: &str) -> Result<RunReport> {
        let run = load_run(self.store.as_ref(), execution_id).await?;
        let config = run.manifest.config.clone();
        config.validate()?;
        self.status.reset(execution_id, &config.storage_account);

        let finished = run
            .namespaces
            .values()
            .filter(|s| matches!(s, NamespaceState::Finished(_)))
            .count();
        info!(
            execution_id = %execution_id,
            namespaces = run.manifest.namespaces.len(),
            finished,
            "Resuming inventory run"
        );

        let mut namespaces = run.namespaces;
        let plans = run
            .manifest
            .namespaces
            .iter()
            .map(|ns| {
                let state = namespaces.remove(ns).unwrap_or(NamespaceState::NotStarted);
                (ns.clone(), state)
            })
            .collect();
        self.fan_out(&config, plans).await
    }

    async fn fan_out(&self, config: &ScanConfig, plans: Vec<(String, NamespaceState)>) -> Result<RunReport> {
        let execution_id = config.execution_id.clone();
        let account = config.storage_account.clone();

        if plans.is_empty() {
            info!(execution_id = %execution_id, "No namespaces to scan");
            let report = RunReport::empty(RunOutcome::NothingToDo, &execution_id, &account, None);
            self.status.finish(&report);
            return Ok(report);
        }

        let names: Vec<String> = plans.iter().map(|(ns, _)| ns.clone()).collect();
        self.status.set_namespaces(&names);
        self.status.set_phase(RunPhase::Scanning);

        let env = SchedulerEnv {
            execution_id: execution_id.clone(),
            backend: Arc::clone(&self.backend),
            sink: Arc::clone(&self.sink),
            store: Arc::clone(&self.store),
            ctx: Arc::new(LeafContext::new(config, self.backend.case_sensitive())?),
            retry: self.retry.clone().with_max_attempts(config.delivery_attempts),
            cancel: Arc::clone(&self.cancel),
            status: self.status.clone(),
        };

        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(config.namespace_concurrency));
        let batch_size = config.batch_size;

        let handles: Vec<_> = plans
            .into_iter()
            .map(|(namespace, state)| {
                let env = env.clone();
                let semaphore = Arc::clone(&semaphore);
                let name = namespace.clone();
                let handle = tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    match state {
                        NamespaceState::Finished(result) => {
                            env.status.update_namespace(&namespace, |p| {
                                p.phase = NamespacePhase::from(result.status);
                                p.waves_completed = result.waves_completed;
                                p.counters = NamespaceCounters {
                                    files_processed: result.files_processed,
                                    bytes_processed: result.bytes_processed,
                                    directories_visited: result.directories_processed,
                                    batches_sent: result.batches_sent,
                                    batches_failed: result.batches_failed,
                                    records_lost: result.records_lost,
                                };
                                p.error_count = result.error_count;
                            });
                            result
                        }
                        NamespaceState::InProgress(checkpoint) => {
                            NamespaceScheduler::resume_from(env, checkpoint, batch_size).run().await
                        }
                        NamespaceState::NotStarted => {
                            NamespaceScheduler::start(env, namespace, batch_size).run().await
                        }
                    }
                });
                (name, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (namespace, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "Namespace task died");
                    let mut errors = ErrorLog::new();
                    errors.push(format!("Namespace {} task failed: {}", namespace, e));
                    results.push(NamespaceResult::from_counters(
                        &namespace,
                        NamespaceOutcome::Failed,
                        &NamespaceCounters::default(),
                        0,
                        errors,
                    ));
                }
            }
        }

        let report = RunReport::aggregate(&execution_id, &account, results);
        info!(
            execution_id = %execution_id,
            status = %report.status,
            shares = report.total_shares_scanned,
            files = report.total_files_processed,
            bytes = report.total_bytes_processed,
            batches_sent = report.total_batches_sent,
            batches_failed = report.total_batches_failed,
            errors = report.total_errors,
            duration_secs = start.elapsed().as_secs(),
            "Inventory run finished"
        );
        self.status.finish(&report);
        Ok(report)
    }
}
