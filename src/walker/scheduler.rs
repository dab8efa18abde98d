//! Per-namespace wave scheduler
//!
//! Owns one namespace's frontier, accumulator, counters and error log. Each
//! wave dequeues up to [`MAX_PARALLEL_DIRS`] directories, scans them
//! concurrently, folds the results in dispatch order, delivers full batches
//! and appends a [`WaveCheckpoint`] before the next wave starts.
//!
//! Nothing in the fold depends on task completion order or the clock, so
//! replaying the checkpoint after wave N and continuing gives the same state
//! and totals as the uninterrupted traversal.

use super::accumulator::BatchAccumulator;
use super::frontier::Frontier;
use super::leaf::{scan_directory, LeafContext};
use super::types::{ErrorLog, FileRecord, NamespaceCounters, NamespaceOutcome, NamespaceResult, WaveResult};
use crate::checkpoint::{CheckpointEntry, SharedStore, WaveCheckpoint};
use crate::config::MAX_PARALLEL_DIRS;
use crate::sink::{deliver_with_retry, Batch, RetryPolicy, SharedSink};
use crate::status::{NamespacePhase, StatusHandle};
use crate::storage::{display_path, SharedBackend};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Collaborators shared by every scheduler of a run
#[derive(Clone)]
pub struct SchedulerEnv {
    pub execution_id: String,
    pub backend: SharedBackend,
    pub sink: SharedSink,
    pub store: SharedStore,
    pub ctx: Arc<LeafContext>,
    pub retry: RetryPolicy,
    pub cancel: Arc<AtomicBool>,
    pub status: StatusHandle,
}

/// Traversal state of one namespace
pub struct NamespaceScheduler {
    env: SchedulerEnv,
    namespace: String,
    frontier: Frontier,
    accumulator: BatchAccumulator,
    counters: NamespaceCounters,
    errors: ErrorLog,
    waves_completed: u32,
}

impl NamespaceScheduler {
    /// Fresh traversal from the root
    pub fn start(env: SchedulerEnv, namespace: impl Into<String>, batch_size: usize) -> Self {
        Self {
            env,
            namespace: namespace.into(),
            frontier: Frontier::with_root(),
            accumulator: BatchAccumulator::new(batch_size),
            counters: NamespaceCounters::default(),
            errors: ErrorLog::new(),
            waves_completed: 0,
        }
    }

    /// Continue from the state recorded after a completed wave
    pub fn resume_from(env: SchedulerEnv, checkpoint: WaveCheckpoint, batch_size: usize) -> Self {
        Self {
            env,
            namespace: checkpoint.namespace,
            frontier: Frontier::restore(checkpoint.frontier, checkpoint.visited),
            accumulator: BatchAccumulator::with_pending(batch_size, checkpoint.pending),
            counters: checkpoint.counters,
            errors: ErrorLog {
                retained: checkpoint.errors,
                total: checkpoint.error_count,
            },
            waves_completed: checkpoint.wave_number,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// State as it would be checkpointed now
    pub fn checkpoint(&self) -> WaveCheckpoint {
        let (frontier, visited) = self.frontier.snapshot();
        WaveCheckpoint {
            namespace: self.namespace.clone(),
            wave_number: self.waves_completed,
            frontier,
            visited,
            counters: self.counters,
            errors: self.errors.retained.clone(),
            error_count: self.errors.total,
            pending: self.accumulator.pending().to_vec(),
        }
    }

    /// Run waves until the frontier is empty, cancellation or failure
    pub async fn run(mut self) -> NamespaceResult {
        info!(
            namespace = %self.namespace,
            resumed_at_wave = self.waves_completed,
            queued = self.frontier.queued(),
            "Scanning namespace"
        );
        self.publish(NamespacePhase::Scanning);

        while !self.frontier.is_empty() {
            if self.env.cancel.load(Ordering::SeqCst) {
                info!(namespace = %self.namespace, wave = self.waves_completed, "Cancel observed at wave boundary");
                return self.finish(NamespaceOutcome::Cancelled);
            }

            let wave = self.frontier.next_wave(MAX_PARALLEL_DIRS);
            if wave.is_empty() {
                break;
            }
            let wave_number = self.waves_completed + 1;
            debug!(namespace = %self.namespace, wave = wave_number, directories = wave.len(), "Dispatching wave");

            let results = self.dispatch(&wave).await;

            if let Some(root) = results.iter().find(|r| r.failed && r.directory.is_empty()) {
                error!(namespace = %self.namespace, "Root directory cannot be listed");
                self.errors.absorb(root.errors.clone());
                self.counters.directories_visited += 1;
                return self.finish(NamespaceOutcome::Failed);
            }

            for result in results {
                self.fold(result);
            }
            for records in self.accumulator.drain_full_batches() {
                self.deliver(records).await;
            }
            self.waves_completed = wave_number;

            let entry = CheckpointEntry::Wave(self.checkpoint());
            if let Err(e) = self.env.store.append(&self.env.execution_id, &entry).await {
                error!(namespace = %self.namespace, wave = wave_number, error = %e, "Checkpoint write failed");
                self.errors
                    .push(format!("Checkpoint write failed for {}: {}", self.namespace, e));
                return self.finish(NamespaceOutcome::Failed);
            }

            self.publish(NamespacePhase::Scanning);
        }

        self.publish(NamespacePhase::Draining);
        if let Some(records) = self.accumulator.flush_remainder() {
            self.deliver(records).await;
        }

        let result = self.finish(NamespaceOutcome::Completed);
        let entry = CheckpointEntry::Finished(result.clone());
        if let Err(e) = self.env.store.append(&self.env.execution_id, &entry).await {
            error!(namespace = %self.namespace, error = %e, "Terminal checkpoint write failed");
            self.errors
                .push(format!("Checkpoint write failed for {}: {}", self.namespace, e));
            return self.finish(NamespaceOutcome::Failed);
        }
        result
    }

    /// One leaf task per directory; results come back in dispatch order
    async fn dispatch(&self, wave: &[String]) -> Vec<WaveResult> {
        let handles: Vec<_> = wave
            .iter()
            .map(|directory| {
                let backend = Arc::clone(&self.env.backend);
                let ctx = Arc::clone(&self.env.ctx);
                let namespace = self.namespace.clone();
                let directory = directory.clone();
                tokio::spawn(async move {
                    scan_directory(backend.as_ref(), &ctx, &namespace, &directory).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (directory, handle) in wave.iter().zip(handles) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(namespace = %self.namespace, directory = %display_path(directory), error = %e, "Leaf task died");
                    results.push(WaveResult::directory_failed(
                        directory.clone(),
                        format!("Error scanning directory {}: {}", display_path(directory), e),
                    ));
                }
            }
        }
        results
    }

    fn fold(&mut self, result: WaveResult) {
        self.counters.directories_visited += 1;
        self.counters.files_processed += result.files_processed();
        self.counters.bytes_processed += result.bytes_processed;
        for subdirectory in result.subdirectories {
            self.frontier.enqueue(subdirectory);
        }
        self.accumulator.push(result.records);
        self.errors.absorb(result.errors);
    }

    async fn deliver(&mut self, records: Vec<FileRecord>) {
        let sequence = self.counters.batches_emitted() + 1;
        let batch = Batch {
            execution_id: self.env.execution_id.clone(),
            namespace: self.namespace.clone(),
            sequence,
            records,
        };

        let failure = match deliver_with_retry(self.env.sink.as_ref(), &batch, &self.env.retry).await {
            Ok(receipt) if receipt.accepted => None,
            Ok(receipt) => Some(receipt.message.unwrap_or_else(|| "rejected".to_string())),
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => {
                self.counters.batches_sent += 1;
                debug!(namespace = %self.namespace, batch = sequence, records = batch.len(), "Batch delivered");
            }
            Some(reason) => {
                self.counters.batches_failed += 1;
                self.counters.records_lost += batch.len() as u64;
                let message = format!("Batch {} delivery failed: {}", sequence, reason);
                error!(namespace = %self.namespace, batch = sequence, records = batch.len(), "{}", message);
                self.errors.push(message);
            }
        }
    }

    fn publish(&self, phase: NamespacePhase) {
        let waves = self.waves_completed;
        let counters = self.counters;
        let queued = self.frontier.queued();
        let error_count = self.errors.total;
        self.env.status.update_namespace(&self.namespace, |p| {
            p.phase = phase;
            p.waves_completed = waves;
            p.counters = counters;
            p.queued_directories = queued;
            p.error_count = error_count;
        });
    }

    fn finish(&self, outcome: NamespaceOutcome) -> NamespaceResult {
        self.publish(outcome.into());
        let result = NamespaceResult::from_counters(
            &self.namespace,
            outcome,
            &self.counters,
            self.waves_completed,
            self.errors.clone(),
        );
        info!(
            namespace = %self.namespace,
            status = %outcome,
            files = result.files_processed,
            directories = result.directories_processed,
            batches_sent = result.batches_sent,
            batches_failed = result.batches_failed,
            errors = result.error_count,
            waves = result.waves_completed,
            "Namespace finished"
        );
        result
    }
}
