//! In-memory sink that records every delivery
//!
//! Chosen batches can be rejected and transport failures injected.

use super::{backfill_time_generated, Batch, BatchSink, DeliveryReceipt};
use crate::error::{SinkError, SinkResult};
use crate::walker::types::FileRecord;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Default)]
struct Inner {
    delivered: Vec<Batch>,
    rejected: HashSet<(String, u64)>,
    transport_failures: usize,
    attempts: usize,
}

#[derive(Default)]
pub struct MemorySink {
    inner: Mutex<Inner>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject batch `sequence` of `namespace` with `accepted = false`
    pub fn reject_batch(&self, namespace: &str, sequence: u64) {
        self.inner
            .lock()
            .rejected
            .insert((namespace.to_string(), sequence));
    }

    /// Fail the next `count` deliveries with a transport error
    pub fn fail_next_transport(&self, count: usize) {
        self.inner.lock().transport_failures = count;
    }

    /// Accepted batches, in arrival order
    pub fn batches(&self) -> Vec<Batch> {
        self.inner.lock().delivered.clone()
    }

    /// Accepted batches of one namespace
    pub fn batches_for(&self, namespace: &str) -> Vec<Batch> {
        self.inner
            .lock()
            .delivered
            .iter()
            .filter(|b| b.namespace == namespace)
            .cloned()
            .collect()
    }

    /// Every accepted record
    pub fn records(&self) -> Vec<FileRecord> {
        self.inner
            .lock()
            .delivered
            .iter()
            .flat_map(|b| b.records.iter().cloned())
            .collect()
    }

    /// Calls to `deliver`, whatever their outcome
    pub fn attempts(&self) -> usize {
        self.inner.lock().attempts
    }
}

#[async_trait]
impl BatchSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn deliver(&self, batch: &Batch) -> SinkResult<DeliveryReceipt> {
        let mut inner = self.inner.lock();
        inner.attempts += 1;

        if inner.transport_failures > 0 {
            inner.transport_failures -= 1;
            return Err(SinkError::Transport {
                endpoint: "memory".into(),
                reason: "injected failure".into(),
            });
        }

        if inner
            .rejected
            .contains(&(batch.namespace.clone(), batch.sequence))
        {
            return Ok(DeliveryReceipt::rejected(batch.len(), "rejected by sink"));
        }

        let mut accepted = batch.clone();
        backfill_time_generated(&mut accepted.records, Utc::now());
        inner.delivered.push(accepted);
        Ok(DeliveryReceipt::accepted(batch.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::accumulator::tests::record;

    fn batch(namespace: &str, sequence: u64) -> Batch {
        Batch {
            execution_id: "exec".into(),
            namespace: namespace.into(),
            sequence,
            records: vec![record("a.txt")],
        }
    }

    #[tokio::test]
    async fn test_records_and_rejects() {
        let sink = MemorySink::new();
        sink.reject_batch("share", 2);

        assert!(sink.deliver(&batch("share", 1)).await.unwrap().accepted);
        let rejected = sink.deliver(&batch("share", 2)).await.unwrap();
        assert!(!rejected.accepted);
        assert_eq!(rejected.message.as_deref(), Some("rejected by sink"));
        assert!(sink.deliver(&batch("other", 2)).await.unwrap().accepted);

        assert_eq!(sink.batches().len(), 2);
        assert_eq!(sink.batches_for("share").len(), 1);
        assert_eq!(sink.attempts(), 3);
        assert!(sink.records().iter().all(|r| r.time_generated.is_some()));
    }

    #[tokio::test]
    async fn test_transport_failure_injection() {
        let sink = MemorySink::new();
        sink.fail_next_transport(1);
        assert!(sink.deliver(&batch("share", 1)).await.is_err());
        assert!(sink.deliver(&batch("share", 1)).await.is_ok());
    }
}
