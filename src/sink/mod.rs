//! Batch delivery
//!
//! A [`BatchSink`] receives each batch exactly once from the scheduler (or a
//! bounded number of times when retry is enabled). Sinks must tolerate
//! repeated delivery of the same batch and fill an absent `TimeGenerated`
//! with the delivery-time clock.

pub mod http;
pub mod memory;
pub mod ndjson;

pub use http::{HttpSink, HttpSinkSettings};
pub use memory::MemorySink;
pub use ndjson::NdjsonSink;

use crate::config::{SinkArgs, SinkKind};
use crate::error::{ConfigError, SinkResult};
use crate::walker::types::{format_timestamp, FileRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Records handed to delivery together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub execution_id: String,
    pub namespace: String,
    /// 1-based emission order within the namespace
    pub sequence: u64,
    pub records: Vec<FileRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// What the sink said about one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub accepted: bool,
    pub count: usize,
    pub message: Option<String>,
}

impl DeliveryReceipt {
    pub fn accepted(count: usize) -> Self {
        Self {
            accepted: true,
            count,
            message: None,
        }
    }

    pub fn rejected(count: usize, message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            count,
            message: Some(message.into()),
        }
    }
}

/// Destination for delivered batches
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Deliver one batch
    ///
    /// `Ok` with `accepted == false` is a final rejection; `Err` is a
    /// transport failure that may be retried.
    async fn deliver(&self, batch: &Batch) -> SinkResult<DeliveryReceipt>;
}

/// Sink shared between namespace schedulers
pub type SharedSink = Arc<dyn BatchSink>;

/// Fill absent `TimeGenerated` values with `now`
pub fn backfill_time_generated(records: &mut [FileRecord], now: DateTime<Utc>) {
    let stamp = format_timestamp(now);
    for record in records.iter_mut().filter(|r| r.time_generated.is_none()) {
        record.time_generated = Some(stamp.clone());
    }
}

/// Bounded exponential backoff for transport failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Delay before attempt `attempt` (0-indexed; the first attempt has none)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);
        let capped = base.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether another attempt may follow `attempts` failed ones
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Deliver `batch`, retrying transport errors per `policy`
///
/// Rejections are returned as they are; only `Err` is retried.
pub async fn deliver_with_retry(
    sink: &dyn BatchSink,
    batch: &Batch,
    policy: &RetryPolicy,
) -> SinkResult<DeliveryReceipt> {
    let mut attempt = 0;
    loop {
        let delay = policy.delay_for_attempt(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match sink.deliver(batch).await {
            Ok(receipt) => return Ok(receipt),
            Err(e) => {
                attempt += 1;
                if !policy.should_retry(attempt) {
                    return Err(e);
                }
                debug!(
                    sink = sink.name(),
                    namespace = %batch.namespace,
                    batch = batch.sequence,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Retrying delivery"
                );
            }
        }
    }
}

/// Build the sink selected on the command line
pub fn build_sink(args: &SinkArgs) -> Result<SharedSink, ConfigError> {
    match args.kind {
        SinkKind::Ndjson => Ok(Arc::new(NdjsonSink::new(&args.output_dir))),
        SinkKind::Http => {
            let endpoint = args
                .endpoint
                .clone()
                .filter(|e| !e.trim().is_empty())
                .ok_or_else(|| ConfigError::InvalidSink("http sink needs --endpoint".into()))?;
            let rule_id = args
                .rule_id
                .clone()
                .filter(|r| !r.trim().is_empty())
                .ok_or_else(|| ConfigError::InvalidSink("http sink needs --rule-id".into()))?;

            let settings = HttpSinkSettings {
                endpoint,
                rule_id,
                stream: args.stream.clone(),
                token: args.token.clone(),
            };
            let sink = HttpSink::new(settings).map_err(|e| ConfigError::InvalidSink(e.to_string()))?;
            Ok(Arc::new(sink))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::accumulator::tests::record;
    use std::path::PathBuf;

    fn batch(sequence: u64) -> Batch {
        Batch {
            execution_id: "exec".into(),
            namespace: "share".into(),
            sequence,
            records: vec![record("a.txt"), record("b.txt")],
        }
    }

    #[test]
    fn test_backfill_keeps_existing_values() {
        let mut records = vec![record("a"), record("b")];
        records[1].time_generated = Some("2020-01-01T00:00:00.000Z".into());
        let now = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        backfill_time_generated(&mut records, now);
        assert_eq!(records[0].time_generated.as_deref(), Some("2024-06-01T12:00:00.000Z"));
        assert_eq!(records[1].time_generated.as_deref(), Some("2020-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy::default()
            .with_max_attempts(4)
            .with_initial_delay(Duration::from_millis(100));

        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));

        let capped = policy.with_max_delay(Duration::from_millis(150));
        assert_eq!(capped.delay_for_attempt(3), Duration::from_millis(150));
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default().with_max_attempts(3);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!RetryPolicy::default().should_retry(1));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transport_errors() {
        let sink = MemorySink::new();
        sink.fail_next_transport(2);
        let policy = RetryPolicy::default()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(1));

        let receipt = deliver_with_retry(&sink, &batch(1), &policy).await.unwrap();
        assert!(receipt.accepted);
        assert_eq!(sink.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_and_never_retries_rejections() {
        let sink = MemorySink::new();
        sink.fail_next_transport(5);
        let policy = RetryPolicy::default()
            .with_max_attempts(2)
            .with_initial_delay(Duration::from_millis(1));
        assert!(deliver_with_retry(&sink, &batch(1), &policy).await.is_err());

        let sink = MemorySink::new();
        sink.reject_batch("share", 1);
        let receipt = deliver_with_retry(&sink, &batch(1), &policy).await.unwrap();
        assert!(!receipt.accepted);
        assert_eq!(sink.attempts(), 1);
    }

    #[test]
    fn test_build_sink_requires_http_settings() {
        let args = SinkArgs {
            kind: SinkKind::Http,
            output_dir: PathBuf::from("out"),
            endpoint: Some("https://dce.example.com".into()),
            rule_id: None,
            stream: "Custom-FileInventory_CL".into(),
            token: None,
        };
        assert!(matches!(build_sink(&args), Err(ConfigError::InvalidSink(_))));

        let ndjson = SinkArgs {
            kind: SinkKind::Ndjson,
            ..args
        };
        assert_eq!(build_sink(&ndjson).unwrap().name(), "ndjson");
    }
}
