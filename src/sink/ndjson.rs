//! Newline-delimited JSON sink
//!
//! Writes `{dir}/{execution_id}/{namespace}/batch-{sequence:06}.ndjson`, one
//! record per line. Redelivering a batch rewrites the same file.

use super::{backfill_time_generated, Batch, BatchSink, DeliveryReceipt};
use crate::error::SinkResult;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct NdjsonSink {
    dir: PathBuf,
}

impl NdjsonSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// File a batch is written to
    pub fn batch_path(&self, batch: &Batch) -> PathBuf {
        self.dir
            .join(&batch.execution_id)
            .join(&batch.namespace)
            .join(format!("batch-{:06}.ndjson", batch.sequence))
    }
}

#[async_trait]
impl BatchSink for NdjsonSink {
    fn name(&self) -> &str {
        "ndjson"
    }

    async fn deliver(&self, batch: &Batch) -> SinkResult<DeliveryReceipt> {
        let mut records = batch.records.clone();
        backfill_time_generated(&mut records, Utc::now());

        let mut body = Vec::with_capacity(records.len() * 512);
        for record in &records {
            serde_json::to_writer(&mut body, record)?;
            body.push(b'\n');
        }

        let path = self.batch_path(batch);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;

        debug!(path = %path.display(), records = records.len(), "Batch written");
        Ok(DeliveryReceipt::accepted(records.len()))
    }
}
