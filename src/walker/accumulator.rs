//! Batch accumulator
//!
//! Buffers records across waves and cuts them into exact-size batches.
//! It knows nothing about delivery; each batch it yields is handed out once.

use super::types::FileRecord;

/// Pending records awaiting a full batch
#[derive(Debug, Clone)]
pub struct BatchAccumulator {
    batch_size: usize,
    pending: Vec<FileRecord>,
}

impl BatchAccumulator {
    /// `batch_size` must be non-zero (validated with the config)
    pub fn new(batch_size: usize) -> Self {
        Self::with_pending(batch_size, Vec::new())
    }

    /// Resume with checkpointed pending records
    pub fn with_pending(batch_size: usize, pending: Vec<FileRecord>) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pending,
        }
    }

    pub fn push(&mut self, records: impl IntoIterator<Item = FileRecord>) {
        self.pending.extend(records);
    }

    /// Every complete batch currently available, each exactly `batch_size` long
    pub fn drain_full_batches(&mut self) -> Vec<Vec<FileRecord>> {
        let full = self.pending.len() / self.batch_size;
        if full == 0 {
            return Vec::new();
        }

        let rest = self.pending.split_off(full * self.batch_size);
        let ready = std::mem::replace(&mut self.pending, rest);

        let mut batches = Vec::with_capacity(full);
        let mut iter = ready.into_iter();
        for _ in 0..full {
            batches.push(iter.by_ref().take(self.batch_size).collect());
        }
        batches
    }

    /// Whatever remains at traversal end; `None` when nothing is pending
    pub fn flush_remainder(&mut self) -> Option<Vec<FileRecord>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn pending(&self) -> &[FileRecord] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::storage::FileProperties;
    use crate::walker::leaf::{build_record, LeafContext};
    use crate::walker::types::FileHash;

    pub(crate) fn record(name: &str) -> FileRecord {
        let ctx = LeafContext::new(&ScanConfig::new("acct"), true).unwrap();
        let props = FileProperties {
            size: 1,
            created_at: None,
            modified_at: None,
        };
        build_record(&ctx, "share", name.to_string(), name, &props, FileHash::Skipped, None)
    }

    fn records(n: usize) -> Vec<FileRecord> {
        (0..n).map(|i| record(&format!("f{i}"))).collect()
    }

    #[test]
    fn test_exact_batches() {
        let mut acc = BatchAccumulator::new(3);
        acc.push(records(7));

        let batches = acc.drain_full_batches();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 3));
        assert_eq!(batches[0][0].file_name, "f0");
        assert_eq!(batches[1][2].file_name, "f5");
        assert_eq!(acc.len(), 1);

        let rest = acc.flush_remainder().unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].file_name, "f6");
        assert!(acc.flush_remainder().is_none());
    }

    #[test]
    fn test_pending_spans_pushes() {
        let mut acc = BatchAccumulator::new(4);
        acc.push(records(3));
        assert!(acc.drain_full_batches().is_empty());
        acc.push(records(2));
        assert_eq!(acc.drain_full_batches().len(), 1);
        assert_eq!(acc.pending().len(), 1);
    }

    #[test]
    fn test_remainder_omitted_when_exact() {
        let mut acc = BatchAccumulator::new(2);
        acc.push(records(4));
        assert_eq!(acc.drain_full_batches().len(), 2);
        assert!(acc.flush_remainder().is_none());
    }

    #[test]
    fn test_resume_with_pending() {
        let mut acc = BatchAccumulator::with_pending(2, records(1));
        acc.push(records(1));
        assert_eq!(acc.drain_full_batches().len(), 1);
        assert!(acc.is_empty());
    }
}
