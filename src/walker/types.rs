//! Core types for the traversal: per-file records, per-directory results,
//! per-namespace counters and the run report.

use crate::config::MAX_RETAINED_ERRORS;
use crate::content::FileCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Content hash or the reason there is none
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileHash {
    /// Uppercase hex digest
    Digest(String),
    /// Hashing disabled
    Skipped,
    /// Larger than the effective limit
    SkippedTooLarge,
    /// Reading the content failed
    Error,
}

impl FileHash {
    pub fn as_str(&self) -> &str {
        match self {
            FileHash::Digest(d) => d,
            FileHash::Skipped => "SKIPPED",
            FileHash::SkippedTooLarge => "SKIPPED_TOO_LARGE",
            FileHash::Error => "ERROR",
        }
    }
}

impl From<String> for FileHash {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SKIPPED" => FileHash::Skipped,
            "SKIPPED_TOO_LARGE" => FileHash::SkippedTooLarge,
            "ERROR" => FileHash::Error,
            _ => FileHash::Digest(s),
        }
    }
}

impl From<FileHash> for String {
    fn from(hash: FileHash) -> Self {
        match hash {
            FileHash::Digest(d) => d,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inventory row per scanned file, in the sink's column names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileRecord {
    pub storage_account: String,
    pub file_share: String,
    pub file_path: String,
    pub file_name: String,
    pub file_extension: String,
    pub file_size_bytes: u64,
    #[serde(rename = "FileSizeMB")]
    pub file_size_mb: f64,
    #[serde(rename = "FileSizeGB")]
    pub file_size_gb: f64,
    pub last_modified: Option<String>,
    pub created: Option<String>,
    pub age_in_days: u32,
    pub file_hash: FileHash,
    pub is_duplicate: String,
    pub duplicate_count: u32,
    pub duplicate_group_id: String,
    pub file_category: FileCategory,
    pub age_bucket: String,
    pub size_bucket: String,
    pub scan_timestamp: String,
    pub execution_id: String,
    /// Filled by the sink at delivery when absent
    #[serde(default)]
    pub time_generated: Option<String>,
    /// MIME type sniffed from bytes read for hashing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Record timestamp format: UTC, millisecond precision, `Z` suffix
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Size in MB rounded to 2 places
pub fn size_in_mb(bytes: u64) -> f64 {
    round_to(bytes as f64 / BYTES_PER_MB, 2)
}

/// Size in GB rounded to `places`
pub fn size_in_gb(bytes: u64, places: i32) -> f64 {
    round_to(bytes as f64 / BYTES_PER_GB, places)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Retained error strings plus the total count
///
/// At most [`MAX_RETAINED_ERRORS`] strings are kept; the rest are counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLog {
    pub retained: Vec<String>,
    pub total: u64,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.total += 1;
        if self.retained.len() < MAX_RETAINED_ERRORS {
            self.retained.push(message.into());
        }
    }

    /// Fold another log in, keeping the cap
    pub fn absorb(&mut self, other: ErrorLog) {
        let room = MAX_RETAINED_ERRORS.saturating_sub(self.retained.len());
        self.retained.extend(other.retained.into_iter().take(room));
        self.total += other.total;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Outcome of scanning one directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveResult {
    /// Directory that was scanned
    pub directory: String,
    pub records: Vec<FileRecord>,
    pub bytes_processed: u64,
    /// Full paths of immediate subdirectories
    pub subdirectories: Vec<String>,
    pub errors: ErrorLog,
    /// The directory itself could not be listed
    pub failed: bool,
}

impl WaveResult {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Directory-level failure: no records, no subdirectories, one error
    pub fn directory_failed(directory: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(directory);
        result.errors.push(message);
        result.failed = true;
        result
    }

    pub fn files_processed(&self) -> u64 {
        self.records.len() as u64
    }
}

/// Running totals for one namespace traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceCounters {
    pub files_processed: u64,
    pub bytes_processed: u64,
    pub directories_visited: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub records_lost: u64,
}

impl NamespaceCounters {
    /// Batches handed to delivery so far; the next batch gets this plus one
    pub fn batches_emitted(&self) -> u64 {
        self.batches_sent + self.batches_failed
    }
}

/// Terminal state of one namespace traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceOutcome {
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for NamespaceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NamespaceOutcome::Completed => "completed",
            NamespaceOutcome::Cancelled => "cancelled",
            NamespaceOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of one namespace traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceResult {
    pub file_share: String,
    pub status: NamespaceOutcome,
    pub files_processed: u64,
    pub bytes_processed: u64,
    pub gb_processed: f64,
    pub directories_processed: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub records_lost: u64,
    pub waves_completed: u32,
    pub errors: Vec<String>,
    pub error_count: u64,
    pub completed_at: DateTime<Utc>,
}

impl NamespaceResult {
    pub fn from_counters(
        namespace: &str,
        status: NamespaceOutcome,
        counters: &NamespaceCounters,
        waves_completed: u32,
        errors: ErrorLog,
    ) -> Self {
        Self {
            file_share: namespace.to_string(),
            status,
            files_processed: counters.files_processed,
            bytes_processed: counters.bytes_processed,
            gb_processed: size_in_gb(counters.bytes_processed, 2),
            directories_processed: counters.directories_visited,
            batches_sent: counters.batches_sent,
            batches_failed: counters.batches_failed,
            records_lost: counters.records_lost,
            waves_completed,
            errors: errors.retained,
            error_count: errors.total,
            completed_at: Utc::now(),
        }
    }

    /// Same counts and errors, ignoring the completion time
    pub fn same_totals(&self, other: &NamespaceResult) -> bool {
        let mut other = other.clone();
        other.completed_at = self.completed_at;
        *self == other
    }
}

/// Terminal state of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    NothingToDo,
    Cancelled,
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunOutcome::Completed => "completed",
            RunOutcome::NothingToDo => "nothing to do",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Aggregate report returned when a run ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub execution_id: String,
    pub storage_account: String,
    pub total_shares_scanned: usize,
    pub total_files_processed: u64,
    pub total_bytes_processed: u64,
    pub total_gb_processed: f64,
    pub total_batches_sent: u64,
    pub total_batches_failed: u64,
    pub total_records_lost: u64,
    pub total_errors: u64,
    pub share_results: Vec<NamespaceResult>,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    /// Report with zero totals
    pub fn empty(
        status: RunOutcome,
        execution_id: &str,
        storage_account: &str,
        message: Option<String>,
    ) -> Self {
        Self {
            status,
            message,
            execution_id: execution_id.to_string(),
            storage_account: storage_account.to_string(),
            total_shares_scanned: 0,
            total_files_processed: 0,
            total_bytes_processed: 0,
            total_gb_processed: 0.0,
            total_batches_sent: 0,
            total_batches_failed: 0,
            total_records_lost: 0,
            total_errors: 0,
            share_results: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    /// Sum per-namespace results; cancelled if any namespace was cancelled
    pub fn aggregate(
        execution_id: &str,
        storage_account: &str,
        share_results: Vec<NamespaceResult>,
    ) -> Self {
        let status = if share_results
            .iter()
            .any(|r| r.status == NamespaceOutcome::Cancelled)
        {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Completed
        };

        let mut report = Self::empty(status, execution_id, storage_account, None);
        report.total_shares_scanned = share_results.len();
        for result in &share_results {
            report.total_files_processed += result.files_processed;
            report.total_bytes_processed += result.bytes_processed;
            report.total_batches_sent += result.batches_sent;
            report.total_batches_failed += result.batches_failed;
            report.total_records_lost += result.records_lost;
            report.total_errors += result.error_count;
        }
        report.total_gb_processed = size_in_gb(report.total_bytes_processed, 2);
        report.share_results = share_results;
        report
    }

    /// Up to [`MAX_RETAINED_ERRORS`] error strings across all namespaces
    pub fn error_sample(&self) -> Vec<String> {
        let mut sample = ErrorLog::new();
        if let Some(message) = &self.message {
            sample.push(message.clone());
        }
        for result in &self.share_results {
            sample.absorb(ErrorLog {
                retained: result.errors.clone(),
                total: result.error_count,
            });
        }
        sample.retained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_hash_strings() {
        assert_eq!(String::from(FileHash::Skipped), "SKIPPED");
        assert_eq!(String::from(FileHash::SkippedTooLarge), "SKIPPED_TOO_LARGE");
        assert_eq!(FileHash::from("ERROR".to_string()), FileHash::Error);
        assert_eq!(
            FileHash::from("ABC123".to_string()),
            FileHash::Digest("ABC123".into())
        );
    }

    #[test]
    fn test_size_rounding() {
        assert_eq!(size_in_mb(2 * 1024 * 1024), 2.0);
        assert_eq!(size_in_mb(500), 0.0);
        assert_eq!(size_in_mb(1024 * 1024 + 512 * 1024), 1.5);
        assert_eq!(size_in_gb(512 * 1024 * 1024, 4), 0.5);
        assert_eq!(size_in_gb(1, 4), 0.0);
    }

    #[test]
    fn test_timestamp_format() {
        let at = DateTime::parse_from_rfc3339("2024-01-02T03:04:05.678901Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(at), "2024-01-02T03:04:05.678Z");
    }

    #[test]
    fn test_error_log_cap() {
        let mut log = ErrorLog::new();
        for i in 0..150 {
            log.push(format!("error {i}"));
        }
        assert_eq!(log.retained.len(), MAX_RETAINED_ERRORS);
        assert_eq!(log.total, 150);

        let mut other = ErrorLog::new();
        other.push("late");
        log.absorb(other);
        assert_eq!(log.retained.len(), MAX_RETAINED_ERRORS);
        assert_eq!(log.total, 151);
    }

    #[test]
    fn test_directory_failed_shape() {
        let result = WaveResult::directory_failed("b", "Error scanning directory b: boom");
        assert!(result.failed);
        assert!(result.records.is_empty());
        assert!(result.subdirectories.is_empty());
        assert_eq!(result.errors.total, 1);
    }

    #[test]
    fn test_report_aggregation() {
        let counters = NamespaceCounters {
            files_processed: 3,
            bytes_processed: 1024 * 1024 * 1024,
            directories_visited: 2,
            batches_sent: 1,
            batches_failed: 1,
            records_lost: 2,
        };
        let mut errors = ErrorLog::new();
        errors.push("one");
        let a = NamespaceResult::from_counters("a", NamespaceOutcome::Completed, &counters, 2, errors);
        let b = NamespaceResult::from_counters(
            "b",
            NamespaceOutcome::Completed,
            &NamespaceCounters::default(),
            1,
            ErrorLog::new(),
        );

        let report = RunReport::aggregate("exec", "acct", vec![a, b]);
        assert_eq!(report.status, RunOutcome::Completed);
        assert_eq!(report.total_shares_scanned, 2);
        assert_eq!(report.total_files_processed, 3);
        assert_eq!(report.total_gb_processed, 1.0);
        assert_eq!(report.total_batches_failed, 1);
        assert_eq!(report.total_records_lost, 2);
        assert_eq!(report.total_errors, 1);
        assert_eq!(report.error_sample(), vec!["one".to_string()]);
    }

    #[test]
    fn test_record_column_names() {
        let record = FileRecord {
            storage_account: "acct".into(),
            file_share: "share".into(),
            file_path: "a.txt".into(),
            file_name: "a.txt".into(),
            file_extension: ".txt".into(),
            file_size_bytes: 500,
            file_size_mb: 0.0,
            file_size_gb: 0.0,
            last_modified: None,
            created: None,
            age_in_days: 0,
            file_hash: FileHash::Skipped,
            is_duplicate: "Unknown".into(),
            duplicate_count: 0,
            duplicate_group_id: String::new(),
            file_category: FileCategory::Other,
            age_bucket: "0-7 days".into(),
            size_bucket: "< 1 KB".into(),
            scan_timestamp: "2024-01-01 00:00:00".into(),
            execution_id: "exec".into(),
            time_generated: None,
            content_type: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["StorageAccount"], "acct");
        assert_eq!(json["FileSizeMB"], 0.0);
        assert_eq!(json["FileSizeGB"], 0.0);
        assert_eq!(json["FileHash"], "SKIPPED");
        assert_eq!(json["FileCategory"], "Other");
        assert_eq!(json["IsDuplicate"], "Unknown");
        assert!(json["TimeGenerated"].is_null());
        assert!(json.get("ContentType").is_none());
    }
}
