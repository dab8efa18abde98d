//! Leaf-scan task: one directory in, one [`WaveResult`] out
//!
//! Individual file failures never abort the directory; they become error
//! strings next to the (possibly degraded) record. Only a failed listing
//! marks the whole directory as failed.

use super::exclude::ExcludeSet;
use super::types::{format_timestamp, size_in_gb, size_in_mb, FileHash, FileRecord, WaveResult};
use crate::config::{HashPolicy, ScanConfig};
use crate::content::{age_bucket, content_digest, size_bucket, sniff_content_type, split_extension, FileCategory};
use crate::error::ConfigError;
use crate::storage::{display_path, join_path, DirEntry, FileProperties, StorageBackend};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// The slice of [`ScanConfig`] a leaf needs, with excludes precompiled
#[derive(Debug, Clone)]
pub struct LeafContext {
    pub storage_account: String,
    pub execution_id: String,
    pub hash: HashPolicy,
    pub excludes: ExcludeSet,
    pub scan_started_at: DateTime<Utc>,
    scan_timestamp: String,
}

impl LeafContext {
    /// Compile excludes with the backend's case semantics
    pub fn new(config: &ScanConfig, case_sensitive: bool) -> Result<Self, ConfigError> {
        Ok(Self {
            storage_account: config.storage_account.clone(),
            execution_id: config.execution_id.clone(),
            hash: config.hash,
            excludes: ExcludeSet::compile(&config.exclude_patterns, case_sensitive)?,
            scan_started_at: config.scan_started_at,
            scan_timestamp: config.scan_timestamp(),
        })
    }

    /// Whole days from `modified` to the scan time, floored, never negative
    pub fn age_in_days(&self, modified: Option<DateTime<Utc>>) -> u32 {
        modified
            .map(|m| (self.scan_started_at - m).num_days().max(0))
            .map(|days| u32::try_from(days).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }
}

/// Scan one directory of `namespace`
pub async fn scan_directory(
    backend: &dyn StorageBackend,
    ctx: &LeafContext,
    namespace: &str,
    directory: &str,
) -> WaveResult {
    let shown = display_path(directory);

    let entries = match backend.list_entries(namespace, directory).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.is_not_found() {
                debug!(namespace = %namespace, directory = %shown, error = %e, "Directory vanished");
            } else {
                warn!(namespace = %namespace, directory = %shown, error = %e, "Directory listing failed");
            }
            return WaveResult::directory_failed(
                directory,
                format!("Error scanning directory {}: {}", shown, e),
            );
        }
    };

    let mut result = WaveResult::new(directory);

    for entry in entries {
        if entry.is_directory {
            result.subdirectories.push(join_path(directory, &entry.name));
            continue;
        }

        if ctx.excludes.is_excluded(&entry.name) {
            continue;
        }

        let record = scan_file(backend, ctx, namespace, directory, &entry, &mut result).await;
        result.bytes_processed += record.file_size_bytes;
        result.records.push(record);
    }

    debug!(
        namespace = %namespace,
        directory = %shown,
        files = result.records.len(),
        subdirs = result.subdirectories.len(),
        "Directory scanned"
    );

    result
}

/// Build the record for one retained file, logging item errors into `result`
async fn scan_file(
    backend: &dyn StorageBackend,
    ctx: &LeafContext,
    namespace: &str,
    directory: &str,
    entry: &DirEntry,
    result: &mut WaveResult,
) -> FileRecord {
    let file_path = join_path(directory, &entry.name);

    let props = match backend.get_properties(namespace, directory, &entry.name).await {
        Ok(props) => props,
        Err(e) => {
            warn!(namespace = %namespace, path = %file_path, error = %e, "Property lookup failed");
            result
                .errors
                .push(format!("Error processing file {}: {}", file_path, e));
            FileProperties {
                size: entry.size,
                created_at: None,
                modified_at: None,
            }
        }
    };

    let (file_hash, content_type) = if !ctx.hash.enabled {
        (FileHash::Skipped, None)
    } else if props.size <= ctx.hash.effective_limit() {
        match backend.read_bytes(namespace, directory, &entry.name).await {
            Ok(bytes) => (
                FileHash::Digest(content_digest(&bytes)),
                sniff_content_type(&bytes),
            ),
            Err(e) => {
                warn!(namespace = %namespace, path = %file_path, error = %e, "Hash read failed");
                result
                    .errors
                    .push(format!("Hash error for {}: {}", file_path, e));
                (FileHash::Error, None)
            }
        }
    } else {
        (FileHash::SkippedTooLarge, None)
    };

    build_record(ctx, namespace, file_path, &entry.name, &props, file_hash, content_type)
}

/// Derive every record column from the fetched properties
pub fn build_record(
    ctx: &LeafContext,
    namespace: &str,
    file_path: String,
    file_name: &str,
    props: &FileProperties,
    file_hash: FileHash,
    content_type: Option<String>,
) -> FileRecord {
    let extension = split_extension(file_name);
    let age_in_days = ctx.age_in_days(props.modified_at);

    FileRecord {
        storage_account: ctx.storage_account.clone(),
        file_share: namespace.to_string(),
        file_path,
        file_name: file_name.to_string(),
        file_extension: extension.to_string(),
        file_size_bytes: props.size,
        file_size_mb: size_in_mb(props.size),
        file_size_gb: size_in_gb(props.size, 4),
        last_modified: props.modified_at.map(format_timestamp),
        created: props.created_at.map(format_timestamp),
        age_in_days,
        file_hash,
        is_duplicate: "Unknown".to_string(),
        duplicate_count: 0,
        duplicate_group_id: String::new(),
        file_category: FileCategory::from_extension(extension),
        age_bucket: age_bucket(age_in_days).to_string(),
        size_bucket: size_bucket(props.size).to_string(),
        scan_timestamp: ctx.scan_timestamp.clone(),
        execution_id: ctx.execution_id.clone(),
        time_generated: None,
        content_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use chrono::Duration;

    fn scan_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn context(config: ScanConfig) -> LeafContext {
        LeafContext::new(&config.with_scan_started_at(scan_time()), true).unwrap()
    }

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new("acct").with_default_modified(scan_time() - Duration::days(10));
        backend.add_file("share", "a.txt", vec![b'a'; 500]);
        backend.add_file("share", "b.tmp", vec![b'b'; 10]);
        backend.add_file("share", "sub/c.pdf", vec![b'c'; 2 * 1024 * 1024]);
        backend
    }

    #[tokio::test]
    async fn test_root_scan_records_and_subdirs() {
        let backend = backend();
        let ctx = context(ScanConfig::new("acct").with_execution_id("exec-1"));

        let result = scan_directory(&backend, &ctx, "share", "").await;

        assert!(!result.failed);
        assert_eq!(result.subdirectories, vec!["sub".to_string()]);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.bytes_processed, 500);
        assert!(result.errors.is_empty());

        let a = &result.records[0];
        assert_eq!(a.file_path, "a.txt");
        assert_eq!(a.file_extension, ".txt");
        assert_eq!(a.file_category, FileCategory::Other);
        assert_eq!(a.size_bucket, "< 1 KB");
        assert_eq!(a.age_in_days, 10);
        assert_eq!(a.age_bucket, "8-30 days");
        assert_eq!(a.file_hash, FileHash::Skipped);
        assert_eq!(a.scan_timestamp, "2024-06-01 12:00:00");
        assert_eq!(a.execution_id, "exec-1");
        assert_eq!(a.last_modified.as_deref(), Some("2024-05-22T12:00:00.000Z"));
        assert!(a.time_generated.is_none());
    }

    #[tokio::test]
    async fn test_excluded_names_cost_no_io() {
        let backend = backend();
        backend.add_file("share", "~$draft.docx", vec![0u8; 64]);
        let ctx = context(ScanConfig::new("acct").with_hash_policy(HashPolicy::up_to_mb(10)));

        let result = scan_directory(&backend, &ctx, "share", "").await;

        let names: Vec<_> = result.records.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.txt"]);
        assert_eq!(backend.properties_calls(), 1);
        assert_eq!(backend.read_calls(), 1);
    }

    #[tokio::test]
    async fn test_nested_path_and_category() {
        let backend = backend();
        let ctx = context(ScanConfig::new("acct"));

        let result = scan_directory(&backend, &ctx, "share", "sub").await;
        let c = &result.records[0];
        assert_eq!(c.file_path, "sub/c.pdf");
        assert_eq!(c.file_category, FileCategory::Documents);
        assert_eq!(c.size_bucket, "1 MB - 10 MB");
        assert_eq!(c.file_size_mb, 2.0);
    }

    #[tokio::test]
    async fn test_hash_policy() {
        let backend = backend();
        backend.add_sized_file("share", "huge.iso", 11 * 1024 * 1024);
        backend.add_file("share", "img.png", vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        let ctx = context(ScanConfig::new("acct").with_hash_policy(HashPolicy::up_to_mb(100)));

        let result = scan_directory(&backend, &ctx, "share", "").await;
        let by_name = |name: &str| {
            result
                .records
                .iter()
                .find(|r| r.file_name == name)
                .unwrap()
                .clone()
        };

        assert_eq!(
            by_name("a.txt").file_hash,
            FileHash::Digest(content_digest(&[b'a'; 500]))
        );
        assert_eq!(by_name("huge.iso").file_hash, FileHash::SkippedTooLarge);
        assert_eq!(by_name("img.png").content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_configured_limit_below_ceiling() {
        let backend = backend();
        let ctx = context(ScanConfig::new("acct").with_hash_policy(HashPolicy::up_to_mb(1)));

        let result = scan_directory(&backend, &ctx, "share", "sub").await;
        assert_eq!(result.records[0].file_hash, FileHash::SkippedTooLarge);
    }

    #[tokio::test]
    async fn test_item_failures_keep_records() {
        let backend = backend();
        backend.fail_properties("share", "a.txt");
        backend.fail_read("share", "sub/c.pdf");
        let ctx = context(ScanConfig::new("acct").with_hash_policy(HashPolicy::up_to_mb(10)));

        let root = scan_directory(&backend, &ctx, "share", "").await;
        let a = &root.records[0];
        assert_eq!(a.file_size_bytes, 500);
        assert!(a.last_modified.is_none());
        assert!(a.created.is_none());
        assert_eq!(a.age_in_days, 0);
        assert_eq!(root.errors.total, 1);
        assert!(root.errors.retained[0].starts_with("Error processing file a.txt"));

        let sub = scan_directory(&backend, &ctx, "share", "sub").await;
        assert_eq!(sub.records[0].file_hash, FileHash::Error);
        assert_eq!(sub.errors.total, 1);
        assert!(!sub.failed);
    }

    #[tokio::test]
    async fn test_directory_failure() {
        let backend = backend();
        backend.fail_list("share", "sub");
        let ctx = context(ScanConfig::new("acct"));

        let result = scan_directory(&backend, &ctx, "share", "sub").await;
        assert!(result.failed);
        assert!(result.records.is_empty());
        assert!(result.subdirectories.is_empty());
        assert_eq!(result.errors.retained.len(), 1);
    }

    #[test]
    fn test_age_is_floored_and_clamped() {
        let ctx = context(ScanConfig::new("acct"));
        assert_eq!(ctx.age_in_days(None), 0);
        assert_eq!(ctx.age_in_days(Some(scan_time() - Duration::hours(47))), 1);
        assert_eq!(ctx.age_in_days(Some(scan_time() + Duration::days(3))), 0);
    }
}
