//! Configuration types for share-inventory
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros (with environment fallbacks)
//! - The immutable, serializable `ScanConfig` passed by value into every task
//! - Traversal constants shared by the walker

use crate::error::ConfigError;
use crate::walker::exclude::ExcludeSet;
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directories dispatched concurrently in one wave
pub const MAX_PARALLEL_DIRS: usize = 10;

/// Files larger than this are never hashed, whatever the configured limit
pub const HASH_CEILING_BYTES: u64 = 10 * 1024 * 1024;

/// Error strings retained per task and per namespace (excess is only counted)
pub const MAX_RETAINED_ERRORS: usize = 100;

/// Default delivery batch size
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default configured hash limit in MB
pub const DEFAULT_HASH_MAX_MB: u64 = 100;

/// Default number of namespaces scanned at once
pub const DEFAULT_NAMESPACE_CONCURRENCY: usize = 8;

/// File name globs excluded unless overridden
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &["*.tmp", "~$*", ".DS_Store", "Thumbs.db"];

/// Batch size limits
const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 10_000;

/// Upper bound on concurrently scanned namespaces
const MAX_NAMESPACE_CONCURRENCY: usize = 256;

/// Upper bound on delivery attempts per batch
const MAX_DELIVERY_ATTEMPTS: u32 = 10;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Durable file share inventory scanner
#[derive(Parser, Debug, Clone)]
#[command(
    name = "share-inventory",
    version,
    about = "Durable wave-based file share inventory scanner",
    long_about = "Walks every share of a storage account breadth-first, ten directories per wave,\n\
                  and delivers per-file metadata records in fixed-size batches to an analytics sink.\n\n\
                  Every wave is checkpointed, so an interrupted run can be resumed with 'resume'.",
    after_help = "EXAMPLES:\n    \
        share-inventory /srv/shares --output-dir out/\n    \
        share-inventory /srv/shares --share finance --share hr -b 1000\n    \
        share-inventory /srv/shares --skip-hash false --max-hash-mb 5\n    \
        share-inventory resume 6f1c2d9e-...            # continue an interrupted run\n    \
        share-inventory inspect 6f1c2d9e-...           # show checkpointed progress\n    \
        share-inventory serve --port 8080              # HTTP control surface",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct CliArgs {
    /// Storage account to scan (for the local backend: a directory whose subdirectories are shares)
    #[arg(value_name = "ACCOUNT", env = "STORAGE_ACCOUNT_NAME")]
    pub account: Option<String>,

    /// Subcommand (resume, inspect, serve)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Share to scan (can be repeated; all shares are discovered if omitted)
    #[arg(
        long = "share",
        value_name = "NAME",
        env = "FILE_SHARE_NAMES",
        value_delimiter = ',',
        action = clap::ArgAction::Append
    )]
    pub shares: Vec<String>,

    /// Records per delivered batch
    #[arg(
        short = 'b',
        long,
        default_value_t = DEFAULT_BATCH_SIZE,
        env = "BATCH_SIZE",
        value_name = "NUM"
    )]
    pub batch_size: usize,

    /// Skip content hashing
    #[arg(
        long = "skip-hash",
        default_value = "true",
        env = "SKIP_HASH_COMPUTATION",
        value_name = "BOOL",
        action = clap::ArgAction::Set
    )]
    pub skip_hash: bool,

    /// Largest file (MB) eligible for hashing; never more than 10 MB is read
    #[arg(
        long = "max-hash-mb",
        default_value_t = DEFAULT_HASH_MAX_MB,
        env = "MAX_FILE_SIZE_FOR_HASH_MB",
        value_name = "MB"
    )]
    pub max_hash_mb: u64,

    /// Exclude file names matching a glob (can be repeated; replaces the defaults)
    #[arg(
        long = "exclude",
        value_name = "PATTERN",
        env = "EXCLUDE_PATTERNS",
        value_delimiter = ',',
        default_values = ["*.tmp", "~$*", ".DS_Store", "Thumbs.db"],
        action = clap::ArgAction::Append
    )]
    pub exclude_patterns: Vec<String>,

    /// Shares scanned concurrently
    #[arg(long, default_value_t = DEFAULT_NAMESPACE_CONCURRENCY, value_name = "NUM")]
    pub namespace_concurrency: usize,

    /// Delivery attempts per batch (1 = no retry)
    #[arg(long, default_value = "1", value_name = "NUM")]
    pub delivery_attempts: u32,

    /// Explicit execution id (a fresh UUID is generated otherwise)
    #[arg(long, value_name = "ID")]
    pub execution_id: Option<String>,

    /// Checkpoint log database
    #[arg(long, default_value = "inventory-checkpoints.db", value_name = "FILE")]
    pub checkpoint_db: PathBuf,

    #[command(flatten)]
    pub sink: SinkArgs,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Subcommands
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Resume an interrupted run from its checkpoint log
    Resume {
        /// Execution id of the run to resume
        #[arg(value_name = "EXECUTION_ID")]
        execution_id: String,

        /// Checkpoint log database
        #[arg(long, default_value = "inventory-checkpoints.db", value_name = "FILE")]
        checkpoint_db: PathBuf,

        #[command(flatten)]
        sink: SinkArgs,

        /// Quiet mode - suppress progress output
        #[arg(short = 'q', long)]
        quiet: bool,
    },

    /// Show the checkpointed progress of a run (or list runs)
    Inspect {
        /// Execution id to inspect; lists recorded runs when omitted
        #[arg(value_name = "EXECUTION_ID")]
        execution_id: Option<String>,

        /// Checkpoint log database
        #[arg(long, default_value = "inventory-checkpoints.db", value_name = "FILE")]
        checkpoint_db: PathBuf,
    },

    /// Start the HTTP control surface
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,

        /// Checkpoint log database
        #[arg(long, default_value = "inventory-checkpoints.db", value_name = "FILE")]
        checkpoint_db: PathBuf,

        #[command(flatten)]
        sink: SinkArgs,
    },
}

/// Where delivered batches go
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// One newline-delimited JSON file per batch
    Ndjson,
    /// Logs ingestion endpoint over HTTPS
    Http,
}

/// Sink selection, shared by scan, resume and serve
#[derive(clap::Args, Debug, Clone)]
pub struct SinkArgs {
    /// Sink type
    #[arg(long = "sink", value_enum, default_value = "ndjson")]
    pub kind: SinkKind,

    /// Output directory for the ndjson sink
    #[arg(long, default_value = "inventory-out", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Data collection endpoint for the http sink
    #[arg(long, env = "LOG_ANALYTICS_DCE_ENDPOINT", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Data collection rule immutable id for the http sink
    #[arg(long, env = "LOG_ANALYTICS_DCR_IMMUTABLE_ID", value_name = "ID")]
    pub rule_id: Option<String>,

    /// Stream name for the http sink
    #[arg(
        long,
        env = "LOG_ANALYTICS_STREAM_NAME",
        default_value = "Custom-FileInventory_CL",
        value_name = "NAME"
    )]
    pub stream: String,

    /// Bearer token for the http sink
    #[arg(long, env = "LOG_ANALYTICS_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Content hashing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashPolicy {
    /// Whether file contents are hashed at all
    pub enabled: bool,

    /// Configured size limit in bytes
    pub max_size_bytes: u64,
}

impl HashPolicy {
    /// Hashing disabled
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_size_bytes: DEFAULT_HASH_MAX_MB * BYTES_PER_MB,
        }
    }

    /// Hashing enabled for files up to `max_mb` megabytes
    pub fn up_to_mb(max_mb: u64) -> Self {
        Self {
            enabled: true,
            max_size_bytes: max_mb.saturating_mul(BYTES_PER_MB),
        }
    }

    /// Largest size actually hashed: the configured limit, capped by the ceiling
    pub fn effective_limit(&self) -> u64 {
        self.max_size_bytes.min(HASH_CEILING_BYTES)
    }
}

impl Default for HashPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Immutable run configuration
///
/// Created once per run and persisted in the run manifest, so a resumed run
/// sees exactly the values (including the scan time) the original saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Storage account (for the local backend, the root directory)
    pub storage_account: String,

    /// Namespaces to scan; empty means discover all
    pub namespaces: Vec<String>,

    /// Records per delivered batch
    pub batch_size: usize,

    /// Content hashing policy
    pub hash: HashPolicy,

    /// Exclusion globs matched against file names
    pub exclude_patterns: Vec<String>,

    /// Run-scoped identifier stamped on every record
    pub execution_id: String,

    /// Scan time captured once; all ages are relative to it
    pub scan_started_at: DateTime<Utc>,

    /// Namespaces scanned at once
    pub namespace_concurrency: usize,

    /// Delivery attempts per batch
    pub delivery_attempts: u32,
}

impl ScanConfig {
    /// Configuration with defaults, a fresh execution id and the current time
    pub fn new(storage_account: impl Into<String>) -> Self {
        Self {
            storage_account: storage_account.into(),
            namespaces: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            hash: HashPolicy::disabled(),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            execution_id: uuid::Uuid::new_v4().to_string(),
            scan_started_at: Utc::now(),
            namespace_concurrency: DEFAULT_NAMESPACE_CONCURRENCY,
            delivery_attempts: 1,
        }
    }

    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_hash_policy(mut self, hash: HashPolicy) -> Self {
        self.hash = hash;
        self
    }

    pub fn with_exclude_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = execution_id.into();
        self
    }

    pub fn with_scan_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.scan_started_at = at;
        self
    }

    pub fn with_namespace_concurrency(mut self, count: usize) -> Self {
        self.namespace_concurrency = count;
        self
    }

    pub fn with_delivery_attempts(mut self, attempts: u32) -> Self {
        self.delivery_attempts = attempts;
        self
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let account = args
            .account
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(ConfigError::MissingAccount)?;

        let hash = if args.skip_hash {
            HashPolicy::disabled()
        } else {
            HashPolicy::up_to_mb(args.max_hash_mb)
        };

        let mut config = Self::new(account)
            .with_namespaces(
                args.shares
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty()),
            )
            .with_batch_size(args.batch_size)
            .with_hash_policy(hash)
            .with_exclude_patterns(args.exclude_patterns.iter().cloned())
            .with_namespace_concurrency(args.namespace_concurrency)
            .with_delivery_attempts(args.delivery_attempts);

        if let Some(id) = &args.execution_id {
            config = config.with_execution_id(id.clone());
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every bound; exclude patterns must compile
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_account.trim().is_empty() {
            return Err(ConfigError::MissingAccount);
        }

        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(ConfigError::InvalidBatchSize {
                size: self.batch_size,
                min: MIN_BATCH_SIZE,
                max: MAX_BATCH_SIZE,
            });
        }

        if self.namespace_concurrency == 0 || self.namespace_concurrency > MAX_NAMESPACE_CONCURRENCY
        {
            return Err(ConfigError::InvalidConcurrency {
                count: self.namespace_concurrency,
                max: MAX_NAMESPACE_CONCURRENCY,
            });
        }

        if self.delivery_attempts == 0 || self.delivery_attempts > MAX_DELIVERY_ATTEMPTS {
            return Err(ConfigError::InvalidDeliveryAttempts {
                count: self.delivery_attempts,
                max: MAX_DELIVERY_ATTEMPTS,
            });
        }

        for name in &self.namespaces {
            validate_namespace(name)?;
        }

        ExcludeSet::compile(&self.exclude_patterns, true)?;
        Ok(())
    }

    /// Scan time as stamped on records (`ScanTimestamp`)
    pub fn scan_timestamp(&self) -> String {
        self.scan_started_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// A share name must be one plain path component
fn validate_namespace(name: &str) -> Result<(), ConfigError> {
    let reason = if name.trim().is_empty() {
        "must not be empty"
    } else if name == "." || name == ".." {
        "must not be a relative path component"
    } else if name.contains(['/', '\\']) {
        "must not contain a path separator"
    } else {
        return Ok(());
    };

    Err(ConfigError::InvalidNamespace {
        name: name.to_string(),
        reason,
    })
}
