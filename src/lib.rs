//! share-inventory - Durable File Share Inventory Scanner
//!
//! Walks every share of a storage account breadth-first and delivers one
//! metadata record per file, in fixed-size batches, to an analytics sink.
//! Every wave of directory scans is checkpointed to an append-only log, so a
//! run interrupted at any point resumes from its last completed wave.
//!
//! # Features
//!
//! - **Bounded fan-out**: namespaces scanned concurrently under a cap, ten
//!   directories per wave within each namespace.
//!
//! - **Deterministic resume**: results are folded in dispatch order and the
//!   scan time is fixed in the run manifest, so replaying the log rebuilds
//!   the exact scheduler state.
//!
//! - **Failure isolation**: file, directory, namespace and delivery failures
//!   become counted error strings instead of aborting the run.
//!
//! - **Swappable collaborators**: storage backends, sinks and checkpoint
//!   stores sit behind traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Storage backend                             │
//! │              (local directory tree, in-memory)                   │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ list / properties / read
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Coordinator                               │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐     ┌───────────┐  │
//! │  │ Scheduler │  │ Scheduler │  │ Scheduler │ ... │ Scheduler │  │
//! │  │  share 1  │  │  share 2  │  │  share 3  │     │  share N  │  │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘     └─────┬─────┘  │
//! │        └──────────────┴──────┬───────┴─────────────────┘        │
//! │                              │                                  │
//! │             ┌────────────────┴────────────────┐                 │
//! │             ▼                                 ▼                 │
//! │   ┌──────────────────┐              ┌──────────────────┐        │
//! │   │   Batch sink     │              │  Checkpoint log  │        │
//! │   │ (http / ndjson)  │              │    (SQLite)      │        │
//! │   └──────────────────┘              └──────────────────┘        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Scan every share under /srv/shares, writing batches as NDJSON
//! share-inventory /srv/shares --output-dir out/
//!
//! # Resume after an interruption
//! share-inventory resume 6f1c2d9e-...
//! ```

pub mod checkpoint;
pub mod config;
pub mod content;
pub mod error;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;
pub mod sink;
pub mod status;
pub mod storage;
pub mod walker;

pub use config::{CliArgs, HashPolicy, ScanConfig};
pub use error::{InventoryError, Result};
pub use status::{RunPhase, RunStatus, StatusHandle};
pub use walker::{Coordinator, FileRecord, NamespaceResult, RunOutcome, RunReport};
