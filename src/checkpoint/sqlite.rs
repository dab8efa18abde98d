//! SQLite checkpoint store
//!
//! One append-only table; rows are never updated or deleted. Payloads are the
//! JSON encoding of [`CheckpointEntry`], while `kind`, `namespace` and
//! `wave_number` are duplicated into columns for ad-hoc inspection.

use super::{CheckpointEntry, CheckpointStore};
use crate::error::{CheckpointError, CheckpointResult};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

/// SQL to create the log table
/// INTEGER PRIMARY KEY gives the append order used by replay.
const CREATE_LOG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS checkpoint_log (
    id INTEGER PRIMARY KEY,
    execution_id TEXT NOT NULL,
    namespace TEXT,               -- NULL for the run manifest
    kind TEXT NOT NULL,           -- manifest | wave | finished
    wave_number INTEGER,          -- only for wave entries
    payload TEXT NOT NULL,        -- JSON-encoded entry
    recorded_at TEXT NOT NULL     -- RFC 3339
)
"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_log_execution ON checkpoint_log(execution_id, id)",
];

/// Committed entries must survive a process crash
const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
"#;

const INSERT_ENTRY: &str = "INSERT INTO checkpoint_log \
    (execution_id, namespace, kind, wave_number, payload, recorded_at) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const SELECT_ENTRIES: &str =
    "SELECT payload FROM checkpoint_log WHERE execution_id = ?1 ORDER BY id";

const SELECT_RUNS: &str =
    "SELECT execution_id FROM checkpoint_log GROUP BY execution_id ORDER BY MIN(id)";

/// Create the schema on an open connection
pub fn create_schema(conn: &Connection) -> CheckpointResult<()> {
    conn.execute_batch(PRAGMAS)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    conn.execute(CREATE_LOG_TABLE, [])?;
    for sql in CREATE_INDEXES {
        conn.execute(sql, [])?;
    }
    Ok(())
}

/// Checkpoint log in a SQLite database file
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the log at `path`
    pub fn open(path: impl AsRef<Path>) -> CheckpointResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|e| CheckpointError::CreateFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        create_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> CheckpointResult<Self> {
        let conn = Connection::open_in_memory()?;
        create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<T, F>(&self, f: F) -> CheckpointResult<T>
    where
        F: FnOnce(&Connection) -> CheckpointResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(|e| CheckpointError::TaskFailed(e.to_string()))?
    }
}

#[async_trait]
impl CheckpointStore for SqliteStore {
    async fn append(&self, execution_id: &str, entry: &CheckpointEntry) -> CheckpointResult<()> {
        let execution_id = execution_id.to_string();
        let namespace = entry.namespace().map(str::to_string);
        let kind = entry.kind();
        let wave_number = entry.wave_number();
        let payload = serde_json::to_string(entry)?;

        self.with_conn(move |conn| {
            conn.execute(
                INSERT_ENTRY,
                params![
                    execution_id,
                    namespace,
                    kind,
                    wave_number,
                    payload,
                    Utc::now().to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn load(&self, execution_id: &str) -> CheckpointResult<Vec<CheckpointEntry>> {
        let execution_id = execution_id.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(SELECT_ENTRIES)?;
            let payloads = stmt
                .query_map([&execution_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            payloads
                .iter()
                .map(|p| serde_json::from_str(p).map_err(CheckpointError::from))
                .collect()
        })
        .await
    }

    async fn list_runs(&self) -> CheckpointResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(SELECT_RUNS)?;
            let runs = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(runs)
        })
        .await
    }
}
