//! Durable per-document progress tracking.
//!
//! One SQLite file per document type holds a `document_progress` table (the
//! per-document state machine) and an `ingestion_runs` table (one row per
//! pipeline invocation). [`ProgressStore::claim`] is a single compare-and-swap
//! upsert, so concurrent workers racing on the same document id resolve to
//! exactly one owner, and a record stuck in `processing` past the stale
//! threshold can be reclaimed after a crash.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::ProgressError;

/// Timestamp format stored in `updated_at`; lexicographic order equals
/// chronological order.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Status of a document in the progress store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Discovered, not yet claimed.
    Pending,
    /// Claimed by a worker.
    Processing,
    /// Terminal success.
    Completed,
    /// Terminal failure (may be reclaimed while retry budget remains).
    Failed,
}

impl DocumentStatus {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressStats {
    /// Documents awaiting a claim.
    pub pending: u64,
    /// Documents currently claimed.
    pub processing: u64,
    /// Documents completed.
    pub completed: u64,
    /// Documents failed terminally.
    pub failed: u64,
}

/// SQLite-backed progress store.
pub struct ProgressStore {
    conn: Mutex<Connection>,
    stale_after: Duration,
    retry_budget: u32,
}

impl ProgressStore {
    /// Opens (creating if needed) the progress database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Database`] on open or schema failures.
    pub fn open(
        path: &Path,
        stale_after: Duration,
        retry_budget: u32,
    ) -> Result<Self, ProgressError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            // Creating the directory is best-effort; open reports the real error.
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn, stale_after, retry_budget)
    }

    /// Opens an in-memory store (tests).
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Database`] on schema failures.
    pub fn in_memory(stale_after: Duration, retry_budget: u32) -> Result<Self, ProgressError> {
        Self::from_connection(Connection::open_in_memory()?, stale_after, retry_budget)
    }

    fn from_connection(
        conn: Connection,
        stale_after: Duration,
        retry_budget: u32,
    ) -> Result<Self, ProgressError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 5_000)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS document_progress (
                document_id TEXT PRIMARY KEY,
                status      TEXT NOT NULL,
                attempts    INT  NOT NULL DEFAULT 0,
                error       TEXT,
                duration_ms INT,
                updated_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_progress_status
                ON document_progress(status);
            CREATE TABLE IF NOT EXISTS ingestion_runs (
                id         INTEGER PRIMARY KEY,
                started_at TEXT NOT NULL,
                ended_at   TEXT,
                args       TEXT,
                status     TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            stale_after,
            retry_budget,
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, ProgressError> {
        let conn = self.conn.lock().map_err(|_| ProgressError::LockPoisoned)?;
        Ok(f(&conn)?)
    }

    /// Registers a discovered document as `pending` unless already tracked.
    pub fn mark_pending(&self, document_id: &str) -> Result<(), ProgressError> {
        let now = timestamp(Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO document_progress (document_id, status, attempts, updated_at)
                 VALUES (?1, 'pending', 0, ?2)
                 ON CONFLICT(document_id) DO NOTHING",
                (document_id, now),
            )
            .map(|_| ())
        })
    }

    /// Atomically claims a document for processing.
    ///
    /// Succeeds when the record is absent, `pending`, `failed` with retry
    /// budget remaining, or `processing` past the stale threshold. Of any
    /// set of concurrent callers, exactly one receives `true`.
    pub fn claim(&self, document_id: &str) -> Result<bool, ProgressError> {
        let now = Utc::now();
        let stale_cutoff = timestamp(now - chrono::Duration::from_std(self.stale_after).unwrap_or_default());
        let now = timestamp(now);
        let budget = self.retry_budget;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO document_progress (document_id, status, attempts, error, updated_at)
                 VALUES (?1, 'processing', 1, NULL, ?2)
                 ON CONFLICT(document_id) DO UPDATE SET
                     status = 'processing',
                     attempts = attempts + 1,
                     error = NULL,
                     updated_at = ?2
                 WHERE document_progress.status = 'pending'
                    OR (document_progress.status = 'failed'
                        AND document_progress.attempts < ?3)
                    OR (document_progress.status = 'processing'
                        AND document_progress.updated_at < ?4)",
                (document_id, now, budget, stale_cutoff),
            )
            .map(|changed| changed > 0)
        })
    }

    /// Terminal success transition.
    pub fn complete(&self, document_id: &str, duration: Duration) -> Result<(), ProgressError> {
        let now = timestamp(Utc::now());
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = duration.as_millis() as i64;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO document_progress
                     (document_id, status, attempts, error, duration_ms, updated_at)
                 VALUES (?1, 'completed', 1, NULL, ?2, ?3)
                 ON CONFLICT(document_id) DO UPDATE SET
                     status = 'completed',
                     error = NULL,
                     duration_ms = ?2,
                     updated_at = ?3",
                (document_id, duration_ms, now),
            )
            .map(|_| ())
        })
    }

    /// Terminal failure transition with the captured error message.
    pub fn fail(&self, document_id: &str, error: &str) -> Result<(), ProgressError> {
        let now = timestamp(Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO document_progress (document_id, status, attempts, error, updated_at)
                 VALUES (?1, 'failed', 1, ?2, ?3)
                 ON CONFLICT(document_id) DO UPDATE SET
                     status = 'failed',
                     error = ?2,
                     updated_at = ?3",
                (document_id, error, now),
            )
            .map(|_| ())
        })
    }

    /// Current status of a document, if tracked.
    pub fn status(&self, document_id: &str) -> Result<Option<DocumentStatus>, ProgressError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached("SELECT status FROM document_progress WHERE document_id = ?1")?;
            let status: Option<String> = stmt
                .query_row([document_id], |row| row.get(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(status.as_deref().and_then(|s| match s {
                "pending" => Some(DocumentStatus::Pending),
                "processing" => Some(DocumentStatus::Processing),
                "completed" => Some(DocumentStatus::Completed),
                "failed" => Some(DocumentStatus::Failed),
                _ => None,
            }))
        })
    }

    /// Whether the document has already completed.
    pub fn is_completed(&self, document_id: &str) -> Result<bool, ProgressError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT 1 FROM document_progress WHERE document_id = ?1 AND status = 'completed'",
            )?;
            stmt.exists([document_id])
        })
    }

    /// Counts by status.
    pub fn stats(&self) -> Result<ProgressStats, ProgressError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached("SELECT status, COUNT(*) FROM document_progress GROUP BY status")?;
            let mut stats = ProgressStats::default();
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (status, count) = row?;
                let count = count as u64;
                match status.as_str() {
                    "pending" => stats.pending = count,
                    "processing" => stats.processing = count,
                    "completed" => stats.completed = count,
                    "failed" => stats.failed = count,
                    _ => {}
                }
            }
            Ok(stats)
        })
    }

    /// Document ids currently in the given status, ordered by id.
    pub fn iterate(&self, status: DocumentStatus) -> Result<Vec<String>, ProgressError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT document_id FROM document_progress
                 WHERE status = ?1 ORDER BY document_id",
            )?;
            let rows = stmt.query_map([status.as_str()], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
    }

    /// Records the start of an ingestion run; returns the run id.
    pub fn begin_run(&self, args: &str) -> Result<i64, ProgressError> {
        let now = timestamp(Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO ingestion_runs (started_at, args, status) VALUES (?1, ?2, 'running')",
                (now, args),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Marks an ingestion run finished with the given status.
    pub fn end_run(&self, run_id: i64, status: &str) -> Result<(), ProgressError> {
        let now = timestamp(Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE ingestion_runs SET ended_at = ?1, status = ?2 WHERE id = ?3",
                (now, status, run_id),
            )
            .map(|_| ())
        })
    }
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("stale_after", &self.stale_after)
            .field("retry_budget", &self.retry_budget)
            .finish_non_exhaustive()
    }
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.format(TS_FORMAT).to_string()
}
