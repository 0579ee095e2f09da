use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use super::models::*;

/// Async-safe handle to the bridge database.
///
/// Wraps `BridgeDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O
/// never ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BridgeDb>>,
}

impl DbHandle {
    pub fn new(db: BridgeDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&BridgeDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

const ISSUE_COLUMNS: &str = "id, tenant_id, vpc_id, region_id, issue_jira_id, name, data_log, error_code, status, service, created_at, updated_at";

const ERROR_COLUMNS: &str = "id, error_code, name, description, service, created_at, updated_at";

const STEP_LOG_COLUMNS: &str =
    "id, issue_id, reporter_name, supporter_name, description, status, created_at, updated_at";

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub struct BridgeDb {
    conn: Connection,
}

impl BridgeDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS issues (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    tenant_id TEXT NOT NULL DEFAULT '',
                    vpc_id TEXT NOT NULL DEFAULT '',
                    region_id TEXT NOT NULL DEFAULT '',
                    issue_jira_id TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL DEFAULT '',
                    data_log TEXT NOT NULL DEFAULT '',
                    error_code TEXT NOT NULL DEFAULT '',
                    status TEXT NOT NULL,
                    service TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS error_store (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    error_code TEXT NOT NULL,
                    name TEXT NOT NULL DEFAULT '',
                    description TEXT NOT NULL DEFAULT '',
                    service TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS step_log (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    issue_id TEXT NOT NULL
                        REFERENCES issues(issue_jira_id) ON DELETE CASCADE ON UPDATE CASCADE,
                    reporter_name TEXT NOT NULL DEFAULT '',
                    supporter_name TEXT NOT NULL DEFAULT '',
                    description TEXT NOT NULL DEFAULT '',
                    status TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_error_store_code ON error_store(error_code);
                CREATE INDEX IF NOT EXISTS idx_step_log_issue ON step_log(issue_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Issue CRUD ────────────────────────────────────────────────────

    /// Insert an issue together with its opening step-log entry.
    /// Returns `None` when an issue with the same tracker ID already exists.
    pub fn create_issue(&self, issue: &NewIssue, note: &StepNote) -> Result<Option<Issue>> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM issues WHERE issue_jira_id = ?1",
                params![issue.issue_jira_id],
                |row| row.get(0),
            )
            .context("Failed to check for existing issue")?;
        if exists {
            return Ok(None);
        }

        let ts = now();
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "INSERT INTO issues (tenant_id, vpc_id, region_id, issue_jira_id, name, data_log, error_code, status, service, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                issue.tenant_id,
                issue.vpc_id,
                issue.region_id,
                issue.issue_jira_id,
                issue.name,
                issue.data_log,
                issue.error_code,
                issue.status,
                issue.service,
                ts,
            ],
        )
        .context("Failed to insert issue")?;
        let id = tx.last_insert_rowid();
        insert_step_log(&tx, &issue.issue_jira_id, note, &issue.status, &ts)?;
        tx.commit().context("Failed to commit issue insert")?;

        self.get_issue(id)
    }

    pub fn list_issues(&self) -> Result<Vec<Issue>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM issues ORDER BY id", ISSUE_COLUMNS))
            .context("Failed to prepare list_issues")?;
        let rows = stmt
            .query_map([], issue_from_row)
            .context("Failed to query issues")?;
        let mut issues = Vec::new();
        for row in rows {
            issues.push(row.context("Failed to read issue row")?);
        }
        Ok(issues)
    }

    pub fn get_issue(&self, id: i64) -> Result<Option<Issue>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM issues WHERE id = ?1", ISSUE_COLUMNS),
                params![id],
                issue_from_row,
            )
            .optional()
            .context("Failed to query issue")
    }

    pub fn get_issue_by_tracker_id(&self, tracker_id: &str) -> Result<Option<Issue>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM issues WHERE issue_jira_id = ?1",
                ISSUE_COLUMNS
            ))
            .context("Failed to prepare get_issue_by_tracker_id")?;
        let mut rows = stmt
            .query_map(params![tracker_id], issue_from_row)
            .context("Failed to query issue by tracker id")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read issue row")?)),
            None => Ok(None),
        }
    }

    pub fn get_status(&self, tracker_id: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT status FROM issues WHERE issue_jira_id = ?1",
                params![tracker_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query issue status")
    }

    /// Set the status of one issue and record the change in its step log.
    /// Returns `None` if no issue carries `tracker_id`.
    pub fn set_status(
        &self,
        tracker_id: &str,
        status: &str,
        note: &StepNote,
    ) -> Result<Option<Issue>> {
        let ts = now();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let count = tx
            .execute(
                "UPDATE issues SET status = ?1, updated_at = ?2 WHERE issue_jira_id = ?3",
                params![status, ts, tracker_id],
            )
            .context("Failed to update issue status")?;
        if count == 0 {
            return Ok(None);
        }
        insert_step_log(&tx, tracker_id, note, status, &ts)?;
        tx.commit().context("Failed to commit status update")?;

        self.get_issue_by_tracker_id(tracker_id)
    }

    /// Point issue `id` at a new tracker ticket. Existing step-log entries
    /// follow the new ID through `ON UPDATE CASCADE`.
    pub fn update_tracker_id(
        &self,
        id: i64,
        tracker_id: &str,
        note: &StepNote,
    ) -> Result<Option<Issue>> {
        let Some(issue) = self.get_issue(id)? else {
            return Ok(None);
        };

        let ts = now();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "UPDATE issues SET issue_jira_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![tracker_id, ts, id],
        )
        .context("Failed to update issue tracker id")?;
        insert_step_log(&tx, tracker_id, note, &issue.status, &ts)?;
        tx.commit().context("Failed to commit tracker id update")?;

        self.get_issue(id)
    }

    /// Delete an issue and, by cascade, its step log.
    pub fn delete_issue(&self, tracker_id: &str) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "DELETE FROM issues WHERE issue_jira_id = ?1",
                params![tracker_id],
            )
            .context("Failed to delete issue")?;
        Ok(count > 0)
    }

    // ── Error catalog ─────────────────────────────────────────────────

    pub fn create_error(
        &self,
        error_code: &str,
        name: &str,
        description: &str,
        service: &str,
    ) -> Result<ErrorStore> {
        let ts = now();
        self.conn
            .execute(
                "INSERT INTO error_store (error_code, name, description, service, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![error_code, name, description, service, ts],
            )
            .context("Failed to insert error store entry")?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                &format!("SELECT {} FROM error_store WHERE id = ?1", ERROR_COLUMNS),
                params![id],
                error_from_row,
            )
            .context("Error store entry not found after insert")
    }

    pub fn list_errors(&self) -> Result<Vec<ErrorStore>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM error_store ORDER BY id", ERROR_COLUMNS))
            .context("Failed to prepare list_errors")?;
        let rows = stmt
            .query_map([], error_from_row)
            .context("Failed to query error store")?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.context("Failed to read error store row")?);
        }
        Ok(entries)
    }

    /// Codes are not unique in the catalog; the oldest entry wins.
    pub fn get_error_by_code(&self, error_code: &str) -> Result<Option<ErrorStore>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM error_store WHERE error_code = ?1 ORDER BY id LIMIT 1",
                    ERROR_COLUMNS
                ),
                params![error_code],
                error_from_row,
            )
            .optional()
            .context("Failed to query error store by code")
    }

    // ── Step log ──────────────────────────────────────────────────────

    pub fn list_step_logs(&self, tracker_id: &str) -> Result<Vec<StepLog>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM step_log WHERE issue_id = ?1 ORDER BY id",
                STEP_LOG_COLUMNS
            ))
            .context("Failed to prepare list_step_logs")?;
        let rows = stmt
            .query_map(params![tracker_id], |row| {
                Ok(StepLog {
                    id: row.get(0)?,
                    issue_id: row.get(1)?,
                    reporter_name: row.get(2)?,
                    supporter_name: row.get(3)?,
                    description: row.get(4)?,
                    status: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })
            .context("Failed to query step log")?;
        let mut logs = Vec::new();
        for row in rows {
            logs.push(row.context("Failed to read step log row")?);
        }
        Ok(logs)
    }

    // ── Issue detail ──────────────────────────────────────────────────

    pub fn get_issue_with_logs(&self, tracker_id: &str) -> Result<Option<IssueWithLogs>> {
        let issue = match self.get_issue_by_tracker_id(tracker_id)? {
            Some(i) => i,
            None => return Ok(None),
        };
        let logs = self.list_step_logs(tracker_id)?;
        Ok(Some(IssueWithLogs { issue, logs }))
    }
}

fn insert_step_log(
    conn: &Connection,
    tracker_id: &str,
    note: &StepNote,
    status: &str,
    ts: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO step_log (issue_id, reporter_name, supporter_name, description, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            tracker_id,
            note.reporter_name,
            note.supporter_name,
            note.description,
            status,
            ts,
        ],
    )
    .context("Failed to insert step log")?;
    Ok(conn.last_insert_rowid())
}

fn issue_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        vpc_id: row.get(2)?,
        region_id: row.get(3)?,
        issue_jira_id: row.get(4)?,
        name: row.get(5)?,
        data_log: row.get(6)?,
        error_code: row.get(7)?,
        status: row.get(8)?,
        service: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn error_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ErrorStore> {
    Ok(ErrorStore {
        id: row.get(0)?,
        error_code: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        service: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
