//! `SQLite` dependency store.
//!
//! One table, `dependencies`, unique over the `(task_id,
//! depends_on_task_id, dependency_type)` triple and indexed on both task
//! columns. Guarded inserts run in a `BEGIN IMMEDIATE` transaction, which
//! takes the database write lock before the guard reads the edge set.

use super::{DependencyStore, EdgeGuard, mint_edge};
use crate::domain::{DependencyEdge, DependencyType, EdgeId, NewDependency, TaskId};
use crate::error::{Error, Result, StorageError};
use crate::id_generation::IdGenerator;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS dependencies (
    id                 TEXT PRIMARY KEY,
    task_id            TEXT NOT NULL,
    depends_on_task_id TEXT NOT NULL,
    dependency_type    TEXT NOT NULL
        CHECK (dependency_type IN ('blocks', 'blocked-by', 'relates-to')),
    created_at         TEXT NOT NULL,
    CHECK (task_id <> depends_on_task_id),
    UNIQUE (task_id, depends_on_task_id, dependency_type)
);

CREATE INDEX IF NOT EXISTS idx_dependencies_task_id
    ON dependencies(task_id);
CREATE INDEX IF NOT EXISTS idx_dependencies_depends_on_task_id
    ON dependencies(depends_on_task_id);
";

const COLUMNS: &str = "id, task_id, depends_on_task_id, dependency_type, created_at";

/// Dependency store backed by a `SQLite` database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    ids: IdGenerator,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .field("prefix", &self.ids.prefix())
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot be
    /// applied.
    pub fn open(path: &Path, prefix: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self::with_connection(conn, Some(path.to_path_buf()), prefix)?;
        info!(path = %path.display(), "Opened dependency database");
        Ok(store)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn open_in_memory(prefix: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, None, prefix)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>, prefix: &str) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            ids: IdGenerator::new(prefix).map_err(StorageError::from)?,
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage(StorageError::LockPoisoned))
    }

    fn invalid(&self, reason: String) -> Error {
        Error::Storage(StorageError::InvalidFormat {
            path: self.path.clone().unwrap_or_else(|| PathBuf::from(":memory:")),
            reason,
        })
    }

    fn query(&self, conn: &Connection, filter: &str, arg: Option<&str>) -> Result<Vec<DependencyEdge>> {
        let sql = format!("SELECT {COLUMNS} FROM dependencies {filter} ORDER BY created_at, id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = match arg {
            Some(arg) => stmt.query_map([arg], RawEdge::from_row)?,
            None => stmt.query_map([], RawEdge::from_row)?,
        };

        let mut edges = Vec::new();
        for raw in rows {
            edges.push(raw?.into_edge().map_err(|reason| self.invalid(reason))?);
        }
        Ok(edges)
    }
}

/// Row as stored, before text columns are parsed.
struct RawEdge {
    id: String,
    task_id: String,
    depends_on_task_id: String,
    dependency_type: String,
    created_at: String,
}

impl RawEdge {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task_id: row.get(1)?,
            depends_on_task_id: row.get(2)?,
            dependency_type: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_edge(self) -> std::result::Result<DependencyEdge, String> {
        let dep_type: DependencyType = self.dependency_type.parse()?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| format!("edge {}: bad created_at '{}': {e}", self.id, self.created_at))?
            .with_timezone(&Utc);
        Ok(DependencyEdge {
            id: EdgeId(self.id),
            task_id: TaskId(self.task_id),
            depends_on_task_id: TaskId(self.depends_on_task_id),
            dep_type,
            created_at,
        })
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[async_trait]
impl DependencyStore for SqliteStore {
    async fn insert_guarded(
        &self,
        new: NewDependency,
        guard: &dyn EdgeGuard,
    ) -> Result<DependencyEdge> {
        new.validate().map_err(Error::Validation)?;

        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = self.query(&tx, "", None)?;
        guard.check(&existing, &new)?;

        let edge = mint_edge(&self.ids, &existing, new)?;

        let inserted = tx.execute(
            "INSERT INTO dependencies (id, task_id, depends_on_task_id, dependency_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                edge.id.as_str(),
                edge.task_id.as_str(),
                edge.depends_on_task_id.as_str(),
                edge.dep_type.as_str(),
                format_timestamp(edge.created_at)
            ],
        );
        match inserted {
            Err(e) if is_unique_violation(&e) => {
                return Err(Error::DuplicateEdge {
                    task_id: edge.task_id,
                    depends_on_task_id: edge.depends_on_task_id,
                    dep_type: edge.dep_type,
                });
            }
            other => {
                other?;
            }
        }
        tx.commit()?;

        info!(
            id = %edge.id,
            task = %edge.task_id,
            depends_on = %edge.depends_on_task_id,
            dep_type = %edge.dep_type,
            "Stored dependency"
        );
        Ok(edge)
    }

    async fn remove(&self, id: &EdgeId) -> Result<DependencyEdge> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw = tx
            .query_row(
                &format!("SELECT {COLUMNS} FROM dependencies WHERE id = ?1"),
                [id.as_str()],
                RawEdge::from_row,
            )
            .optional()?
            .ok_or_else(|| Error::DependencyNotFound(id.clone()))?;
        let edge = raw.into_edge().map_err(|reason| self.invalid(reason))?;

        tx.execute("DELETE FROM dependencies WHERE id = ?1", [id.as_str()])?;
        tx.commit()?;
        info!(id = %id, "Removed dependency");
        Ok(edge)
    }

    async fn get(&self, id: &EdgeId) -> Result<Option<DependencyEdge>> {
        let conn = self.connection()?;
        Ok(self
            .query(&conn, "WHERE id = ?1", Some(id.as_str()))?
            .into_iter()
            .next())
    }

    async fn find_by_subject(&self, task: &TaskId) -> Result<Vec<DependencyEdge>> {
        let conn = self.connection()?;
        self.query(&conn, "WHERE task_id = ?1", Some(task.as_str()))
    }

    async fn find_by_object(&self, task: &TaskId) -> Result<Vec<DependencyEdge>> {
        let conn = self.connection()?;
        self.query(&conn, "WHERE depends_on_task_id = ?1", Some(task.as_str()))
    }

    async fn remove_all_for_task(&self, task: &TaskId) -> Result<usize> {
        let conn = self.connection()?;
        let removed = conn.execute(
            "DELETE FROM dependencies WHERE task_id = ?1 OR depends_on_task_id = ?1",
            [task.as_str()],
        )?;
        debug!(task = %task, removed, "Purged dependencies for task");
        Ok(removed)
    }

    async fn all_edges(&self) -> Result<Vec<DependencyEdge>> {
        let conn = self.connection()?;
        self.query(&conn, "", None)
    }

    async fn save(&self) -> Result<()> {
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        Ok(())
    }
}
