//! SQLite document store for library records.
//!
//! One row per record: the id as primary key and the full record as JSON.
//! Opening a file-backed store takes an exclusive advisory lock next to the
//! database so only one process owns the library at a time.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use fs2::FileExt;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::backup::BackupPolicy;
use super::Backend;
use crate::domain::Metadata;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS library (
    id TEXT PRIMARY KEY NOT NULL,
    body TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

fn sql_err(e: rusqlite::Error) -> io::Error {
    io::Error::other(e)
}

/// Record store backed by a SQLite database
pub struct SqliteBackend {
    /// Shared with the blocking pool for each statement
    conn: Arc<Mutex<Connection>>,

    /// Database file (`None` for in-memory stores)
    path: Option<PathBuf>,

    /// Held for the lifetime of the backend; released on drop
    _lock: Option<File>,
}

impl SqliteBackend {
    /// Open or create the database at `path`, backing up the existing
    /// file first when a policy is given.
    pub fn open(path: &Path, backups: Option<&BackupPolicy>) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock = Self::acquire_lock(path)?;

        if let Some(policy) = backups {
            policy.backup(path)?;
        }

        let conn = Connection::open(path).map_err(sql_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(sql_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(sql_err)?;

        info!("Opened library database: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
            _lock: Some(lock),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> io::Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(sql_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
            _lock: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn acquire_lock(path: &Path) -> io::Result<File> {
        let lock_path = path.with_extension("lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        file.try_lock_exclusive().map_err(|e| {
            io::Error::new(
                io::ErrorKind::WouldBlock,
                format!(
                    "Library {} is already in use by another process: {}",
                    path.display(),
                    e
                ),
            )
        })?;

        Ok(file)
    }

    /// Run `work` against the connection off the async runtime
    async fn with_conn<T, F>(&self, work: F) -> io::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> io::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || work(&lock(&conn)))
            .await
            .map_err(io::Error::other)?
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Backend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load_all(&self) -> io::Result<Vec<Metadata>> {
        let records = self
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare("SELECT id, body FROM library ORDER BY id")
                    .map_err(sql_err)?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
                    .map_err(sql_err)?;

                let mut records = Vec::new();
                for row in rows {
                    let (id, body) = row.map_err(sql_err)?;
                    let record: Metadata = serde_json::from_str(&body).map_err(|e| {
                        io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("Failed to parse stored metadata {}: {}", id, e),
                        )
                    })?;
                    records.push(record);
                }
                Ok(records)
            })
            .await?;

        debug!(count = records.len(), "Loaded records from sqlite");
        Ok(records)
    }

    async fn save(&self, record: &Metadata) -> io::Result<()> {
        let body = serde_json::to_string(record)?;
        let id = record.id.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO library (id, body, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     body = excluded.body,
                     updated_at = excluded.updated_at",
                params![id, body, Utc::now().to_rfc3339()],
            )
            .map_err(sql_err)
        })
        .await?;
        debug!(id = %record.id, "Saved record");
        Ok(())
    }

    async fn delete(&self, id: &str) -> io::Result<bool> {
        let key = id.to_string();
        let removed = self
            .with_conn(move |conn| {
                conn.execute("DELETE FROM library WHERE id = ?1", params![key])
                    .map_err(sql_err)
            })
            .await?;
        debug!(id, removed, "Deleted record");
        Ok(removed > 0)
    }
}
