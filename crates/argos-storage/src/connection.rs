//! Connection management: one serialized write connection plus a small
//! pool of read-only connections. WAL mode keeps readers concurrent with
//! the single writer.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use tracing::debug;

use argos_core::errors::StoreError;

use crate::migrations;

const READ_POOL_SIZE: usize = 4;
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Classify a rusqlite failure into the store taxonomy.
pub(crate) fn sqe(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(f, msg) => {
            let detail = msg.clone().unwrap_or_else(|| e.to_string());
            match f.code {
                rusqlite::ErrorCode::ConstraintViolation => {
                    StoreError::Constraint { detail }
                }
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    StoreError::Busy
                }
                rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => {
                    StoreError::Corruption { details: detail }
                }
                _ => StoreError::Sqlite { message: e.to_string() },
            }
        }
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
            what: "row".to_string(),
        },
        _ => StoreError::Sqlite { message: e.to_string() },
    }
}

/// Owns the write connection and the read pool. All reads go through
/// [`DatabaseManager::with_reader`], all writes through
/// [`DatabaseManager::with_writer`] or [`DatabaseManager::transaction`].
pub struct DatabaseManager {
    write: Mutex<Connection>,
    /// Empty for in-memory databases; reads are then routed through the
    /// write connection, since each in-memory connection is its own DB.
    readers: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
    writers_queued: AtomicUsize,
    /// Set once file-level corruption is detected; all further writes are
    /// refused. There is no silent reopen.
    poisoned: AtomicBool,
    path: Option<PathBuf>,
}

impl DatabaseManager {
    /// Open a file-backed database, applying pragmas and running pending
    /// migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Sqlite {
                message: format!("create db directory: {e}"),
            })?;
        }

        let write = Connection::open(path).map_err(sqe)?;
        apply_write_pragmas(&write)?;
        migrations::run_migrations(&write)?;

        let mut readers = Vec::with_capacity(READ_POOL_SIZE);
        for _ in 0..READ_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(sqe)?;
            conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))
                .map_err(sqe)?;
            readers.push(Mutex::new(conn));
        }

        debug!(path = %path.display(), "opened database");
        Ok(Self {
            write: Mutex::new(write),
            readers,
            next_reader: AtomicUsize::new(0),
            writers_queued: AtomicUsize::new(0),
            poisoned: AtomicBool::new(false),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let write = Connection::open_in_memory().map_err(sqe)?;
        apply_write_pragmas(&write)?;
        migrations::run_migrations(&write)?;
        Ok(Self {
            write: Mutex::new(write),
            readers: Vec::new(),
            next_reader: AtomicUsize::new(0),
            writers_queued: AtomicUsize::new(0),
            poisoned: AtomicBool::new(false),
            path: None,
        })
    }

    /// Database file path (None for in-memory).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of writers currently waiting on the write lock.
    pub fn writers_queued(&self) -> usize {
        self.writers_queued.load(Ordering::Relaxed)
    }

    /// Run `f` against a read connection.
    pub fn with_reader<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        if self.readers.is_empty() {
            let conn = self.write.lock().unwrap_or_else(|e| e.into_inner());
            return f(&conn);
        }
        let idx = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx].lock().unwrap_or_else(|e| e.into_inner());
        f(&conn)
    }

    /// Run `f` against the write connection.
    pub fn with_writer<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        self.check_poisoned()?;
        self.writers_queued.fetch_add(1, Ordering::Relaxed);
        let conn = self.write.lock().unwrap_or_else(|e| e.into_inner());
        self.writers_queued.fetch_sub(1, Ordering::Relaxed);
        self.record_corruption(f(&conn))
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction. Commits on `Ok`,
    /// rolls back on `Err`.
    pub fn transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        self.check_poisoned()?;
        self.writers_queued.fetch_add(1, Ordering::Relaxed);
        let mut conn = self.write.lock().unwrap_or_else(|e| e.into_inner());
        self.writers_queued.fetch_sub(1, Ordering::Relaxed);

        self.record_corruption((|| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(sqe)?;
            // Rollback happens on drop if f errors before commit.
            let out = f(&tx)?;
            tx.commit().map_err(sqe)?;
            Ok(out)
        })())
    }

    fn check_poisoned(&self) -> Result<(), StoreError> {
        if self.poisoned.load(Ordering::Relaxed) {
            return Err(StoreError::Corruption {
                details: "database previously reported corruption; writes are disabled"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn record_corruption<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if let Err(StoreError::Corruption { .. }) = &result {
            self.poisoned.store(true, Ordering::Relaxed);
        }
        result
    }

    /// WAL checkpoint. Called before teardown so the file can be removed
    /// cleanly (connections must be dropped before any unlink).
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        let conn = self.write.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            .map_err(sqe)
    }
}

fn apply_write_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))
        .map_err(sqe)?;
    conn.pragma_update(None, "journal_mode", "WAL").map_err(sqe)?;
    conn.pragma_update(None, "synchronous", "NORMAL").map_err(sqe)?;
    conn.pragma_update(None, "foreign_keys", "ON").map_err(sqe)?;
    Ok(())
}
