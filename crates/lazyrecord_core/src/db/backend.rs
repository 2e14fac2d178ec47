//! Pooled, process-wide SQLite backend.
//!
//! # Responsibility
//! - Bootstrap the database (pragmas + migrations) once at startup.
//! - Lend pooled connections to exactly one scoped operation at a time.
//! - Enforce caller deadlines on acquisition, lock waits and execution.
//!
//! # Invariants
//! - A connection never outlives the closure it was lent to; it returns to
//!   the pool on every exit path, including errors and panics.
//! - Per-operation deadline settings are removed before the connection is
//!   returned, so a pooled connection never carries a stale deadline.
//! - After [`Backend::close`], no new operation reaches SQLite.

use super::deadline::Deadline;
use super::migrations::apply_migrations;
use super::open::{configure_connection, open_db, DEFAULT_BUSY_TIMEOUT};
use super::{DbError, DbResult};
use log::{info, warn};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, ErrorCode};
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// VM instructions between deadline checks while a statement runs.
const PROGRESS_CHECK_INTERVAL_OPS: i32 = 1_000;

/// Pool sizing and wait limits for a file-backed [`Backend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackendOptions {
    /// Maximum number of pooled connections. `0` is treated as `1`.
    pub pool_size: u32,
    /// How long a statement waits on another writer's lock.
    pub busy_timeout_ms: u64,
    /// How long an operation without a deadline waits for a free connection.
    pub acquire_timeout_ms: u64,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
            acquire_timeout_ms: 30_000,
        }
    }
}

impl BackendOptions {
    fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms.max(1))
    }
}

/// Where the backend keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMode {
    File(PathBuf),
    Memory,
}

/// Shared handle to the connection pool. Cloning is cheap; all clones share
/// one pool and one open/closed state.
#[derive(Clone)]
pub struct Backend {
    inner: Arc<BackendInner>,
}

struct BackendInner {
    pool: Pool<SqliteConnectionManager>,
    mode: BackendMode,
    options: BackendOptions,
    closed: AtomicBool,
}

impl Debug for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("mode", &self.inner.mode)
            .field("options", &self.inner.options)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Backend {
    /// Opens (creating if needed) a database file, migrates it, and builds the
    /// connection pool.
    ///
    /// # Errors
    /// - `UnsupportedSchemaVersion` when the file was written by a newer binary.
    /// - `Sqlite`/`Pool` when the file cannot be opened or configured.
    pub fn open(path: impl AsRef<Path>, options: &BackendOptions) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();

        // Migrate on a dedicated connection so schema errors surface typed,
        // before any pooled connection exists.
        drop(open_db(&path)?);

        let busy_timeout = options.busy_timeout();
        let manager = SqliteConnectionManager::file(&path)
            .with_init(move |conn| configure_connection(conn, busy_timeout, true));
        let pool = Pool::builder()
            .max_size(options.pool_size.max(1))
            .connection_timeout(options.acquire_timeout())
            .build(manager)?;

        info!(
            "event=backend_open module=db status=ok mode=file pool_size={}",
            options.pool_size.max(1)
        );
        Ok(Self::from_parts(pool, BackendMode::File(path), *options))
    }

    /// Opens a private in-memory database behind a single-connection pool.
    ///
    /// The one connection is never recycled, so data lives exactly as long as
    /// the backend. Concurrent callers queue for it.
    pub fn open_in_memory() -> DbResult<Self> {
        let options = BackendOptions {
            pool_size: 1,
            ..BackendOptions::default()
        };
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            configure_connection(conn, DEFAULT_BUSY_TIMEOUT, false)?;
            apply_migrations(conn).map_err(into_sqlite_error)
        });
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .max_lifetime(None)
            .idle_timeout(None)
            .connection_timeout(options.acquire_timeout())
            .build(manager)?;

        info!("event=backend_open module=db status=ok mode=memory pool_size=1");
        Ok(Self::from_parts(pool, BackendMode::Memory, options))
    }

    fn from_parts(
        pool: Pool<SqliteConnectionManager>,
        mode: BackendMode,
        options: BackendOptions,
    ) -> Self {
        Self {
            inner: Arc::new(BackendInner {
                pool,
                mode,
                options,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn mode(&self) -> &BackendMode {
        &self.inner.mode
    }

    pub fn options(&self) -> &BackendOptions {
        &self.inner.options
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of (total, idle) pooled connections.
    pub fn pool_state(&self) -> (u32, u32) {
        let state = self.inner.pool.state();
        (state.connections, state.idle_connections)
    }

    /// Shuts the backend down for every clone of this handle.
    ///
    /// In-flight operations finish normally; later ones fail with
    /// [`DbError::Closed`]. Idle connections are released when the last handle
    /// drops. Calling `close` twice is a no-op.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (connections, idle) = self.pool_state();
        info!(
            "event=db_close module=db status=ok connections={} idle={}",
            connections, idle
        );
    }

    /// Runs `op` on a pooled connection under `deadline`.
    ///
    /// The connection is held only while `op` runs. With a deadline set:
    /// - an already expired deadline fails before touching SQLite;
    /// - waiting for a free connection is capped at the remaining time;
    /// - lock waits (`busy_timeout`) are capped at the remaining time;
    /// - a running statement is interrupted once the deadline passes.
    ///
    /// All four cases yield [`DbError::DeadlineExceeded`]. A lock wait that
    /// exhausts the configured busy timeout before the deadline stays a
    /// [`DbError::Sqlite`] busy error. An interrupted
    /// statement is rolled back by SQLite, so nothing partial is committed.
    pub fn with_connection<T, F>(&self, deadline: Deadline, op: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        if deadline.is_expired() {
            warn!("event=db_deadline module=db status=timeout stage=before_acquire");
            return Err(DbError::DeadlineExceeded);
        }

        let conn = self.acquire(deadline)?;
        let guard = DeadlineGuard::install(&conn, deadline, self.inner.options.busy_timeout())?;
        let result = op(&conn);
        drop(guard);

        result.map_err(|err| {
            let classified = classify_sqlite_error(err, deadline);
            if matches!(classified, DbError::DeadlineExceeded) {
                warn!("event=db_deadline module=db status=timeout stage=execute");
            }
            classified
        })
    }

    fn acquire(&self, deadline: Deadline) -> DbResult<PooledConnection<SqliteConnectionManager>> {
        let result = match deadline.remaining() {
            Some(remaining) => self.inner.pool.get_timeout(remaining),
            None => self.inner.pool.get(),
        };
        result.map_err(|err| {
            if deadline.is_expired() {
                warn!("event=db_deadline module=db status=timeout stage=acquire");
                DbError::DeadlineExceeded
            } else {
                DbError::Pool(err)
            }
        })
    }
}

/// Installs deadline enforcement on a borrowed connection and restores the
/// pool defaults on drop.
struct DeadlineGuard<'conn> {
    conn: &'conn Connection,
    default_busy_timeout: Duration,
    installed: bool,
}

impl<'conn> DeadlineGuard<'conn> {
    fn install(
        conn: &'conn Connection,
        deadline: Deadline,
        default_busy_timeout: Duration,
    ) -> DbResult<Self> {
        let Some(expires_at) = deadline.instant() else {
            return Ok(Self {
                conn,
                default_busy_timeout,
                installed: false,
            });
        };

        // SQLite counts lock waits in whole milliseconds; round up so a wait
        // capped by the deadline only gives up once the deadline has passed.
        let remaining = expires_at.saturating_duration_since(Instant::now());
        let remaining_ms = remaining.as_millis().saturating_add(1);
        let capped = Duration::from_millis(u64::try_from(remaining_ms).unwrap_or(u64::MAX));
        conn.busy_timeout(capped.min(default_busy_timeout))?;
        conn.progress_handler(
            PROGRESS_CHECK_INTERVAL_OPS,
            Some(move || Instant::now() >= expires_at),
        );
        Ok(Self {
            conn,
            default_busy_timeout,
            installed: true,
        })
    }
}

impl Drop for DeadlineGuard<'_> {
    fn drop(&mut self) {
        if !self.installed {
            return;
        }
        self.conn.progress_handler(0, None::<fn() -> bool>);
        if let Err(err) = self.conn.busy_timeout(self.default_busy_timeout) {
            warn!(
                "event=db_deadline_reset module=db status=error error={}",
                err
            );
        }
    }
}

fn classify_sqlite_error(err: rusqlite::Error, deadline: Deadline) -> DbError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        match failure.code {
            ErrorCode::OperationInterrupted => return DbError::DeadlineExceeded,
            // A lock wait that outlived the deadline is a timeout; one that
            // gave up earlier (busy timeout exhausted) is a backend failure.
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked if deadline.is_expired() => {
                return DbError::DeadlineExceeded;
            }
            _ => {}
        }
    }
    DbError::Sqlite(err)
}

fn into_sqlite_error(err: DbError) -> rusqlite::Error {
    match err {
        DbError::Sqlite(inner) => inner,
        other => rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(other.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{Backend, BackendMode, BackendOptions};
    use crate::db::{DbError, Deadline};
    use std::time::Duration;

    #[test]
    fn in_memory_backend_keeps_data_between_operations() {
        let backend = Backend::open_in_memory().unwrap();
        assert_eq!(backend.mode(), &BackendMode::Memory);

        backend
            .with_connection(Deadline::none(), |conn| {
                conn.execute("INSERT INTO hello (message) VALUES ('hi');", [])
            })
            .unwrap();
        let count: i64 = backend
            .with_connection(Deadline::none(), |conn| {
                conn.query_row("SELECT COUNT(*) FROM hello;", [], |row| row.get(0))
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn expired_deadline_fails_without_running_the_operation() {
        let backend = Backend::open_in_memory().unwrap();
        let mut ran = false;
        let err = backend
            .with_connection(Deadline::after(Duration::ZERO), |_conn| {
                ran = true;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, DbError::DeadlineExceeded));
        assert!(!ran);
    }

    #[test]
    fn close_rejects_later_operations_for_all_clones() {
        let backend = Backend::open_in_memory().unwrap();
        let clone = backend.clone();
        backend.close();
        backend.close();

        let err = clone
            .with_connection(Deadline::none(), |conn| {
                conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))
            })
            .unwrap_err();
        assert!(matches!(err, DbError::Closed));
        assert!(clone.is_closed());
    }

    #[test]
    fn connection_returns_to_pool_after_error() {
        let backend = Backend::open_in_memory().unwrap();
        let failed = backend.with_connection(Deadline::none(), |conn| {
            conn.execute("INSERT INTO missing_table VALUES (1);", [])
        });
        assert!(matches!(failed, Err(DbError::Sqlite(_))));

        // Single-connection pool: this would block forever if the connection leaked.
        let value: i64 = backend
            .with_connection(Deadline::after(Duration::from_secs(5)), |conn| {
                conn.query_row("SELECT 7;", [], |row| row.get(0))
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(backend.pool_state(), (1, 1));
    }

    #[test]
    fn backend_options_default_missing_fields() {
        let options: BackendOptions = serde_json::from_str(r#"{"pool_size": 2}"#).unwrap();
        assert_eq!(options.pool_size, 2);
        assert_eq!(options.busy_timeout_ms, 5_000);
        assert_eq!(options.acquire_timeout_ms, 30_000);
    }
}
