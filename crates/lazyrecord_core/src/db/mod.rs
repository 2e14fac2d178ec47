//! SQLite backend lifecycle, pooling and schema migration entry points.
//!
//! # Responsibility
//! - Own the process-wide connection pool behind [`Backend`].
//! - Apply schema migrations in deterministic order before any data access.
//! - Hand out connections only for the duration of one scoped operation.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write application data before migrations succeed.
//! - Deadline expiry is reported as [`DbError::DeadlineExceeded`], never as a
//!   transport failure.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod backend;
mod deadline;
pub mod migrations;
mod open;

pub use backend::{Backend, BackendMode, BackendOptions};
pub use deadline::Deadline;
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Pool(r2d2::Error),
    /// The backend was shut down via [`Backend::close`].
    Closed,
    /// The caller's deadline passed before the statement committed.
    DeadlineExceeded,
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Pool(err) => write!(f, "connection pool error: {err}"),
            Self::Closed => write!(f, "backend is closed"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded before commit"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Pool(err) => Some(err),
            Self::Closed | Self::DeadlineExceeded | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<r2d2::Error> for DbError {
    fn from(value: r2d2::Error) -> Self {
        Self::Pool(value)
    }
}

impl DbError {
    /// Returns `true` when a constraint (UNIQUE, CHECK, NOT NULL, ...) rejected
    /// the statement.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Returns `true` when `err` is a UNIQUE or PRIMARY KEY violation.
///
/// These are the only constraint failures a create-race can produce.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == rusqlite::ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_unique_violation, DbError};
    use rusqlite::Connection;

    fn conn_with_table() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (
                k TEXT NOT NULL UNIQUE,
                v INTEGER NOT NULL CHECK (v >= 0)
            );
            INSERT INTO t (k, v) VALUES ('a', 1);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn unique_violation_is_detected() {
        let conn = conn_with_table();
        let err = conn
            .execute("INSERT INTO t (k, v) VALUES ('a', 2);", [])
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(DbError::from(err).is_constraint_violation());
    }

    #[test]
    fn check_violation_is_not_a_unique_violation() {
        let conn = conn_with_table();
        let err = conn
            .execute("INSERT INTO t (k, v) VALUES ('b', -1);", [])
            .unwrap_err();
        assert!(!is_unique_violation(&err));
        assert!(DbError::from(err).is_constraint_violation());
    }
}
