//! Store-level error taxonomy shared by entity and pool stores.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed failure surfaced by store operations. Stores never retry.
///
/// A lost create-race is not represented here: it is absorbed and resolved
/// to a successful read.
#[derive(Debug)]
pub enum StoreError {
    /// Connection, pool or transport failure.
    BackendUnavailable(DbError),
    /// Constraint violation other than a create-race, or persisted data that
    /// cannot be decoded.
    InvalidState(String),
    /// The operation required an existing record.
    NotFound { entity: &'static str, key: String },
    /// Sample requested from a pool with zero records.
    EmptyPool(&'static str),
    /// Deadline passed before the statement committed. Nothing was written.
    Timeout,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackendUnavailable(err) => write!(f, "backend unavailable: {err}"),
            Self::InvalidState(message) => write!(f, "invalid state: {message}"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::EmptyPool(pool) => write!(f, "pool `{pool}` is empty"),
            Self::Timeout => write!(f, "operation timed out"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::BackendUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::DeadlineExceeded => Self::Timeout,
            err if err.is_constraint_violation() => Self::InvalidState(err.to_string()),
            DbError::Sqlite(err) if is_decode_error(&err) => Self::InvalidState(format!(
                "persisted value cannot be decoded: {err}"
            )),
            other @ DbError::UnsupportedSchemaVersion { .. } => Self::InvalidState(other.to_string()),
            other => Self::BackendUnavailable(other),
        }
    }
}

impl StoreError {
    /// Stable snake_case code for logs and API envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::InvalidState(_) => "invalid_state",
            Self::NotFound { .. } => "not_found",
            Self::EmptyPool(_) => "empty_pool",
            Self::Timeout => "timeout",
        }
    }
}

fn is_decode_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
    )
}

#[cfg(test)]
mod tests {
    use super::StoreError;
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn deadline_maps_to_timeout() {
        assert!(matches!(
            StoreError::from(DbError::DeadlineExceeded),
            StoreError::Timeout
        ));
    }

    #[test]
    fn closed_backend_maps_to_unavailable() {
        let err = StoreError::from(DbError::Closed);
        assert!(matches!(err, StoreError::BackendUnavailable(DbError::Closed)));
        assert_eq!(err.code(), "backend_unavailable");
    }

    #[test]
    fn constraint_failure_maps_to_invalid_state() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT NOT NULL);").unwrap();
        let err = conn
            .execute("INSERT INTO t (v) VALUES (NULL);", [])
            .unwrap_err();
        assert!(matches!(
            StoreError::from(DbError::from(err)),
            StoreError::InvalidState(_)
        ));
    }

    #[test]
    fn type_mismatch_maps_to_invalid_state() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT 'text';", [], |row| row.get::<_, i64>(0))
            .unwrap_err();
        assert!(matches!(
            StoreError::from(DbError::from(err)),
            StoreError::InvalidState(_)
        ));
    }
}
