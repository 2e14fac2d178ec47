//! Append-only random pool store and its SQLite implementation.
//!
//! # Responsibility
//! - Append immutable text records.
//! - Serve one record chosen uniformly at random per read.
//!
//! # Invariants
//! - Reads never create rows.
//! - Selection is delegated to `ORDER BY RANDOM() LIMIT 1`; the table is
//!   never loaded into memory and nothing about past samples is remembered.

use crate::db::Backend;
use crate::model::pool::PoolRecord;
use crate::repo::entity_store::StoreOptions;
use crate::repo::error::{StoreError, StoreResult};
use log::{debug, info, warn};
use rusqlite::{params, OptionalExtension};
use std::marker::PhantomData;
use std::time::Duration;

/// Repository interface for append-only pools sampled at random.
pub trait RandomPoolStore<P: PoolRecord> {
    /// Appends one record. No uniqueness is enforced.
    fn insert(&self, value: &str) -> StoreResult<()>;

    /// Returns one record chosen uniformly among all current records.
    ///
    /// # Errors
    /// - `EmptyPool` when the pool has no records.
    fn sample_one(&self) -> StoreResult<String>;

    /// Returns the number of records currently in the pool.
    fn count(&self) -> StoreResult<u64>;
}

/// SQLite-backed pool store over one table described by `P`.
pub struct SqliteRandomPoolStore<P: PoolRecord> {
    backend: Backend,
    options: StoreOptions,
    _record: PhantomData<fn() -> P>,
}

impl<P: PoolRecord> Clone for SqliteRandomPoolStore<P> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            options: self.options,
            _record: PhantomData,
        }
    }
}

impl<P: PoolRecord> SqliteRandomPoolStore<P> {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            options: StoreOptions::default(),
            _record: PhantomData,
        }
    }

    /// Imposes `timeout` on every subsequent operation of this handle.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }
}

impl<P: PoolRecord> RandomPoolStore<P> for SqliteRandomPoolStore<P> {
    fn insert(&self, value: &str) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {table} ({value_col}) VALUES (?1);",
            table = P::TABLE,
            value_col = P::VALUE_COLUMN,
        );
        self.backend
            .with_connection(self.options.deadline(), |conn| {
                conn.prepare_cached(&sql)?.execute(params![value])
            })
            .map_err(|err| log_failure::<P>("insert", err.into()))?;

        info!(
            "event=pool_insert module=repo pool={} status=ok",
            P::LABEL
        );
        Ok(())
    }

    fn sample_one(&self) -> StoreResult<String> {
        let sql = format!(
            "SELECT {value_col} FROM {table} ORDER BY RANDOM() LIMIT 1;",
            table = P::TABLE,
            value_col = P::VALUE_COLUMN,
        );
        let sampled = self
            .backend
            .with_connection(self.options.deadline(), |conn| {
                conn.prepare_cached(&sql)?
                    .query_row([], |row| row.get::<_, String>(0))
                    .optional()
            })
            .map_err(|err| log_failure::<P>("sample", err.into()))?;

        match sampled {
            Some(value) => {
                debug!("event=pool_sample module=repo pool={} status=ok", P::LABEL);
                Ok(value)
            }
            None => {
                debug!(
                    "event=pool_sample module=repo pool={} status=empty",
                    P::LABEL
                );
                Err(StoreError::EmptyPool(P::LABEL))
            }
        }
    }

    fn count(&self) -> StoreResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {table};", table = P::TABLE);
        let count = self
            .backend
            .with_connection(self.options.deadline(), |conn| {
                conn.prepare_cached(&sql)?
                    .query_row([], |row| row.get::<_, i64>(0))
            })
            .map_err(|err| log_failure::<P>("count", err.into()))?;
        u64::try_from(count)
            .map_err(|_| StoreError::InvalidState(format!("negative row count {count}")))
    }
}

fn log_failure<P: PoolRecord>(operation: &str, err: StoreError) -> StoreError {
    warn!(
        "event=pool_{} module=repo pool={} status=error error_code={}",
        operation,
        P::LABEL,
        err.code()
    );
    err
}
