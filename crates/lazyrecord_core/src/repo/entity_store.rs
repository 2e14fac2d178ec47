//! Get-or-create entity store and its SQLite implementation.
//!
//! # Responsibility
//! - Locate a record by key, creating it with its default exactly once.
//! - Apply integer deltas as single server-side statements.
//!
//! # Invariants
//! - At most one record exists per key; the table's UNIQUE/PRIMARY KEY
//!   constraint is the arbiter, not an in-process lock.
//! - An insert that loses a create-race is resolved by re-reading the
//!   winner's row; callers never see the conflict.
//! - Existing values are never overwritten by read-or-create operations.
//! - Deltas are applied as `value = value + ?`; there is no read-modify-write.
//! - Nothing is cached between calls; every operation round-trips.

use crate::db::{is_unique_violation, Backend, Deadline};
use crate::model::entity::Entity;
use crate::repo::error::{StoreError, StoreResult};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::marker::PhantomData;
use std::time::Duration;

/// Behavior switches shared by store implementations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Per-operation deadline, measured from the start of each call.
    pub timeout: Option<Duration>,
    /// Create a missing record (with its default) before applying a delta,
    /// instead of failing with `NotFound`.
    pub auto_create_on_update: bool,
}

impl StoreOptions {
    pub(crate) fn deadline(&self) -> Deadline {
        Deadline::from_timeout(self.timeout)
    }
}

/// Repository interface for lazily created, uniquely keyed entities.
pub trait EntityStore<E: Entity> {
    /// Returns the stored value, or `None` without creating anything.
    fn get(&self, key: &E::Key) -> StoreResult<Option<E::Value>>;

    /// Returns the stored value, creating the record with
    /// [`Entity::default_value`] first when it is absent.
    fn get_or_default(&self, key: &E::Key) -> StoreResult<E::Value>;

    /// Read-or-create for keyed text entities. Equivalent to
    /// [`EntityStore::get_or_default`]; never overwrites an existing value.
    fn upsert(&self, key: &E::Key) -> StoreResult<E::Value> {
        self.get_or_default(key)
    }

    /// Read-or-create with a caller-supplied initial value. An existing
    /// value is returned unchanged and `value` is discarded.
    fn upsert_with(&self, key: &E::Key, value: E::Value) -> StoreResult<E::Value>;

    /// Atomically adds `delta` to the stored integer.
    ///
    /// Sign-agnostic: validating the delta is the caller's job.
    ///
    /// # Errors
    /// - `NotFound` when the record is absent and auto-create is disabled.
    /// - `InvalidState` when the sum overflows the 64-bit range.
    fn apply_delta(&self, key: &E::Key, delta: i64) -> StoreResult<()>
    where
        E: Entity<Value = i64>;
}

/// SQLite-backed entity store over one table described by `E`.
pub struct SqliteEntityStore<E: Entity> {
    backend: Backend,
    options: StoreOptions,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for SqliteEntityStore<E> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            options: self.options,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> SqliteEntityStore<E> {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            options: StoreOptions::default(),
            _entity: PhantomData,
        }
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Imposes `timeout` on every subsequent operation of this handle.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn with_auto_create_on_update(mut self, enabled: bool) -> Self {
        self.options.auto_create_on_update = enabled;
        self
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    fn read_or_create(&self, key: &E::Key, initial: E::Value) -> StoreResult<E::Value> {
        let resolution = self
            .backend
            .with_connection(self.options.deadline(), |conn| {
                read_or_create::<E>(conn, key, initial)
            })
            .map_err(|err| log_failure::<E>("read_or_create", err.into()))?;

        match resolution {
            Resolution::Found(value) => {
                debug!(
                    "event=entity_lookup module=repo entity={} status=hit",
                    E::LABEL
                );
                Ok(value)
            }
            Resolution::Created(value) => {
                info!(
                    "event=entity_create module=repo entity={} status=ok",
                    E::LABEL
                );
                Ok(value)
            }
            Resolution::Raced(value) => {
                info!(
                    "event=entity_create module=repo entity={} status=race_absorbed",
                    E::LABEL
                );
                Ok(value)
            }
            Resolution::Vanished => Err(log_failure::<E>(
                "read_or_create",
                StoreError::InvalidState(format!(
                    "{} row reported as conflicting but not readable",
                    E::LABEL
                )),
            )),
        }
    }
}

impl<E: Entity> EntityStore<E> for SqliteEntityStore<E> {
    fn get(&self, key: &E::Key) -> StoreResult<Option<E::Value>> {
        self.backend
            .with_connection(self.options.deadline(), |conn| {
                select_value::<E>(conn, key)
            })
            .map_err(|err| log_failure::<E>("get", err.into()))
    }

    fn get_or_default(&self, key: &E::Key) -> StoreResult<E::Value> {
        self.read_or_create(key, E::default_value(key))
    }

    fn upsert_with(&self, key: &E::Key, value: E::Value) -> StoreResult<E::Value> {
        self.read_or_create(key, value)
    }

    fn apply_delta(&self, key: &E::Key, delta: i64) -> StoreResult<()>
    where
        E: Entity<Value = i64>,
    {
        let auto_create = self.options.auto_create_on_update;
        let seed = if auto_create {
            let default = E::default_value(key);
            Some(default.checked_add(delta).ok_or_else(|| {
                StoreError::InvalidState(format!(
                    "{} default {default} plus delta {delta} overflows",
                    E::LABEL
                ))
            })?)
        } else {
            None
        };

        let changed = self
            .backend
            .with_connection(self.options.deadline(), |conn| match seed {
                Some(seed) => upsert_delta::<E>(conn, key, seed, delta),
                None => update_delta::<E>(conn, key, delta),
            })
            .map_err(|err| log_failure::<E>("apply_delta", err.into()))?;

        if changed == 0 {
            debug!(
                "event=entity_delta module=repo entity={} status=not_found",
                E::LABEL
            );
            return Err(StoreError::NotFound {
                entity: E::LABEL,
                key: key.to_string(),
            });
        }

        debug!(
            "event=entity_delta module=repo entity={} status=ok",
            E::LABEL
        );
        Ok(())
    }
}

/// How a read-or-create call was satisfied.
enum Resolution<V> {
    Found(V),
    Created(V),
    /// Another caller created the row between our miss and our insert.
    Raced(V),
    /// Insert conflicted but the row could not be read back.
    Vanished,
}

/// Tagged result of one insert attempt.
enum InsertOutcome {
    Created,
    Conflict,
}

fn read_or_create<E: Entity>(
    conn: &Connection,
    key: &E::Key,
    initial: E::Value,
) -> rusqlite::Result<Resolution<E::Value>> {
    if let Some(value) = select_value::<E>(conn, key)? {
        return Ok(Resolution::Found(value));
    }

    match try_insert::<E>(conn, key, &initial)? {
        InsertOutcome::Created => Ok(Resolution::Created(initial)),
        InsertOutcome::Conflict => Ok(select_value::<E>(conn, key)?
            .map(Resolution::Raced)
            .unwrap_or(Resolution::Vanished)),
    }
}

fn select_value<E: Entity>(conn: &Connection, key: &E::Key) -> rusqlite::Result<Option<E::Value>> {
    let sql = format!(
        "SELECT {value} FROM {table} WHERE {key_col} = ?1;",
        value = E::VALUE_COLUMN,
        table = E::TABLE,
        key_col = E::KEY_COLUMN,
    );
    conn.prepare_cached(&sql)?
        .query_row(params![key], |row| row.get(0))
        .optional()
}

fn try_insert<E: Entity>(
    conn: &Connection,
    key: &E::Key,
    value: &E::Value,
) -> rusqlite::Result<InsertOutcome> {
    let sql = format!(
        "INSERT INTO {table} ({key_col}, {value_col}) VALUES (?1, ?2);",
        table = E::TABLE,
        key_col = E::KEY_COLUMN,
        value_col = E::VALUE_COLUMN,
    );
    match conn.prepare_cached(&sql)?.execute(params![key, value]) {
        Ok(_) => Ok(InsertOutcome::Created),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
        Err(err) => Err(err),
    }
}

/// Returns the number of rows changed (0 or 1).
fn update_delta<E: Entity<Value = i64>>(
    conn: &Connection,
    key: &E::Key,
    delta: i64,
) -> rusqlite::Result<usize> {
    let sql = format!(
        "UPDATE {table} SET {value_col} = {value_col} + ?1 WHERE {key_col} = ?2;",
        table = E::TABLE,
        key_col = E::KEY_COLUMN,
        value_col = E::VALUE_COLUMN,
    );
    conn.prepare_cached(&sql)?.execute(params![delta, key])
}

/// Creates the row at `seed` (= default + delta) or adds `delta` to the
/// existing row, in one statement.
fn upsert_delta<E: Entity<Value = i64>>(
    conn: &Connection,
    key: &E::Key,
    seed: i64,
    delta: i64,
) -> rusqlite::Result<usize> {
    let sql = format!(
        "INSERT INTO {table} ({key_col}, {value_col}) VALUES (?1, ?2)
         ON CONFLICT ({key_col}) DO UPDATE SET {value_col} = {value_col} + ?3;",
        table = E::TABLE,
        key_col = E::KEY_COLUMN,
        value_col = E::VALUE_COLUMN,
    );
    conn.prepare_cached(&sql)?.execute(params![key, seed, delta])
}

fn log_failure<E: Entity>(operation: &str, err: StoreError) -> StoreError {
    warn!(
        "event=entity_{} module=repo entity={} status=error error_code={}",
        operation,
        E::LABEL,
        err.code()
    );
    err
}
