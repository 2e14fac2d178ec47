//! Counter use-case service.
//!
//! # Invariants
//! - Increments must be strictly positive; the store itself is sign-agnostic,
//!   so the rule lives here.
//! - The counter is always the singleton row `COUNTER_ID`.

use crate::model::entity::{Counter, COUNTER_ID};
use crate::repo::entity_store::EntityStore;
use crate::service::error::{ServiceError, ServiceResult};

/// Use-case wrapper around the singleton counter.
pub struct CounterService<S: EntityStore<Counter>> {
    store: S,
}

impl<S: EntityStore<Counter>> CounterService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the current count, creating the counter at `0` on first use.
    pub fn current(&self) -> ServiceResult<i64> {
        Ok(self.store.get_or_default(&COUNTER_ID)?)
    }

    /// Adds `amount` to the counter.
    ///
    /// # Errors
    /// - `InvalidInput` when `amount <= 0`.
    /// - `Store(NotFound)` when the counter was never created and the store
    ///   does not auto-create on update.
    pub fn increment(&self, amount: i64) -> ServiceResult<()> {
        if amount <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "count must be a positive integer, got {amount}"
            )));
        }
        self.store.apply_delta(&COUNTER_ID, amount)?;
        Ok(())
    }
}
