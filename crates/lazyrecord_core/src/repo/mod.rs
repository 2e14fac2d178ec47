//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `EmptyPool`) in
//!   addition to backend transport errors.
//! - Stores hold no record state between calls and perform no retries.

pub mod entity_store;
pub mod error;
pub mod pool_store;
