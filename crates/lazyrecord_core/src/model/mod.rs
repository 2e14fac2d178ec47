//! Record definitions mapped onto backend tables.
//!
//! # Responsibility
//! - Describe each lazily created entity (table, key, value, default).
//! - Describe each append-only random pool (table, value column).
//!
//! # Invariants
//! - Table and column names are compile-time constants; they are the only
//!   SQL fragments ever interpolated into statements.
//! - Entity defaults are pure functions of the key.

pub mod entity;
pub mod pool;
