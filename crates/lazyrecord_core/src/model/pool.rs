//! Append-only record pools sampled uniformly at random.

/// An immutable, unkeyed text record contributing to a random sample space.
pub trait PoolRecord {
    /// Human-readable pool name used in errors and log lines.
    const LABEL: &'static str;
    const TABLE: &'static str;
    const VALUE_COLUMN: &'static str;
}

/// Free-form hello message in the `hello` pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloMessage {}

impl PoolRecord for HelloMessage {
    const LABEL: &'static str = "hello";
    const TABLE: &'static str = "hello";
    const VALUE_COLUMN: &'static str = "message";
}
