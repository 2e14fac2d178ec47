//! Lazily materialized, uniquely keyed entities.

use rusqlite::types::{FromSql, ToSql};
use std::fmt::Display;

/// A uniquely keyed, mutable record created on first access.
///
/// Implementors bind a Rust key/value pair to one backend table whose key
/// column carries a UNIQUE (or PRIMARY KEY) constraint.
pub trait Entity {
    /// Identifier of one record; unique within [`Entity::TABLE`].
    type Key: ToSql + Display + ?Sized;
    /// Mutable payload.
    type Value: ToSql + FromSql;

    /// Human-readable entity name used in errors and log lines.
    const LABEL: &'static str;
    const TABLE: &'static str;
    const KEY_COLUMN: &'static str;
    const VALUE_COLUMN: &'static str;

    /// Value stored when the record for `key` is first created.
    fn default_value(key: &Self::Key) -> Self::Value;
}

/// Fixed id of the single counter row.
pub const COUNTER_ID: i64 = 1;

/// Integer counter stored as a singleton row in `counters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {}

impl Entity for Counter {
    type Key = i64;
    type Value = i64;

    const LABEL: &'static str = "counter";
    const TABLE: &'static str = "counters";
    const KEY_COLUMN: &'static str = "id";
    const VALUE_COLUMN: &'static str = "count";

    fn default_value(_key: &i64) -> i64 {
        0
    }
}

/// Greeting text keyed by a person's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greeting {}

impl Entity for Greeting {
    type Key = str;
    type Value = String;

    const LABEL: &'static str = "greeting";
    const TABLE: &'static str = "greetings";
    const KEY_COLUMN: &'static str = "name";
    const VALUE_COLUMN: &'static str = "greeting";

    fn default_value(name: &str) -> String {
        format!("Hello, {name}!")
    }
}

#[cfg(test)]
mod tests {
    use super::{Counter, Entity, Greeting, COUNTER_ID};

    #[test]
    fn counter_defaults_to_zero() {
        assert_eq!(Counter::default_value(&COUNTER_ID), 0);
    }

    #[test]
    fn greeting_default_is_templated_over_the_name() {
        assert_eq!(Greeting::default_value("Alice"), "Hello, Alice!");
        assert_eq!(Greeting::default_value(""), "Hello, !");
    }
}
