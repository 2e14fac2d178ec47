//! Core storage logic for LazyRecord.
//! Lazily created counters and keyed records, plus append-only random pools,
//! over a pooled SQLite backend.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{Backend, BackendMode, BackendOptions, DbError, DbResult, Deadline};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::entity::{Counter, Entity, Greeting, COUNTER_ID};
pub use model::pool::{HelloMessage, PoolRecord};
pub use repo::entity_store::{EntityStore, SqliteEntityStore, StoreOptions};
pub use repo::error::{StoreError, StoreResult};
pub use repo::pool_store::{RandomPoolStore, SqliteRandomPoolStore};
pub use service::counter_service::CounterService;
pub use service::error::{ServiceError, ServiceResult};
pub use service::greeting_service::GreetingService;
pub use service::message_service::MessageService;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
