//! HTTP surface for LazyRecord.
//!
//! # Responsibility
//! - Map the counter, greeting and message use cases onto JSON/text routes.
//! - Keep blocking store work off the async runtime's worker threads.
//!
//! # Invariants
//! - Handlers hold no state of their own; everything goes through `AppState`.

pub mod app_state;
pub mod config;
pub mod errors;
pub mod handlers;

pub use app_state::AppState;
pub use config::{ConfigError, ServerConfig};
pub use errors::ServerError;
pub use handlers::router;
