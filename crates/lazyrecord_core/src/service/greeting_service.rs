//! Greeting use-case service.

use crate::model::entity::Greeting;
use crate::repo::entity_store::EntityStore;
use crate::service::error::{ServiceError, ServiceResult};

/// Use-case wrapper for name-keyed greetings.
pub struct GreetingService<S: EntityStore<Greeting>> {
    store: S,
}

impl<S: EntityStore<Greeting>> GreetingService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the greeting for `name`, creating `"Hello, {name}!"` on first
    /// request. A stored greeting is returned verbatim, never regenerated.
    ///
    /// The name is used exactly as given, whitespace included; only the
    /// empty name is rejected.
    pub fn greet(&self, name: &str) -> ServiceResult<String> {
        if name.is_empty() {
            return Err(ServiceError::InvalidInput(
                "name must not be empty".to_string(),
            ));
        }
        Ok(self.store.upsert(name)?)
    }
}
