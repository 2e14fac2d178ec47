//! Random message pool use-case service.

use crate::model::pool::HelloMessage;
use crate::repo::pool_store::RandomPoolStore;
use crate::service::error::ServiceResult;

/// Use-case wrapper over the `hello` message pool.
pub struct MessageService<S: RandomPoolStore<HelloMessage>> {
    store: S,
}

impl<S: RandomPoolStore<HelloMessage>> MessageService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns one message chosen uniformly at random.
    pub fn random(&self) -> ServiceResult<String> {
        Ok(self.store.sample_one()?)
    }

    /// Appends `message` to the pool. Empty messages are rejected by the
    /// backend's non-empty constraint (`InvalidState`).
    pub fn post(&self, message: &str) -> ServiceResult<()> {
        self.store.insert(message)?;
        Ok(())
    }

    pub fn size(&self) -> ServiceResult<u64> {
        Ok(self.store.count()?)
    }
}
