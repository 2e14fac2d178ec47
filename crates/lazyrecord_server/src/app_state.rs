use lazyrecord_core::{
    Backend, Counter, CounterService, Greeting, GreetingService, HelloMessage, MessageService,
    SqliteEntityStore, SqliteRandomPoolStore, StoreOptions,
};
use std::sync::Arc;
use std::time::Duration;

pub type CounterStore = SqliteEntityStore<Counter>;
pub type GreetingStore = SqliteEntityStore<Greeting>;
pub type MessageStore = SqliteRandomPoolStore<HelloMessage>;

/// Services shared by all handlers. All three sit on one backend pool.
#[derive(Clone)]
pub struct AppState {
    pub counter: Arc<CounterService<CounterStore>>,
    pub greetings: Arc<GreetingService<GreetingStore>>,
    pub messages: Arc<MessageService<MessageStore>>,
}

impl AppState {
    /// Wires the services over `backend`, imposing `timeout` on every store
    /// operation when set.
    ///
    /// The counter store creates the counter on first increment, so a POST
    /// before any GET succeeds.
    pub fn new(backend: Backend, timeout: Option<Duration>) -> Self {
        let counter_store = CounterStore::new(backend.clone()).with_options(StoreOptions {
            timeout,
            auto_create_on_update: true,
        });
        let greeting_store = GreetingStore::new(backend.clone()).with_options(StoreOptions {
            timeout,
            auto_create_on_update: false,
        });
        let mut message_store = MessageStore::new(backend);
        if let Some(timeout) = timeout {
            message_store = message_store.with_timeout(timeout);
        }

        Self {
            counter: Arc::new(CounterService::new(counter_store)),
            greetings: Arc::new(GreetingService::new(greeting_store)),
            messages: Arc::new(MessageService::new(message_store)),
        }
    }
}
