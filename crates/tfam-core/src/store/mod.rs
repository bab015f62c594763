//! Coordination-store boundary.
//!
//! The store is a hierarchical key/value service with watch-on-create
//! notifications. Tasks publish their endpoints there, the session publishes
//! the final cluster spec there, and standbys receive their inherited data
//! partition through it. Raw notifications are decoded into typed events here,
//! so the session core never parses paths.

use async_trait::async_trait;

mod error;
pub use error::StoreError;

mod layout;
pub use layout::StoreLayout;

mod event;
pub use event::{StoreEvent, decode_endpoint};

mod memory;
pub use memory::MemoryStore;

/// Client of the coordination store.
///
/// Watch notifications are not returned by [`CoordinationStore::watch`]; the
/// implementation delivers them as [`StoreEvent`]s on a channel handed to the
/// session's dispatch loop.
#[async_trait]
pub trait CoordinationStore: Send + Sync + 'static {
    /// Create `key` or overwrite its value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Read `key`, `None` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Register a one-shot watch that fires when `key` is created.
    async fn watch(&self, key: &str) -> Result<(), StoreError>;
}
