use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::store::{CoordinationStore, StoreError, StoreEvent};

/// In-process coordination store with watch-on-create semantics.
///
/// Watches are one-shot. Watching a key that already exists fires immediately,
/// so a registration racing the watch is never lost.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    events: mpsc::UnboundedSender<StoreEvent>,
}

#[derive(Default)]
struct MemoryInner {
    data: BTreeMap<String, Vec<u8>>,
    watches: HashSet<String>,
    /// Number of `put` calls per key.
    writes: HashMap<String, usize>,
    unavailable: bool,
}

impl MemoryStore {
    /// New empty store and the receiver its watch notifications arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self {
            inner: Mutex::new(MemoryInner::default()),
            events: tx,
        };
        (store, rx)
    }

    /// Current value of `key`.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().data.get(key).cloned()
    }

    /// How many times `key` has been written.
    pub fn write_count(&self, key: &str) -> usize {
        self.lock().writes.get(key).copied().unwrap_or(0)
    }

    /// Returns `true` if a watch on `key` is pending.
    pub fn is_watched(&self, key: &str) -> bool {
        self.lock().watches.contains(key)
    }

    /// Make every subsequent operation fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, path: &str) {
        trace!(path, "watch fired");
        // Nobody listening is fine: the session may already be torn down.
        let _ = self.events.send(StoreEvent::Created {
            path: path.to_string(),
        });
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let fire = {
            let mut inner = self.lock();
            if inner.unavailable {
                return Err(StoreError::Unavailable("memory store switched off".into()));
            }
            let created = inner.data.insert(key.to_string(), value.to_vec()).is_none();
            *inner.writes.entry(key.to_string()).or_default() += 1;
            created && inner.watches.remove(key)
        };
        if fire {
            self.notify(key);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let inner = self.lock();
        if inner.unavailable {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(inner.data.get(key).cloned())
    }

    async fn watch(&self, key: &str) -> Result<(), StoreError> {
        let exists = {
            let mut inner = self.lock();
            if inner.unavailable {
                return Err(StoreError::Unavailable("memory store switched off".into()));
            }
            let exists = inner.data.contains_key(key);
            if !exists {
                inner.watches.insert(key.to_string());
            }
            exists
        };
        if exists {
            self.notify(key);
        }
        Ok(())
    }
}
