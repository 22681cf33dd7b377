use crate::error::Result;
use dashmap::DashMap;

/// Key-value storage collaborator consumed by the session manager and flow
/// store.
///
/// The backing engine is external and opaque; the core only relies on per-key
/// atomic get/set/delete. There are no cross-key transactions: multi-key
/// operations must tolerate a later key failing after an earlier one
/// succeeded.
pub trait KvStore: Send + Sync + 'static {
    /// Fetches the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Replaces the value stored under `key`.
    fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Removes `key`, reporting whether it existed.
    fn delete(&self, key: &str) -> Result<bool>;
}

/// In-memory implementation backed by a concurrent hash map.
#[derive(Default)]
pub struct InMemoryKvStore {
    entries: DashMap<String, serde_json::Value>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}
