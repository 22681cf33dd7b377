use crate::error::Result;
use crate::model::{FlowId, StepId};
use dashmap::DashMap;

/// Unlimited-capacity binary storage collaborator for large screenshot
/// payloads, keyed by `{flow_id}_{step_id}`.
///
/// The primary key-value store has practical size limits unsuitable for many
/// full-resolution images; anything at or above the inline threshold lands
/// here instead.
pub trait BlobStore: Send + Sync + 'static {
    /// Stores `bytes` under `key`, replacing any previous payload.
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Fetches the payload stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Removes `key`, reporting whether it existed.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Removes every entry whose key starts with `prefix`, returning the
    /// number of entries removed. Used to cascade-delete a flow's blobs.
    fn delete_prefix(&self, prefix: &str) -> Result<usize>;
}

/// Blob key for a step's full-resolution screenshot.
pub fn screenshot_key(flow_id: &FlowId, step_id: &StepId) -> String {
    format!("{}_{}", flow_id.0, step_id.0)
}

/// Key prefix shared by every blob belonging to `flow_id`.
pub fn flow_prefix(flow_id: &FlowId) -> String {
    format!("{}_", flow_id.0)
}

/// In-memory implementation backed by a concurrent hash map.
#[derive(Default)]
pub struct InMemoryBlobStore {
    entries: DashMap<String, Vec<u8>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs, used by cascade-delete tests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.entries.insert(key.to_owned(), bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        let removed = stale.len();
        for key in stale {
            self.entries.remove(&key);
        }
        Ok(removed)
    }
}
