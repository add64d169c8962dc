//! Subscription Registries
//!
//! Two indexes over the same set of live records:
//!
//! - [`SubscriptionIndex`]: subscription name → records, in insertion order,
//!   keyed by [`RecordHandle`]
//! - [`ConnectionRegistry`]: connection key → operation id → record
//!
//! Neither structure knows about the other. Keeping them in step is the
//! manager's job.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::record::{RecordHandle, SubscriptionRecord};
use crate::connection::ConnectionKey;
use crate::protocol::OperationId;

/// Records ordered by handle, which is also insertion order
type NameBucket = BTreeMap<RecordHandle, Arc<SubscriptionRecord>>;

/// Per-name index of live subscriptions
#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    by_name: HashMap<String, NameBucket>,
    next_handle: u64,
}

impl SubscriptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the handle for the next record
    pub fn next_handle(&mut self) -> RecordHandle {
        let handle = RecordHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Add a record under its name
    pub fn insert(&mut self, record: Arc<SubscriptionRecord>) {
        self.by_name
            .entry(record.name().to_string())
            .or_default()
            .insert(record.handle, record);
    }

    /// Remove the record at `handle` under `name`.
    ///
    /// Empty buckets are dropped.
    pub fn remove(&mut self, name: &str, handle: RecordHandle) -> Option<Arc<SubscriptionRecord>> {
        let bucket = self.by_name.get_mut(name)?;
        let removed = bucket.remove(&handle);
        if bucket.is_empty() {
            self.by_name.remove(name);
        }
        removed
    }

    /// Snapshot of the records listening on `name`, in insertion order
    pub fn get(&self, name: &str) -> Vec<Arc<SubscriptionRecord>> {
        self.by_name
            .get(name)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live records for `name`
    pub fn count(&self, name: &str) -> usize {
        self.by_name.get(name).map(|b| b.len()).unwrap_or(0)
    }

    /// Whether the record at `handle` is live under `name`
    pub fn contains(&self, name: &str, handle: RecordHandle) -> bool {
        self.by_name
            .get(name)
            .map(|b| b.contains_key(&handle))
            .unwrap_or(false)
    }

    /// Names with at least one live record
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Total number of live records
    pub fn len(&self) -> usize {
        self.by_name.values().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Per-connection storage of live subscriptions
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: HashMap<ConnectionKey, HashMap<OperationId, Arc<SubscriptionRecord>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `key` with an empty one, returning the old records
    pub fn reset(&mut self, key: &str) -> Vec<Arc<SubscriptionRecord>> {
        self.entries
            .insert(key.to_string(), HashMap::new())
            .map(|old| old.into_values().collect())
            .unwrap_or_default()
    }

    /// Store a record under its connection and id.
    ///
    /// Returns the record previously stored under the same id, if any.
    pub fn insert(&mut self, record: Arc<SubscriptionRecord>) -> Option<Arc<SubscriptionRecord>> {
        self.entries
            .entry(record.connection_key().to_string())
            .or_default()
            .insert(record.id().to_string(), record)
    }

    /// Look up one record
    pub fn get(&self, key: &str, id: &str) -> Option<&Arc<SubscriptionRecord>> {
        self.entries.get(key).and_then(|entry| entry.get(id))
    }

    /// Remove one record. The connection's entry stays, even when empty.
    pub fn remove(&mut self, key: &str, id: &str) -> Option<Arc<SubscriptionRecord>> {
        self.entries.get_mut(key).and_then(|entry| entry.remove(id))
    }

    /// Discard a connection's entry, returning its records
    pub fn take(&mut self, key: &str) -> Option<Vec<Arc<SubscriptionRecord>>> {
        self.entries
            .remove(key)
            .map(|entry| entry.into_values().collect())
    }

    /// Operation ids live on a connection
    pub fn entry(&self, key: &str) -> Option<&HashMap<OperationId, Arc<SubscriptionRecord>>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of known connections
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
