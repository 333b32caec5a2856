//! In-memory test doubles: an in-process [`Store`], a scripted
//! [`ReplayDriver`], shared by this crate's own tests and by downstream
//! crates under the `test-util` feature. Nothing here monkey-patches a
//! method at runtime; every fake is just another trait implementation
//! plugged in through the constructor.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ReplayError, StoreError};
use crate::replay::ReplayDriver;
use crate::request::RequestRecord;
use crate::store::{NewEntry, Store, StoredEntry};

/// A `Store` backed by a `Vec` guarded by a `Mutex`, preserving insertion
/// order the same way the real SQLite-backed store does via its
/// auto-increment primary key.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<InMemoryStoreState>,
}

#[derive(Default)]
struct InMemoryStoreState {
    entries: Vec<StoredEntry>,
    next_id: i64,
    min_id: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry currently stored across every queue, in `id` order.
    /// Useful for assertions about global ordering across queues sharing
    /// one store.
    pub fn snapshot_all(&self) -> Vec<StoredEntry> {
        let state = self.inner.lock().unwrap();
        let mut entries = state.entries.clone();
        entries.sort_by_key(|e| e.id);
        entries
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn add_last(&self, entry: NewEntry) -> Result<StoredEntry, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        let stored = StoredEntry {
            id,
            queue_name: entry.queue_name,
            request: entry.request,
            timestamp_ms: entry.timestamp_ms,
            metadata: entry.metadata,
        };
        state.entries.push(stored.clone());
        Ok(stored)
    }

    async fn add_first(&self, entry: NewEntry) -> Result<StoredEntry, StoreError> {
        let mut state = self.inner.lock().unwrap();
        state.min_id -= 1;
        let id = state.min_id;
        let stored = StoredEntry {
            id,
            queue_name: entry.queue_name,
            request: entry.request,
            timestamp_ms: entry.timestamp_ms,
            metadata: entry.metadata,
        };
        state.entries.push(stored.clone());
        Ok(stored)
    }

    async fn get_first(&self, queue_name: &str) -> Result<Option<StoredEntry>, StoreError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .filter(|e| e.queue_name == queue_name)
            .min_by_key(|e| e.id)
            .cloned())
    }

    async fn get_last(&self, queue_name: &str) -> Result<Option<StoredEntry>, StoreError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .filter(|e| e.queue_name == queue_name)
            .max_by_key(|e| e.id)
            .cloned())
    }

    async fn pop_first(&self, queue_name: &str) -> Result<Option<StoredEntry>, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let Some(id) = state
            .entries
            .iter()
            .filter(|e| e.queue_name == queue_name)
            .min_by_key(|e| e.id)
            .map(|e| e.id)
        else {
            return Ok(None);
        };
        let idx = state.entries.iter().position(|e| e.id == id).unwrap();
        Ok(Some(state.entries.remove(idx)))
    }

    async fn pop_last(&self, queue_name: &str) -> Result<Option<StoredEntry>, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let Some(id) = state
            .entries
            .iter()
            .filter(|e| e.queue_name == queue_name)
            .max_by_key(|e| e.id)
            .map(|e| e.id)
        else {
            return Ok(None);
        };
        let idx = state.entries.iter().position(|e| e.id == id).unwrap();
        Ok(Some(state.entries.remove(idx)))
    }

    async fn get_all(&self, queue_name: &str) -> Result<Vec<StoredEntry>, StoreError> {
        let state = self.inner.lock().unwrap();
        let mut entries: Vec<_> = state
            .entries
            .iter()
            .filter(|e| e.queue_name == queue_name)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        state.entries.retain(|e| e.id != id);
        Ok(())
    }
}

/// A `ReplayDriver` whose verdicts are scripted in advance: the Nth call
/// to `fetch` succeeds or fails according to `script[n]`. Calls beyond
/// the end of the script succeed. Every attempted URL is recorded in
/// order for assertions.
pub struct ScriptedReplayDriver {
    script: Mutex<VecDeque<bool>>,
    attempts: Mutex<Vec<String>>,
}

impl ScriptedReplayDriver {
    /// `script[i]` is `true` if the i-th `fetch` call should succeed.
    pub fn new(script: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn always_succeeds() -> Self {
        Self::new(std::iter::empty())
    }

    pub fn attempted_urls(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplayDriver for ScriptedReplayDriver {
    async fn fetch(&self, request: &RequestRecord) -> Result<(), ReplayError> {
        self.attempts.lock().unwrap().push(request.url.clone());
        let succeeds = self.script.lock().unwrap().pop_front().unwrap_or(true);
        if succeeds {
            Ok(())
        } else {
            Err(ReplayError::Fetch(anyhow::anyhow!(
                "stubbed fetch failure for {}",
                request.url
            )))
        }
    }
}
