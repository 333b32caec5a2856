//! The `[STORE]` abstraction: a durable, indexed FIFO of [`StoredEntry`]
//! records, generalized the way `spin-key-value`'s `Store` trait
//! generalizes over Redis/SQLite/Azure backends.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::request::RequestRecord;

/// A not-yet-persisted entry, as passed to `add_first`/`add_last`.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub queue_name: String,
    pub request: RequestRecord,
    pub timestamp_ms: i64,
    pub metadata: Option<Value>,
}

/// A persisted entry, as returned by any read or pop operation.
///
/// `id` defines the total order within the store (see `[DATA MODEL]`):
/// strictly increasing for `add_last`, and may go negative for
/// `add_first` ("subtract from the current minimum", see DESIGN.md for
/// the tradeoffs this carries).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub id: i64,
    pub queue_name: String,
    pub request: RequestRecord,
    pub timestamp_ms: i64,
    pub metadata: Option<Value>,
}

/// Durable, indexed persistence for queue entries.
///
/// Every method runs in its own short transaction; there is no long-held
/// lock across calls. `pop_first`/`pop_last` must atomically
/// read-and-delete: a caller observing `Some(entry)` from either is
/// guaranteed that no other caller will also observe that same `id`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert at the tail. The assigned `id` is strictly greater than any
    /// prior `id` in the store.
    async fn add_last(&self, entry: NewEntry) -> Result<StoredEntry, StoreError>;

    /// Insert at the head. The assigned `id` precedes every existing `id`
    /// for entries already in the store.
    async fn add_first(&self, entry: NewEntry) -> Result<StoredEntry, StoreError>;

    /// The entry with the smallest `id` for `queue_name`, if any.
    async fn get_first(&self, queue_name: &str) -> Result<Option<StoredEntry>, StoreError>;

    /// The entry with the largest `id` for `queue_name`, if any.
    async fn get_last(&self, queue_name: &str) -> Result<Option<StoredEntry>, StoreError>;

    /// Atomically read and remove the entry with the smallest `id`.
    async fn pop_first(&self, queue_name: &str) -> Result<Option<StoredEntry>, StoreError>;

    /// Atomically read and remove the entry with the largest `id`.
    async fn pop_last(&self, queue_name: &str) -> Result<Option<StoredEntry>, StoreError>;

    /// All entries for `queue_name`, ordered by `id` ascending.
    async fn get_all(&self, queue_name: &str) -> Result<Vec<StoredEntry>, StoreError>;

    /// Remove a specific entry by id, regardless of queue.
    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError>;
}
