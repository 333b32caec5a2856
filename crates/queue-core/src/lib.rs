//! Core types for a durable, per-name FIFO queue of failed outbound HTTP
//! requests, replayed in enqueue order when connectivity (or a
//! background-sync signal) returns.
//!
//! This crate is backend-agnostic: it defines the [`Store`],
//! [`ReplayDriver`], and [`SyncTrigger`] traits that a concrete backend
//! (`queue-store-sqlite`, `queue-http`, `queue-sync`) implements.

pub mod callback;
pub mod error;
pub mod queue;
pub mod registry;
pub mod replay;
pub mod request;
pub mod store;
pub mod sync;

#[cfg(any(test, feature = "test-util"))]
pub mod test_support;

pub use callback::{DefaultSyncCallback, SyncCallback};
pub use error::{QueueError, ReplayError, StoreError, SyncError};
pub use queue::{Entry, Queue, QueueOptions, DEFAULT_MAX_RETENTION};
pub use replay::ReplayDriver;
pub use request::{RequestCache, RequestCredentials, RequestMode, RequestRecord, RequestRedirect};
pub use store::{NewEntry, Store, StoredEntry};
pub use sync::{BroadcastSyncTrigger, NullSyncTrigger, SyncEvent, SyncEventEnvelope, SyncTrigger};
