//! Error types for the queue name registry, the store, and replay.
//!
//! Kept as layered enums (never bare `String`s) so a caller can match on
//! the kind rather than grep the message.

/// Errors surfaced by [`crate::queue::Queue`] operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// A queue with this name is already registered in this process.
    #[error("queue name {0:?} is already registered")]
    DuplicateQueueName(String),

    /// `push`/`unshift` was called with no entry at all.
    #[error("entry is required")]
    EntryRequired,

    /// `replay_requests` stopped because a `fetch` failed.
    #[error("replay failed")]
    ReplayFailed(#[source] ReplayError),

    /// The underlying store reported a failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced by a [`crate::store::Store`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backing store error: {0}")]
    Backend(#[source] anyhow::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors surfaced by a [`crate::replay::ReplayDriver`].
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("fetch error: {0}")]
    Fetch(#[source] anyhow::Error),
}

/// Errors surfaced by a [`crate::sync::SyncTrigger`] `register` call.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sync registration rejected: {0}")]
    Rejected(#[source] anyhow::Error),
}

/// Log-and-discard a [`SyncError`]: `register_sync` failures are
/// expected and non-fatal.
pub fn log_sync_error(err: SyncError) {
    tracing::warn!("background-sync registration failed, will retry on next push: {err}");
}
