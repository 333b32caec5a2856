//! The `onSync` callback: what a `Queue` invokes when its sync trigger
//! fires (or, absent one, once eagerly at construction). Kept distinct
//! from [`crate::replay::ReplayDriver`] (the `fetch` primitive) because a
//! caller may want to override `onSync` with logic that isn't simply
//! "drain this queue", though the default just is.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::QueueError;
use crate::queue::Queue;

#[async_trait]
pub trait SyncCallback: Send + Sync {
    async fn call(&self, queue: &Arc<Queue>) -> Result<(), QueueError>;
}

/// The default `onSync`: replay the queue it was registered for.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSyncCallback;

#[async_trait]
impl SyncCallback for DefaultSyncCallback {
    async fn call(&self, queue: &Arc<Queue>) -> Result<(), QueueError> {
        queue.replay_requests().await
    }
}
