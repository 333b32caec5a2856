//! The dependency-injected "replay driver": the host `fetch` primitive,
//! abstracted behind a trait so tests can inject a stub instead of
//! monkey-patching a method at runtime.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ReplayError;
use crate::request::RequestRecord;

/// Issues the live network request for one queue entry during replay.
///
/// One `ReplayDriver` is typically shared across every `Queue` in a
/// process: it is the thing that actually owns an HTTP client, and
/// reusing one client across requests keeps connection pooling
/// effective.
#[async_trait]
pub trait ReplayDriver: Send + Sync {
    /// Re-issue `request`. `Ok(())` means the entry is considered
    /// delivered; `Err` triggers the stop-on-failure path in
    /// [`crate::queue::Queue::replay_requests`].
    async fn fetch(&self, request: &RequestRecord) -> Result<(), ReplayError>;
}

#[async_trait]
impl<T: ReplayDriver + ?Sized> ReplayDriver for Arc<T> {
    async fn fetch(&self, request: &RequestRecord) -> Result<(), ReplayError> {
        (**self).fetch(request).await
    }
}
