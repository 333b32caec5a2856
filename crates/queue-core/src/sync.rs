//! `[SYNC_TRIGGER]`: the host-abstracted "call me back when connectivity
//! returns" facility, and the cold-start fallback for hosts that don't
//! have one.

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot};

use crate::error::{QueueError, SyncError};

/// One fired background-sync event. `ack` stands in for a
/// `waitUntil(promise)`-style keep-alive: a synchronous callback can't
/// keep a host "alive" in Rust, so instead the event carries a channel
/// the dispatcher uses to report when its replay attempt (and thus this
/// event) is done.
pub struct SyncEvent {
    pub tag: String,
    pub ack: oneshot::Sender<Result<(), QueueError>>,
}

/// The host capability consumed by `register_sync` plus the `sync` event
/// stream, modeled as one trait so a `Queue` can ask "does the host even
/// have this?" via `subscribe()` returning `None`.
#[async_trait]
pub trait SyncTrigger: Send + Sync {
    /// Ask the host to call back when connectivity next permits `tag`.
    /// Rejections are expected and are swallowed by the caller
    /// (`Queue::register_sync`), not here.
    async fn register(&self, tag: &str) -> Result<(), SyncError>;

    /// `Some(receiver)` if the host exposes a background-sync facility a
    /// `Queue` can subscribe to; `None` if it doesn't, which forces the
    /// cold-start fallback (eager replay at construction).
    fn subscribe(&self) -> Option<broadcast::Receiver<SyncEventEnvelope>>;
}

/// `broadcast::Receiver` requires `Clone`, but `oneshot::Sender` isn't
/// `Clone`, so the event itself is wrapped in a `Mutex<Option<_>>` the
/// first subscriber to observe a matching tag can take ownership of. Only
/// one queue is ever meant to claim a given event (tags are namespaced
/// per queue), so losing the race just means a later subscriber sees
/// `None` and skips it.
#[derive(Clone)]
pub struct SyncEventEnvelope(std::sync::Arc<std::sync::Mutex<Option<SyncEvent>>>);

impl SyncEventEnvelope {
    pub fn new(event: SyncEvent) -> Self {
        Self(std::sync::Arc::new(std::sync::Mutex::new(Some(event))))
    }

    pub fn tag(&self) -> Option<String> {
        self.0
            .lock()
            .expect("sync event mutex poisoned")
            .as_ref()
            .map(|e| e.tag.clone())
    }

    /// Take the event, if nobody has yet.
    pub fn take(&self) -> Option<SyncEvent> {
        self.0.lock().expect("sync event mutex poisoned").take()
    }
}

/// A host with no background-sync facility at all. `register` is a
/// trivial no-op success; `subscribe` always returns `None`, so every
/// `Queue` built against this trigger falls back to cold-start replay.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSyncTrigger;

#[async_trait]
impl SyncTrigger for NullSyncTrigger {
    async fn register(&self, _tag: &str) -> Result<(), SyncError> {
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<SyncEventEnvelope>> {
        None
    }
}

/// A host that does expose background-sync, backed by a broadcast
/// channel a caller drives from a real connectivity signal (a
/// `NetworkManager` D-Bus listener, a timer, a manual trigger in a test,
/// all external collaborators outside this crate's scope).
pub struct BroadcastSyncTrigger {
    sender: broadcast::Sender<SyncEventEnvelope>,
    reject_register: bool,
}

impl BroadcastSyncTrigger {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            sender,
            reject_register: false,
        }
    }

    /// A variant whose `register` always rejects, for exercising the
    /// swallow-and-continue path `Queue::register_sync` implements.
    pub fn always_rejecting() -> Self {
        let mut trigger = Self::new();
        trigger.reject_register = true;
        trigger
    }

    /// Fire a sync event for `tag`, waiting for the subscriber that
    /// claims it to finish. Returns `Err` if nobody claimed it (no
    /// matching subscriber was listening) or if the claiming subscriber's
    /// replay failed.
    pub async fn fire(&self, tag: &str) -> Result<(), QueueError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let envelope = SyncEventEnvelope::new(SyncEvent {
            tag: tag.to_owned(),
            ack: ack_tx,
        });
        // A send with no receivers is not an error here: it just means no
        // queue is currently listening for this tag, which is the same
        // "nobody home" outcome the host-level API would see.
        let _ = self.sender.send(envelope);
        match ack_rx.await {
            Ok(result) => result,
            Err(_) => Err(QueueError::ReplayFailed(crate::error::ReplayError::Fetch(
                anyhow::anyhow!("no queue claimed sync tag {tag:?}"),
            ))),
        }
    }
}

impl Default for BroadcastSyncTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncTrigger for BroadcastSyncTrigger {
    async fn register(&self, tag: &str) -> Result<(), SyncError> {
        if self.reject_register {
            return Err(SyncError::Rejected(anyhow::anyhow!(
                "registration for tag {tag:?} rejected by host"
            )));
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<SyncEventEnvelope>> {
        Some(self.sender.subscribe())
    }
}
