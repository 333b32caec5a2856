//! `[QUEUE]`: the public façade over a name, a [`Store`], a
//! [`ReplayDriver`], a [`SyncTrigger`], and a retention policy.

use std::sync::Arc;
use std::time::Duration;

use queue_common::time::{Clock, SystemClock};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{instrument, Level};

use crate::callback::{DefaultSyncCallback, SyncCallback};
use crate::error::{log_sync_error, QueueError};
use crate::registry;
use crate::replay::ReplayDriver;
use crate::request::RequestRecord;
use crate::store::{NewEntry, Store};
use crate::sync::SyncTrigger;

/// Default retention: 7 days.
pub const DEFAULT_MAX_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const SYNC_TAG_PREFIX: &str = "workbox-background-sync";

/// An entry as supplied by a caller to `push_request`/`unshift_request`.
pub struct Entry {
    pub request: RequestRecord,
    pub timestamp_ms: Option<i64>,
    pub metadata: Option<Value>,
}

impl Entry {
    pub fn new(request: RequestRecord) -> Self {
        Self {
            request,
            timestamp_ms: None,
            metadata: None,
        }
    }
}

/// Construction-time options for a [`Queue`].
#[derive(Default)]
pub struct QueueOptions {
    /// Invoked when the sync trigger fires, or once eagerly at
    /// construction if the host has no sync trigger. Defaults to the
    /// queue replaying itself.
    pub on_sync: Option<Arc<dyn SyncCallback>>,
    /// Maximum entry age, in minutes, before it is discarded unread.
    /// Defaults to 7 days.
    pub max_retention_minutes: Option<u64>,
    /// Clock used for retention checks. Defaults to the system clock;
    /// tests substitute a `ManualClock`.
    pub clock: Option<Arc<dyn Clock>>,
}

/// A durable, named, FIFO queue of failed requests.
pub struct Queue {
    name: String,
    tag: String,
    store: Arc<dyn Store>,
    replay_driver: Arc<dyn ReplayDriver>,
    sync_trigger: Arc<dyn SyncTrigger>,
    max_retention: Duration,
    clock: Arc<dyn Clock>,
    /// Serializes `replay_requests` against itself: a replay driver is
    /// not re-entrant-safe against concurrent calls for the same queue.
    replay_lock: AsyncMutex<()>,
}

impl Queue {
    /// Register `name`, wire up the sync trigger (or run the cold-start
    /// fallback replay), and return the queue wrapped in an `Arc`. The
    /// sync-event listener task needs to hold a handle back to the queue
    /// it dispatches into, so the queue must already be shared before
    /// that task is spawned.
    pub async fn new(
        name: impl Into<String>,
        store: Arc<dyn Store>,
        replay_driver: Arc<dyn ReplayDriver>,
        sync_trigger: Arc<dyn SyncTrigger>,
        options: QueueOptions,
    ) -> Result<Arc<Self>, QueueError> {
        let name = name.into();
        registry::register(&name)?;
        let tag = format!("{SYNC_TAG_PREFIX}:{name}");
        let max_retention = options
            .max_retention_minutes
            .map(|m| Duration::from_secs(m * 60))
            .unwrap_or(DEFAULT_MAX_RETENTION);
        let clock = options.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let on_sync = options
            .on_sync
            .unwrap_or_else(|| Arc::new(DefaultSyncCallback));

        let queue = Arc::new(Self {
            name,
            tag,
            store,
            replay_driver,
            sync_trigger,
            max_retention,
            clock,
            replay_lock: AsyncMutex::new(()),
        });

        match queue.sync_trigger.subscribe() {
            Some(mut receiver) => {
                let queue_for_task = queue.clone();
                let tag_for_task = queue_for_task.tag.clone();
                tokio::spawn(async move {
                    loop {
                        let envelope = match receiver.recv().await {
                            Ok(envelope) => envelope,
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        };
                        if envelope.tag().as_deref() != Some(tag_for_task.as_str()) {
                            continue;
                        }
                        let Some(event) = envelope.take() else {
                            // Another queue's listener (or another task on
                            // this same queue, in principle) already
                            // claimed this event.
                            continue;
                        };
                        let result = on_sync.call(&queue_for_task).await;
                        let _ = event.ack.send(result);
                    }
                });
            }
            None => {
                // Cold-start fallback: the only replay opportunity on a
                // host without background-sync is process start.
                if let Err(err) = on_sync.call(&queue).await {
                    tracing::warn!(
                        queue = %queue.name,
                        error = %err,
                        "cold-start replay failed; entries remain queued for the next attempt"
                    );
                }
            }
        }

        Ok(queue)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Append to the tail, then request a background-sync callback.
    #[instrument(name = "queue.push_request", skip(self, entry), fields(queue = %self.name))]
    pub async fn push_request(&self, entry: Entry) -> Result<(), QueueError> {
        self.store.add_last(self.new_entry(entry)).await?;
        self.register_sync().await;
        Ok(())
    }

    /// Prepend to the head, then request a background-sync callback.
    #[instrument(name = "queue.unshift_request", skip(self, entry), fields(queue = %self.name))]
    pub async fn unshift_request(&self, entry: Entry) -> Result<(), QueueError> {
        self.store.add_first(self.new_entry(entry)).await?;
        self.register_sync().await;
        Ok(())
    }

    /// Return and remove the head entry, pruning it instead if expired.
    pub async fn shift_request(&self) -> Result<Option<RequestRecord>, QueueError> {
        loop {
            let Some(entry) = self.store.pop_first(&self.name).await? else {
                return Ok(None);
            };
            if self.is_expired(entry.timestamp_ms) {
                tracing::debug!(queue = %self.name, id = entry.id, "discarding expired entry on read");
                continue;
            }
            return Ok(Some(entry.request));
        }
    }

    /// Return and remove the tail entry, pruning it instead if expired.
    pub async fn pop_request(&self) -> Result<Option<RequestRecord>, QueueError> {
        loop {
            let Some(entry) = self.store.pop_last(&self.name).await? else {
                return Ok(None);
            };
            if self.is_expired(entry.timestamp_ms) {
                tracing::debug!(queue = %self.name, id = entry.id, "discarding expired entry on read");
                continue;
            }
            return Ok(Some(entry.request));
        }
    }

    fn is_expired(&self, timestamp_ms: i64) -> bool {
        let age_ms = self.clock.now_ms().saturating_sub(timestamp_ms);
        age_ms > self.max_retention.as_millis() as i64
    }

    /// Drain the queue head-to-tail, re-issuing each request. Stops (and
    /// re-enqueues the failing entry at the head) on the first `fetch`
    /// failure, preserving the remaining entries' order for the next
    /// attempt.
    #[instrument(name = "queue.replay_requests", skip(self), fields(queue = %self.name), err(level = Level::INFO))]
    pub async fn replay_requests(&self) -> Result<(), QueueError> {
        let _guard = self.replay_lock.lock().await;
        let _sloth = queue_common::sloth::warn_if_slothful(
            5_000,
            format!("replay_requests for queue {:?} is taking a long time", self.name),
        );

        loop {
            let Some(entry) = self.store.pop_first(&self.name).await? else {
                return Ok(());
            };

            if self.is_expired(entry.timestamp_ms) {
                tracing::debug!(queue = %self.name, id = entry.id, "discarding expired entry during replay");
                continue;
            }

            match self.replay_driver.fetch(&entry.request).await {
                Ok(()) => continue,
                Err(err) => {
                    self.store
                        .add_first(NewEntry {
                            queue_name: self.name.clone(),
                            request: entry.request,
                            timestamp_ms: entry.timestamp_ms,
                            metadata: entry.metadata,
                        })
                        .await?;
                    return Err(QueueError::ReplayFailed(err));
                }
            }
        }
    }

    /// Ask the sync trigger to call back for this queue's tag. Swallows
    /// registration failures: they are expected (many hosts reject or
    /// lack the capability) and non-fatal. Durability comes from the
    /// store, not from this call succeeding.
    pub async fn register_sync(&self) {
        if let Err(err) = self.sync_trigger.register(&self.tag).await {
            log_sync_error(err);
        }
    }

    fn new_entry(&self, entry: Entry) -> NewEntry {
        NewEntry {
            queue_name: self.name.clone(),
            request: entry.request,
            timestamp_ms: entry.timestamp_ms.unwrap_or_else(|| self.clock.now_ms()),
            metadata: entry.metadata,
        }
    }
}
