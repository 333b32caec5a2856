//! A concrete, pollable [`SyncTrigger`] for hosts that have no native
//! "call me back on connectivity" event but do have *some* way to ask
//! "are we online right now?" (a ping, a DBus NetworkManager query, a
//! platform reachability API). Composes `queue_core`'s
//! [`BroadcastSyncTrigger`] rather than reimplementing its channel
//! plumbing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use queue_core::sync::{BroadcastSyncTrigger, SyncEventEnvelope, SyncTrigger};
use queue_core::SyncError;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Anything that can answer "is the network reachable right now?".
pub trait ConnectivityProbe: Send + Sync + 'static {
    fn is_online(&self) -> bool;
}

impl<F: Fn() -> bool + Send + Sync + 'static> ConnectivityProbe for F {
    fn is_online(&self) -> bool {
        self()
    }
}

/// Polls a [`ConnectivityProbe`] on an interval and fires every
/// currently-registered tag the moment the probe transitions from
/// offline to online. This is this crate's cold-host stand-in for a
/// platform's native background-sync facility: a `Queue` built against
/// it still sees a real `subscribe()`/`register()` pair, it just happens
/// to be backed by polling instead of a native OS callback.
pub struct PollingSyncTrigger {
    inner: Arc<BroadcastSyncTrigger>,
    registered_tags: Arc<std::sync::Mutex<std::collections::HashSet<String>>>,
    was_online: Arc<AtomicBool>,
    _poller: JoinHandle<()>,
}

impl PollingSyncTrigger {
    pub fn new(probe: impl ConnectivityProbe, poll_interval: Duration) -> Self {
        let inner = Arc::new(BroadcastSyncTrigger::new());
        let registered_tags = Arc::new(std::sync::Mutex::new(std::collections::HashSet::new()));
        let was_online = Arc::new(AtomicBool::new(probe.is_online()));

        let poller = {
            let inner = inner.clone();
            let registered_tags = registered_tags.clone();
            let was_online = was_online.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(poll_interval);
                loop {
                    ticker.tick().await;
                    let online_now = probe.is_online();
                    let just_came_online = online_now && !was_online.swap(online_now, Ordering::SeqCst);
                    if !just_came_online {
                        continue;
                    }
                    let tags: Vec<String> = registered_tags.lock().unwrap().iter().cloned().collect();
                    for tag in tags {
                        tracing::debug!(tag, "connectivity restored, firing background-sync");
                        if let Err(err) = inner.fire(&tag).await {
                            tracing::warn!(tag, %err, "sync dispatch found no listener or it failed");
                        }
                    }
                }
            })
        };

        Self {
            inner,
            registered_tags,
            was_online,
            _poller: poller,
        }
    }
}

impl Drop for PollingSyncTrigger {
    fn drop(&mut self) {
        self._poller.abort();
    }
}

#[async_trait]
impl SyncTrigger for PollingSyncTrigger {
    async fn register(&self, tag: &str) -> Result<(), SyncError> {
        self.registered_tags.lock().unwrap().insert(tag.to_owned());
        self.inner.register(tag).await
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<SyncEventEnvelope>> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fires_only_after_transitioning_from_offline_to_online() {
        let online = Arc::new(AtomicBool::new(false));
        let probe_flag = online.clone();
        let trigger = PollingSyncTrigger::new(
            move || probe_flag.load(Ordering::SeqCst),
            Duration::from_millis(10),
        );

        let mut rx = trigger.subscribe().expect("polling trigger always exposes a channel");
        trigger.register("workbox-background-sync:demo").await.unwrap();

        online.store(true, Ordering::SeqCst);
        let envelope = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for sync event")
            .unwrap();
        assert_eq!(
            envelope.tag().as_deref(),
            Some("workbox-background-sync:demo")
        );
        let event = envelope.take().unwrap();
        let _ = event.ack.send(Ok(()));
    }
}
