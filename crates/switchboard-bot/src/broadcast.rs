// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Waiting for broadcast results that arrive on a later webhook.
//!
//! A broadcast registers a wait point under a fresh event id, sends the
//! request, then waits. Either the matching callback publishes the result
//! or a timer publishes the default (success) value when the deadline
//! passes. Whoever removes the wait point first delivers; the other path
//! finds nothing and does nothing.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

/// Pending broadcast wait points keyed by event id.
pub struct BroadcastSync<T> {
    waiters: Arc<DashMap<String, oneshot::Sender<T>>>,
}

impl<T> Clone for BroadcastSync<T> {
    fn clone(&self) -> Self {
        Self {
            waiters: self.waiters.clone(),
        }
    }
}

impl<T> Default for BroadcastSync<T> {
    fn default() -> Self {
        Self {
            waiters: Arc::new(DashMap::new()),
        }
    }
}

impl<T: Default + Send + 'static> BroadcastSync<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a wait point. Register before sending so a fast callback is
    /// never missed.
    pub fn register(&self, event_id: impl Into<String>) -> PendingBroadcast<T> {
        let event_id = event_id.into();
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(event_id.clone(), tx);
        PendingBroadcast {
            event_id,
            rx,
            sync: self.clone(),
        }
    }

    /// Delivers `result` to the waiter of `event_id`.
    ///
    /// Returns false if the wait point is gone (timed out or unknown).
    pub fn publish(&self, event_id: &str, result: T) -> bool {
        match self.waiters.remove(event_id) {
            Some((_, tx)) => {
                // The waiter may have been dropped; the slot is freed either way.
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    /// Drops a wait point without delivering anything.
    pub fn cancel(&self, event_id: &str) -> bool {
        self.waiters.remove(event_id).is_some()
    }

    pub fn pending(&self) -> usize {
        self.waiters.len()
    }
}

/// The caller side of one registered broadcast.
pub struct PendingBroadcast<T> {
    event_id: String,
    rx: oneshot::Receiver<T>,
    sync: BroadcastSync<T>,
}

impl<T: Default + Send + 'static> PendingBroadcast<T> {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Waits for the published result, at most `timeout`.
    ///
    /// A zero timeout does not wait: the wait point is dropped and the
    /// default result returned.
    pub async fn wait(mut self, timeout: Duration) -> T {
        if timeout.is_zero() {
            return T::default();
        }

        let timer = {
            let sync = self.sync.clone();
            let event_id = self.event_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if sync.publish(&event_id, T::default()) {
                    debug!(event_id, ?timeout, "broadcast result timed out");
                }
            })
        };
        let result = (&mut self.rx).await.unwrap_or_default();
        timer.abort();
        result
    }
}

/// A wait point never outlives its caller, even one cancelled mid-request.
impl<T> Drop for PendingBroadcast<T> {
    fn drop(&mut self) {
        self.sync.waiters.remove(&self.event_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[derive(Debug, Default, PartialEq)]
    struct Report(Vec<&'static str>);

    #[tokio::test(start_paused = true)]
    async fn timeout_publishes_default() {
        let sync = BroadcastSync::<Report>::new();
        let pending = sync.register("ev-1");
        let began = Instant::now();
        let result = pending.wait(Duration::from_millis(50)).await;
        let waited = began.elapsed();
        assert_eq!(result, Report::default());
        assert!(waited >= Duration::from_millis(50));
        assert!(waited < Duration::from_millis(60));
        assert_eq!(sync.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn early_callback_wins_over_timer() {
        let sync = BroadcastSync::<Report>::new();
        let pending = sync.register("ev-2");

        let publisher = sync.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(publisher.publish("ev-2", Report(vec!["42"])));
        });

        let began = Instant::now();
        let result = pending.wait(Duration::from_millis(50)).await;
        assert_eq!(result, Report(vec!["42"]));
        assert!(began.elapsed() < Duration::from_millis(50));

        // The deadline passing later finds no wait point.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!sync.publish("ev-2", Report::default()));
    }

    #[tokio::test]
    async fn zero_timeout_returns_immediately() {
        let sync = BroadcastSync::<Report>::new();
        let pending = sync.register("ev-3");
        assert_eq!(pending.event_id(), "ev-3");
        assert_eq!(pending.wait(Duration::ZERO).await, Report::default());
        assert_eq!(sync.pending(), 0);
        assert!(!sync.publish("ev-3", Report(vec!["late"])));
    }

    #[tokio::test]
    async fn dropped_wait_point_is_released() {
        let sync = BroadcastSync::<Report>::new();
        {
            let _pending = sync.register("ev-4");
            assert_eq!(sync.pending(), 1);
        }
        assert_eq!(sync.pending(), 0);
        assert!(!sync.publish("ev-4", Report(vec!["late"])));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_releases_wait_point() {
        let sync = BroadcastSync::<Report>::new();
        let pending = sync.register("ev-5");
        let waiter = tokio::spawn(pending.wait(Duration::from_secs(60)));
        tokio::task::yield_now().await;
        assert_eq!(sync.pending(), 1);

        waiter.abort();
        let _ = waiter.await;
        assert_eq!(sync.pending(), 0);
    }

    #[test]
    fn unknown_event_is_ignored() {
        let sync = BroadcastSync::<Report>::new();
        assert!(!sync.publish("missing", Report::default()));
        assert!(!sync.cancel("missing"));
    }
}
