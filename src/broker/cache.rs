//! Last-value message cache
//!
//! Concurrency-safe map from topic path to the most recently received
//! message. The network loop writes into it; discovery sweeps and
//! single-topic reads clear and read it. Writes wake any `wait_for` caller
//! through a [`Notify`], so a read observes a fresh message as soon as it
//! lands instead of on a polling interval.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Snapshot of the last message received on a topic.
///
/// Immutable once created; a topic's cache entry is replaced whole on each
/// new receipt, never merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageSnapshot {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retain: bool,
    pub received_at: DateTime<Utc>,
}

impl MessageSnapshot {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>, qos: u8, retain: bool) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
            received_at: Utc::now(),
        }
    }
}

/// Concurrency-safe last-value cache with timed waits.
#[derive(Debug, Default)]
pub struct MessageCache {
    entries: Mutex<HashMap<String, MessageSnapshot>>,
    notify: Notify,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for the snapshot's topic and wake waiters.
    pub fn write(&self, snapshot: MessageSnapshot) {
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.insert(snapshot.topic.clone(), snapshot);
        }
        self.notify.notify_waiters();
    }

    /// Current snapshot for a topic, if any.
    pub fn get(&self, topic: &str) -> Option<MessageSnapshot> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(topic).cloned()
    }

    /// Remove every entry (start of a discovery sweep).
    pub fn clear_all(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Remove a single topic's entry (start of a fresh single-topic read).
    pub fn clear_topic(&self, topic: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(topic);
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the full topic -> snapshot map.
    pub fn snapshot(&self) -> HashMap<String, MessageSnapshot> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clone()
    }

    /// Wait until an entry for `topic` exists or `timeout` elapses.
    ///
    /// Timing out is not an error: the result is simply `None`. The waiter is
    /// enabled before the map is checked; `notify_waiters` stores no permit,
    /// so registering first is what keeps a write landing between the check
    /// and the await from being missed.
    pub async fn wait_for(&self, topic: &str, timeout: Duration) -> Option<MessageSnapshot> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(snapshot) = self.get(topic) {
                return Some(snapshot);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return self.get(topic);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_write_replaces_entry() {
        let cache = MessageCache::new();
        cache.write(MessageSnapshot::new("a/b", "1", 0, true));
        cache.write(MessageSnapshot::new("a/b", "2", 1, false));

        let snapshot = cache.get("a/b").unwrap();
        assert_eq!(snapshot.payload, "2");
        assert_eq!(snapshot.qos, 1);
        assert!(!snapshot.retain);
        assert_eq!(cache.len(), 1, "last-write-wins, one entry per topic");
    }

    #[test]
    fn test_clear_all_and_clear_topic() {
        let cache = MessageCache::new();
        cache.write(MessageSnapshot::new("a/b", "1", 1, true));
        cache.write(MessageSnapshot::new("a/c", "2", 1, true));

        cache.clear_topic("a/b");
        assert!(cache.get("a/b").is_none());
        assert!(cache.get("a/c").is_some());

        cache.clear_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let cache = MessageCache::new();
        cache.write(MessageSnapshot::new("a/b", "1", 1, true));

        let copy = cache.snapshot();
        cache.clear_all();

        assert_eq!(copy.len(), 1, "snapshot survives a later clear");
    }

    #[tokio::test]
    async fn test_wait_for_returns_existing_entry_immediately() {
        let cache = MessageCache::new();
        cache.write(MessageSnapshot::new("a/b", "1", 1, true));

        let result = cache.wait_for("a/b", Duration::from_millis(10)).await;
        assert_eq!(result.unwrap().payload, "1");
    }

    #[tokio::test]
    async fn test_wait_for_times_out_absent() {
        let cache = MessageCache::new();
        let started = std::time::Instant::now();
        let result = cache.wait_for("missing/topic", Duration::from_millis(50)).await;
        assert!(result.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_wait_for_wakes_on_write() {
        let cache = Arc::new(MessageCache::new());

        let writer = cache.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.write(MessageSnapshot::new("sensors/room1/temp", "72", 1, true));
        });

        let started = std::time::Instant::now();
        let result = cache
            .wait_for("sensors/room1/temp", Duration::from_secs(2))
            .await;

        assert_eq!(result.unwrap().payload, "72");
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "wait must end on the write, not on the timeout"
        );
    }

    #[tokio::test]
    async fn test_wait_for_ignores_other_topics() {
        let cache = Arc::new(MessageCache::new());

        let writer = cache.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.write(MessageSnapshot::new("other/topic", "x", 0, false));
        });

        let result = cache.wait_for("wanted/topic", Duration::from_millis(80)).await;
        assert!(result.is_none());
    }
}
