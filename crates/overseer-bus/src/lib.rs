//! In-process publish/subscribe transport with named topics
//!
//! A single `MessageBus` is the communication point between a running engine
//! and whoever mirrors or commands it. Publishing is fire-and-forget: a slow
//! or absent listener never blocks the execution loop. Subscriptions are
//! registered under an instance-scoped `SubscriberId` so multiple engines in
//! the same process do not collide, and are explicitly unregistered on
//! destruction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Instance-scoped identity of a subscriber.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate a fresh process-unique id.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct TopicEntry {
    senders: HashMap<SubscriberId, mpsc::Sender<serde_json::Value>>,
}

/// Publish/subscribe bus with named topics and JSON payloads.
pub struct MessageBus {
    topics: Mutex<HashMap<String, TopicEntry>>,
    capacity: usize,
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Publish a message on a topic. Returns how many listeners it reached.
    ///
    /// Delivery is best effort: listeners with a full queue miss the message
    /// (logged), and publishing to a topic nobody listens on is not an error.
    pub fn publish<T: Serialize>(&self, topic: &str, msg: &T) -> usize {
        let value = match serde_json::to_value(msg) {
            Ok(v) => v,
            Err(err) => {
                warn!("failed to serialize message for topic {topic}: {err}");
                return 0;
            }
        };

        let mut topics = self.topics.lock().unwrap();
        let Some(entry) = topics.get_mut(topic) else {
            debug!("publish on {topic}: no listeners registered");
            return 0;
        };

        let mut delivered = 0;
        entry.senders.retain(|id, tx| match tx.try_send(value.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("listener {id} on {topic} is full, dropping message");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        delivered
    }

    /// Register a listener on a topic under the given instance identity.
    /// Re-subscribing with the same identity replaces the previous
    /// registration.
    pub fn subscribe(&self, topic: &str, id: SubscriberId) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut topics = self.topics.lock().unwrap();
        let entry = topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicEntry {
                senders: HashMap::new(),
            });
        entry.senders.insert(id, tx);
        Subscription {
            topic: topic.to_string(),
            id,
            rx,
        }
    }

    /// Remove the registration of `id` on `topic`. The corresponding
    /// `Subscription` stops yielding messages.
    pub fn unsubscribe(&self, topic: &str, id: SubscriberId) {
        let mut topics = self.topics.lock().unwrap();
        if let Some(entry) = topics.get_mut(topic) {
            entry.senders.remove(&id);
            if entry.senders.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Current number of listeners on a topic.
    pub fn listener_count(&self, topic: &str) -> usize {
        let topics = self.topics.lock().unwrap();
        topics.get(topic).map_or(0, |e| e.senders.len())
    }

    /// Wait until at least one listener is registered on `topic`, up to
    /// `timeout`. Returns whether a listener appeared.
    ///
    /// This is the readiness handshake used after confirmation instead of a
    /// fixed startup delay. A warning is logged when the wait is noticeable.
    pub async fn wait_for_listener(&self, topic: &str, timeout: Duration) -> bool {
        const POLL: Duration = Duration::from_millis(10);
        let mut waited = Duration::ZERO;
        let mut warned = false;
        while self.listener_count(topic) == 0 {
            if waited >= timeout {
                warn!("waiting for a listener on {topic} timed out");
                return false;
            }
            if !warned && waited >= Duration::from_millis(500) {
                warn!("still waiting for a listener on {topic}...");
                warned = true;
            }
            tokio::time::sleep(POLL).await;
            waited += POLL;
        }
        if warned {
            debug!("finally found a listener on {topic}");
        }
        true
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Handle to a registered listener. Yields raw JSON payloads; callers
/// deserialize into the protocol type they expect.
pub struct Subscription {
    topic: String,
    id: SubscriberId,
    rx: mpsc::Receiver<serde_json::Value>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Take every message that is already queued, without waiting. This is
    /// the once-per-tick drain used by the engine so command handling never
    /// runs inline on the delivery path.
    pub fn try_drain(&mut self) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(v) = self.rx.try_recv() {
            out.push(v);
        }
        out
    }

    /// Wait for the next message. `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<serde_json::Value> {
        self.rx.recv().await
    }
}
