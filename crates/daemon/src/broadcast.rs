//! Mode-change fan-out for dualstream
//!
//! Pushes current-state notifications to registered subscribers without ever
//! blocking on a slow consumer. State is idempotent and re-queryable, so a
//! dropped message only delays that subscriber's view by one update.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Pending notifications buffered per subscriber
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 20;

/// Opaque identity of one registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// A registered subscriber's end of the notification queue
pub struct Subscription {
    /// Identity to pass back to `unsubscribe`
    pub id: SubscriberId,
    /// Bounded queue of serialized status payloads
    pub rx: mpsc::Receiver<String>,
}

/// Fan-out of serialized status payloads to registered subscribers
#[derive(Default)]
pub struct Broadcaster {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    subscribers: HashMap<SubscriberId, mpsc::Sender<String>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber with a fresh bounded queue
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let mut inner = self.inner.lock().expect("broadcaster lock poisoned");
        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.insert(id, tx);
        Subscription { id, rx }
    }

    /// Remove a subscriber; safe to call when it is already gone
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut inner = self.inner.lock().expect("broadcaster lock poisoned");
        inner.subscribers.remove(&id);
    }

    /// Enqueue a payload to every subscriber without blocking
    ///
    /// A subscriber whose queue is full misses this update; a subscriber
    /// whose receiver was dropped is pruned.
    pub fn broadcast(&self, payload: &str) {
        let mut inner = self.inner.lock().expect("broadcaster lock poisoned");
        inner
            .subscribers
            .retain(|_, tx| match tx.try_send(payload.to_string()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
    }

    /// Number of currently registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .expect("broadcaster lock poisoned")
            .subscribers
            .len()
    }
}
