//! Fan-out of serialized events to WebSocket subscribers.
//!
//! Each subscriber gets its own unbounded queue; publishing never blocks on
//! slow consumers, and a subscriber whose receiver is gone is pruned on the
//! next publish. Queues carry pre-serialized frames so the serialization
//! cost is paid once per event, not once per subscriber.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// A frame queued for delivery: serialized JSON, shared across subscribers.
pub type Frame = Arc<str>;

/// Registry of live subscriber queues.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<Uuid, mpsc::UnboundedSender<Frame>>>,
}

impl BroadcastHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its id plus the receiving end.
    pub fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<Frame>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().insert(id, tx);
        debug!(subscriber = %id, "subscriber registered");
        (id, rx)
    }

    /// Drop a subscriber's queue. Safe to call twice.
    pub fn remove(&self, id: Uuid) {
        if self.subscribers.lock().remove(&id).is_some() {
            debug!(subscriber = %id, "subscriber removed");
        }
    }

    /// Queue a frame to every live subscriber, pruning dead ones.
    pub fn publish(&self, frame: Frame) {
        let mut subs = self.subscribers.lock();
        subs.retain(|id, tx| {
            let alive = tx.send(Arc::clone(&frame)).is_ok();
            if !alive {
                debug!(subscriber = %id, "pruning closed subscriber");
            }
            alive
        });
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
