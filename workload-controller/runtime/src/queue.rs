use crate::core::ResourceId;
use ahash::AHashSet as HashSet;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::{sync::mpsc, time};

/// A queue of keys waiting to be reconciled.
///
/// A key that is already waiting is not queued again. A key that is pushed
/// while it is being reconciled is queued once more, so the change is not lost.
#[derive(Clone, Debug)]
pub(crate) struct Queue(Arc<Shared>);

#[derive(Debug)]
pub(crate) struct Receiver {
    shared: Arc<Shared>,
    rx: mpsc::UnboundedReceiver<ResourceId>,
}

#[derive(Debug)]
struct Shared {
    pending: Mutex<HashSet<ResourceId>>,
    tx: mpsc::UnboundedSender<ResourceId>,
}

// === impl Queue ===

impl Queue {
    pub(crate) fn new() -> (Self, Receiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            pending: Default::default(),
            tx,
        });
        (Self(shared.clone()), Receiver { shared, rx })
    }

    pub(crate) fn push(&self, key: ResourceId) {
        if !self.0.pending.lock().insert(key.clone()) {
            return;
        }
        // Sends only fail after the worker has stopped.
        let _ = self.0.tx.send(key);
    }

    /// Pushes the key once `delay` has elapsed.
    pub(crate) fn push_after(&self, key: ResourceId, delay: time::Duration) {
        let queue = self.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            queue.push(key);
        });
    }
}

// === impl Receiver ===

impl Receiver {
    pub(crate) async fn next(&mut self) -> Option<ResourceId> {
        let key = self.rx.recv().await?;
        self.shared.pending.lock().remove(&key);
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[tokio::test]
    async fn deduplicates_waiting_keys() {
        let (queue, mut rx) = Queue::new();
        let a = ResourceId::new("ns", "a");
        let b = ResourceId::new("ns", "b");

        queue.push(a.clone());
        queue.push(b.clone());
        queue.push(a.clone());

        assert_eq!(rx.next().await, Some(a.clone()));
        assert_eq!(rx.next().await, Some(b));

        let mut next = task::spawn(rx.next());
        assert_pending!(next.poll());
        queue.push(a.clone());
        assert!(next.is_woken());
        assert_ready_eq!(next.poll(), Some(a));
    }

    #[tokio::test]
    async fn requeues_key_taken_for_reconciliation() {
        let (queue, mut rx) = Queue::new();
        let a = ResourceId::new("ns", "a");

        queue.push(a.clone());
        assert_eq!(rx.next().await, Some(a.clone()));

        // The key is no longer waiting, so it is queued again.
        queue.push(a.clone());
        assert_eq!(rx.next().await, Some(a));
    }

    #[tokio::test(start_paused = true)]
    async fn pushes_after_delay() {
        let (queue, mut rx) = Queue::new();
        let a = ResourceId::new("ns", "a");

        queue.push_after(a.clone(), time::Duration::from_secs(5));
        let start = time::Instant::now();
        assert_eq!(rx.next().await, Some(a));
        assert!(start.elapsed() >= time::Duration::from_secs(5));
    }
}
