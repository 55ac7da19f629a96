//! # Deduplicating Work Queue
//!
//! The scheduling backbone of every pipeline. Keys are weak references to
//! durable rows; losing one is recoverable by re-enqueueing the same id.
//!
//! Semantics:
//! - At most one pending occurrence per key: enqueueing a key that is
//!   already waiting is a no-op.
//! - The key is released at dequeue time, so a worker may re-queue the key
//!   it just finished. Polling loops are built from exactly this.
//! - `enqueue_after` is "schedule(key, delay)": a detached one-shot timer
//!   pushes the key back no earlier than `delay`, without holding a worker
//!   slot while waiting.
//! - An optional dequeue-side token bucket makes the queue rate-limited.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

use crate::resilience::{RateBudget, TokenBucket};

pub struct DedupQueue<K> {
    tx: Mutex<Option<mpsc::UnboundedSender<K>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<K>>,
    pending: Mutex<HashSet<K>>,
    limiter: Option<TokenBucket>,
}

impl<K> DedupQueue<K>
where
    K: Eq + Hash + Clone + Send + std::fmt::Debug + 'static,
{
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Queue whose dequeues are throttled by a token bucket.
    pub fn rate_limited(budget: RateBudget) -> Self {
        Self::build(Some(TokenBucket::new(budget)))
    }

    fn build(limiter: Option<TokenBucket>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            pending: Mutex::new(HashSet::new()),
            limiter,
        }
    }

    /// Push a key unless it is already waiting. Returns whether the key
    /// was accepted (false: duplicate or queue closed).
    pub fn enqueue(&self, key: K) -> bool {
        {
            let mut pending = self.pending.lock();
            if !pending.insert(key.clone()) {
                trace!(?key, "enqueue deduplicated");
                return false;
            }
        }
        let tx = self.tx.lock();
        match tx.as_ref() {
            Some(tx) if tx.send(key.clone()).is_ok() => true,
            _ => {
                self.pending.lock().remove(&key);
                false
            }
        }
    }

    /// Schedule the key to be pushed back no earlier than `delay`. The
    /// timer is detached and does not occupy a worker slot.
    pub fn enqueue_after(self: &Arc<Self>, key: K, delay: Duration) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.enqueue(key);
        });
    }

    /// Next key, or None once the queue is closed and drained. The key is
    /// released from the pending set before being handed out, so the
    /// worker processing it may re-queue it immediately.
    pub async fn recv(&self) -> Option<K> {
        let mut rx = self.rx.lock().await;
        let key = rx.recv().await?;
        drop(rx);
        self.pending.lock().remove(&key);
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
        Some(key)
    }

    /// Stop accepting keys; `recv` returns None once drained.
    pub fn close(&self) {
        self.tx.lock().take();
    }

    /// Number of keys currently waiting.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> Default for DedupQueue<K>
where
    K: Eq + Hash + Clone + Send + std::fmt::Debug + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_enqueue_is_noop() {
        let queue: DedupQueue<String> = DedupQueue::new();
        assert!(queue.enqueue("a".into()));
        assert!(!queue.enqueue("a".into()));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.recv().await.unwrap(), "a");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_key_can_requeue_after_dequeue() {
        let queue: DedupQueue<String> = DedupQueue::new();
        queue.enqueue("a".into());
        let key = queue.recv().await.unwrap();
        // The slot is free again as soon as the key is handed out.
        assert!(queue.enqueue(key));
        assert_eq!(queue.recv().await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_delayed_enqueue_fires() {
        let queue: Arc<DedupQueue<u32>> = Arc::new(DedupQueue::new());
        queue.enqueue_after(7, Duration::from_millis(5));
        let key = tokio::time::timeout(Duration::from_secs(1), queue.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(key, 7);
    }

    #[tokio::test]
    async fn test_close_ends_recv() {
        let queue: DedupQueue<u32> = DedupQueue::new();
        queue.enqueue(1);
        queue.close();
        assert!(!queue.enqueue(2));
        assert_eq!(queue.recv().await, Some(1));
        assert_eq!(queue.recv().await, None);
    }

    #[tokio::test]
    async fn test_rate_limited_dequeue_spacing() {
        let queue: DedupQueue<u32> = DedupQueue::rate_limited(RateBudget {
            rate: 200.0,
            burst: 1,
        });
        queue.enqueue(1);
        queue.enqueue(2);
        let started = std::time::Instant::now();
        queue.recv().await.unwrap();
        queue.recv().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(3));
    }
}
