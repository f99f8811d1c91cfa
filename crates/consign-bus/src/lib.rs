//! consign-bus
//!
//! Topic-keyed in-process publish/subscribe (C2).
//!
//! Delivery is at-least-once within the process and ordered per topic per
//! subscriber; handlers must be idempotent. Each subscriber owns a FIFO
//! queue: bounded queues drop the oldest undelivered event on overflow and
//! count the loss, so a slow subscriber never blocks a publisher. A
//! subscriber that cannot tolerate loss asks for an unbounded queue.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::{debug, warn};

use consign_core::event::EngineEvent;

// ── Queue policy ─────────────────────────────────────────────────────────────

/// Per-subscriber queue sizing.
#[derive(Clone, Copy, Debug)]
pub enum QueuePolicy {
    /// Drop the oldest undelivered event once `cap` is reached.
    Bounded(usize),
    /// Never drop. Reserved for consumers where loss is unacceptable.
    Unbounded,
}

// ── Subscriber internals ─────────────────────────────────────────────────────

struct SubInner {
    name: &'static str,
    topics: HashSet<&'static str>,
    queue: Mutex<VecDeque<EngineEvent>>,
    policy: QueuePolicy,
    dropped: AtomicU64,
    notify: Notify,
    closed: AtomicBool,
}

impl SubInner {
    fn push(&self, event: &EngineEvent) {
        let mut queue = self.queue.lock().unwrap();
        if let QueuePolicy::Bounded(cap) = self.policy {
            if queue.len() >= cap {
                queue.pop_front();
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(subscriber = self.name, total_dropped = total, "event queue overflow");
            }
        }
        queue.push_back(event.clone());
        drop(queue);
        self.notify.notify_one();
    }
}

/// Receiving end of one subscription.
pub struct Subscription {
    inner: Arc<SubInner>,
}

impl Subscription {
    /// Next event, in publish order for this subscriber. Returns `None`
    /// once the subscription is closed and drained.
    pub async fn recv(&self) -> Option<EngineEvent> {
        loop {
            if let Some(event) = self.try_recv() {
                return Some(event);
            }
            if self.inner.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.inner.notify.notified().await;
        }
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.inner.queue.lock().unwrap().pop_front()
    }

    /// How many events this subscriber has lost to overflow.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

// ── EventBus ─────────────────────────────────────────────────────────────────

/// The process-wide event bus. Cheap to clone behind an `Arc`; publishing
/// walks the subscriber list synchronously and never waits on consumers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Arc<SubInner>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a set of topics.
    pub fn subscribe(
        &self,
        name: &'static str,
        topics: &[&'static str],
        policy: QueuePolicy,
    ) -> Subscription {
        let inner = Arc::new(SubInner {
            name,
            topics: topics.iter().copied().collect(),
            queue: Mutex::new(VecDeque::new()),
            policy,
            dropped: AtomicU64::new(0),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });
        self.subscribers.lock().unwrap().push(Arc::clone(&inner));
        debug!(subscriber = name, topics = topics.len(), "subscribed");
        Subscription { inner }
    }

    /// Deliver `event` to every subscriber registered for its topic.
    pub fn publish(&self, event: &EngineEvent) {
        let topic = event.topic();
        let subscribers = self.subscribers.lock().unwrap();
        for sub in subscribers.iter() {
            if sub.closed.load(Ordering::SeqCst) {
                continue;
            }
            if sub.topics.contains(topic) {
                sub.push(event);
            }
        }
    }

    /// Drop closed subscriptions. Called opportunistically by the node.
    pub fn sweep(&self) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|s| !s.closed.load(Ordering::SeqCst));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consign_core::event::topic;
    use consign_core::types::{StopId, Timestamp};

    fn stop_event(n: i64) -> EngineEvent {
        EngineEvent::StopTriggered {
            stop_id: StopId(format!("s{n}")),
            at: n as Timestamp,
        }
    }

    #[tokio::test]
    async fn delivery_is_ordered_per_subscriber() {
        let bus = EventBus::new();
        let sub = bus.subscribe("test", &[topic::STOP_TRIGGERED], QueuePolicy::Unbounded);

        for n in 0..5 {
            bus.publish(&stop_event(n));
        }
        for n in 0..5 {
            assert_eq!(sub.recv().await.unwrap(), stop_event(n));
        }
    }

    #[tokio::test]
    async fn topic_filtering() {
        let bus = EventBus::new();
        let sub = bus.subscribe("resumes-only", &[topic::STOP_RESUMED], QueuePolicy::Unbounded);

        bus.publish(&stop_event(1));
        assert!(sub.try_recv().is_none());

        let resumed = EngineEvent::StopResumed {
            stop_id: StopId("s1".into()),
            at: 2,
        };
        bus.publish(&resumed);
        assert_eq!(sub.recv().await.unwrap(), resumed);
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let bus = EventBus::new();
        let sub = bus.subscribe("slow", &[topic::STOP_TRIGGERED], QueuePolicy::Bounded(3));

        for n in 0..5 {
            bus.publish(&stop_event(n));
        }
        assert_eq!(sub.dropped(), 2);
        // Oldest two were discarded; 2, 3, 4 remain in order.
        assert_eq!(sub.recv().await.unwrap(), stop_event(2));
        assert_eq!(sub.recv().await.unwrap(), stop_event(3));
        assert_eq!(sub.recv().await.unwrap(), stop_event(4));
    }

    #[tokio::test]
    async fn unbounded_subscriber_never_drops() {
        let bus = EventBus::new();
        let sub = bus.subscribe("trust", &[topic::STOP_TRIGGERED], QueuePolicy::Unbounded);

        for n in 0..10_000 {
            bus.publish(&stop_event(n));
        }
        assert_eq!(sub.dropped(), 0);
        assert_eq!(sub.len(), 10_000);
    }
}
