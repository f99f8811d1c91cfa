//! Keyed deadline scheduler.
//!
//! One pending timer per key: re-registration replaces the previous
//! deadline, cancellation invalidates it. The heap keeps stale entries
//! until they surface (lazy invalidation), so register and cancel stay
//! O(log N) amortized. Due keys are delivered in monotonic deadline order
//! over an unbounded channel to a consumer worker; delivery is
//! at-least-once and consumers must be idempotent, since after a crash the
//! same deadline may be replayed from the store scan.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use consign_core::error::ConsignError;
use consign_core::types::{DisputeId, Timestamp, TransferId};

use crate::clock::Clock;

// ── TimerKey ─────────────────────────────────────────────────────────────────

/// What a timer firing means. Keys identify the deadline, not the moment;
/// the consumer re-reads current state and decides what (if anything) to do.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// A transfer's confirmation deadline (`timeout_at`).
    TransferDeadline(TransferId),
    /// A dispute's initial-evidence deadline.
    EvidenceDeadline(DisputeId),
}

// ── Heap entry ───────────────────────────────────────────────────────────────

#[derive(PartialEq, Eq)]
struct Entry {
    deadline: Timestamp,
    seq: u64,
    generation: u64,
    key: TimerKey,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct Inner {
    heap: BinaryHeap<Reverse<Entry>>,
    /// Current generation per live key; heap entries with an older
    /// generation are stale and skipped on pop.
    live: HashMap<TimerKey, u64>,
    next_generation: u64,
    next_seq: u64,
}

// ── Scheduler ────────────────────────────────────────────────────────────────

pub struct Scheduler {
    inner: Mutex<Inner>,
    notify: Notify,
    fired: mpsc::UnboundedSender<TimerKey>,
    stopped: AtomicBool,
}

impl Scheduler {
    /// Build a scheduler and the receiving end of its firing channel. The
    /// caller hands the receiver to the engine's timeout pump.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<TimerKey>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                inner: Mutex::new(Inner::default()),
                notify: Notify::new(),
                fired: tx,
                stopped: AtomicBool::new(false),
            }),
            rx,
        )
    }

    /// Arm (or re-arm) the timer for `key`. A previous registration for the
    /// same key is cancelled.
    pub fn register(&self, deadline: Timestamp, key: TimerKey) -> Result<(), ConsignError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ConsignError::SchedulerStopped);
        }
        let mut inner = self.inner.lock().unwrap();
        inner.next_generation += 1;
        inner.next_seq += 1;
        let generation = inner.next_generation;
        let seq = inner.next_seq;
        inner.live.insert(key.clone(), generation);
        inner.heap.push(Reverse(Entry {
            deadline,
            seq,
            generation,
            key,
        }));
        drop(inner);
        self.notify.notify_one();
        Ok(())
    }

    /// Cancel the pending timer for `key`, if any.
    pub fn cancel(&self, key: &TimerKey) {
        self.inner.lock().unwrap().live.remove(key);
    }

    /// Whether a timer is currently armed for `key`.
    pub fn pending(&self, key: &TimerKey) -> bool {
        self.inner.lock().unwrap().live.contains_key(key)
    }

    /// Pop every key whose deadline is at or before `now`, in deadline
    /// order. Stale heap entries are discarded along the way.
    pub fn drain_due(&self, now: Timestamp) -> Vec<TimerKey> {
        let mut inner = self.inner.lock().unwrap();
        let mut due = Vec::new();
        while let Some(Reverse(top)) = inner.heap.peek() {
            if top.deadline > now {
                break;
            }
            let Reverse(entry) = inner.heap.pop().expect("peeked entry");
            let current = inner.live.get(&entry.key).copied();
            if current == Some(entry.generation) {
                inner.live.remove(&entry.key);
                due.push(entry.key);
            }
            // otherwise stale: cancelled or superseded
        }
        due
    }

    fn next_deadline(&self) -> Option<Timestamp> {
        let inner = self.inner.lock().unwrap();
        inner.heap.peek().map(|Reverse(e)| e.deadline)
    }

    /// Worker loop: sleeps until the earliest deadline (or a registration
    /// wakes it), then delivers due keys. Runs on its own task, never on
    /// the request path.
    pub async fn run(self: Arc<Self>, clock: Arc<dyn Clock>) {
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                debug!("scheduler worker exiting");
                return;
            }
            let now = clock.now();
            for key in self.drain_due(now) {
                debug!(?key, "timer fired");
                if self.fired.send(key).is_err() {
                    warn!("timeout pump gone; scheduler stopping");
                    self.stop();
                    return;
                }
            }

            let sleep_secs = match self.next_deadline() {
                Some(d) => (d - clock.now()).clamp(0, 60) as u64,
                None => 60,
            };
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(sleep_secs.max(1))) => {}
                _ = self.notify.notified() => {}
            }
        }
    }

    /// Begin shutdown: subsequent registrations fail with
    /// `SchedulerStopped`; the worker exits on its next wakeup.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(s: &str) -> TimerKey {
        TimerKey::TransferDeadline(TransferId(s.into()))
    }

    #[test]
    fn fires_in_deadline_order() {
        let (sched, _rx) = Scheduler::new();
        sched.register(30, tid("c")).unwrap();
        sched.register(10, tid("a")).unwrap();
        sched.register(20, tid("b")).unwrap();

        let due = sched.drain_due(25);
        assert_eq!(due, vec![tid("a"), tid("b")]);
        assert_eq!(sched.drain_due(25), Vec::<TimerKey>::new());
        assert_eq!(sched.drain_due(30), vec![tid("c")]);
    }

    #[test]
    fn reregistration_replaces_previous_deadline() {
        let (sched, _rx) = Scheduler::new();
        sched.register(10, tid("a")).unwrap();
        sched.register(50, tid("a")).unwrap();

        // The old deadline must not fire.
        assert!(sched.drain_due(10).is_empty());
        assert_eq!(sched.drain_due(50), vec![tid("a")]);
    }

    #[test]
    fn cancel_by_key() {
        let (sched, _rx) = Scheduler::new();
        sched.register(10, tid("a")).unwrap();
        sched.register(10, tid("b")).unwrap();
        sched.cancel(&tid("a"));

        assert_eq!(sched.drain_due(10), vec![tid("b")]);
        assert!(!sched.pending(&tid("a")));
    }

    #[test]
    fn stopped_scheduler_rejects_registration() {
        let (sched, _rx) = Scheduler::new();
        sched.stop();
        let err = sched.register(10, tid("a")).unwrap_err();
        assert!(matches!(err, ConsignError::SchedulerStopped));
    }

    #[tokio::test]
    async fn worker_delivers_due_keys() {
        let (sched, mut rx) = Scheduler::new();
        let clock = Arc::new(crate::clock::ManualClock::new(100));
        sched.register(90, tid("past")).unwrap();

        let worker = tokio::spawn(Arc::clone(&sched).run(clock));
        let key = rx.recv().await.unwrap();
        assert_eq!(key, tid("past"));

        sched.stop();
        worker.await.unwrap();
    }
}
