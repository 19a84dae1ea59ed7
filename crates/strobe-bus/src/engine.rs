// Adaptive worker pool. Ready subscriptions sit in one FIFO; workers are
// spawned only when every existing worker is busy and retire once too many
// sit idle. A periodic poller re-schedules every subscription to cover the
// window where a publish lands between a pump's drain and its queued-flag
// reset.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::BusConfig;
use crate::counters::BusCounters;
use crate::subscription::Subscription;
use crate::topic::TopicRegistry;

pub(crate) struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    // FIFO of ready subscriptions; the semaphore's permit count mirrors
    // its length so workers park without holding the lock.
    queue: Mutex<VecDeque<Arc<Subscription>>>,
    ready: Semaphore,
    // Workers currently existing / currently pumping.
    allocated: AtomicUsize,
    busy: AtomicUsize,
    // Single-flight guard for the idle poller sweep.
    checking: AtomicBool,
    max_workers: usize,
    max_idle_workers: usize,
    topics: Arc<TopicRegistry>,
    counters: Arc<BusCounters>,
}

impl Engine {
    pub(crate) fn new(
        topics: Arc<TopicRegistry>,
        counters: Arc<BusCounters>,
        config: &BusConfig,
    ) -> Self {
        let inner = Arc::new(EngineInner {
            queue: Mutex::new(VecDeque::new()),
            ready: Semaphore::new(0),
            allocated: AtomicUsize::new(0),
            busy: AtomicUsize::new(0),
            checking: AtomicBool::new(false),
            max_workers: config.max_workers,
            max_idle_workers: config.max_idle_workers,
            topics,
            counters,
        });
        spawn_idle_poller(&inner, config.idle_check_interval());
        Self { inner }
    }

    pub(crate) fn schedule(&self, subscription: Arc<Subscription>) {
        self.inner.schedule(subscription);
    }

    pub(crate) fn allocated_workers(&self) -> usize {
        self.inner.allocated.load(Ordering::SeqCst)
    }

    pub(crate) fn busy_workers(&self) -> usize {
        self.inner.busy.load(Ordering::SeqCst)
    }

    /// Wake parked workers so they retire; new work is no longer accepted.
    pub(crate) fn close(&self) {
        self.inner.ready.close();
    }
}

impl EngineInner {
    fn schedule(self: &Arc<Self>, subscription: Arc<Subscription>) {
        // queued already set: the current or next pump picks the work up.
        if !subscription.set_queued() {
            return;
        }
        {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            queue.push_back(subscription);
        }
        self.ready.add_permits(1);
        self.consider_add_worker();
    }

    // Grow only when every existing worker is busy, never past the cap.
    fn consider_add_worker(self: &Arc<Self>) {
        loop {
            let allocated = self.allocated.load(Ordering::SeqCst);
            if allocated >= self.max_workers {
                return;
            }
            if allocated != self.busy.load(Ordering::SeqCst) {
                return;
            }
            if self
                .allocated
                .compare_exchange(allocated, allocated + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                let now_allocated = allocated + 1;
                self.counters.allocated_workers.set_raw(now_allocated as u64);
                metrics::gauge!("bus_allocated_workers").set(now_allocated as f64);
                tracing::debug!(allocated = now_allocated, "spawning pump worker");
                let engine = Arc::clone(self);
                tokio::spawn(engine.worker_loop());
                return;
            }
        }
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            let allocated = self.allocated.load(Ordering::SeqCst);
            let busy = self.busy.load(Ordering::SeqCst);
            if allocated.saturating_sub(busy) > self.max_idle_workers {
                self.retire_worker();
                return;
            }
            let permit = match self.ready.acquire().await {
                Ok(permit) => permit,
                // Engine closed: drain out.
                Err(_) => {
                    self.retire_worker();
                    return;
                }
            };
            permit.forget();
            let Some(subscription) = self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
            else {
                continue;
            };
            let now_busy = self.busy.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.busy_workers.set_raw(now_busy as u64);
            metrics::gauge!("bus_busy_workers").set(now_busy as f64);
            let outcome = subscription.work(&self.topics).await;
            // Clearing queued after the pump lets a racing publish re-enqueue;
            // anything that slipped in between is caught by the idle poller.
            subscription.unset_queued();
            self.decrement_busy();
            if let Err(error) = outcome {
                tracing::info!(
                    identity = %subscription.identity(),
                    %error,
                    "subscription pump failed; continuing"
                );
            }
        }
    }

    fn retire_worker(&self) {
        let previous = self.allocated.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "allocated worker count underflow");
        if previous == 0 {
            self.allocated.store(0, Ordering::SeqCst);
            tracing::warn!("allocated worker count underflow; clamped to zero");
        }
        let now_allocated = previous.saturating_sub(1);
        self.counters.allocated_workers.set_raw(now_allocated as u64);
        metrics::gauge!("bus_allocated_workers").set(now_allocated as f64);
    }

    fn decrement_busy(&self) {
        let previous = self.busy.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "busy worker count underflow");
        if previous == 0 {
            self.busy.store(0, Ordering::SeqCst);
            tracing::warn!("busy worker count underflow; clamped to zero");
        }
        let now_busy = previous.saturating_sub(1);
        self.counters.busy_workers.set_raw(now_busy as u64);
        metrics::gauge!("bus_busy_workers").set(now_busy as f64);
    }

    // Re-schedule every subscription of every topic. Recovers work stranded
    // by the publish-during-pump race and wakes late joiners.
    fn check_topics(self: &Arc<Self>) {
        if self.checking.swap(true, Ordering::AcqRel) {
            return;
        }
        self.topics.for_each(|topic| {
            tracing::trace!(topic = %topic.key(), "idle poll sweep");
            for subscription in topic.snapshot_subscriptions() {
                self.schedule(subscription);
            }
        });
        self.checking.store(false, Ordering::Release);
    }
}

fn spawn_idle_poller(inner: &Arc<EngineInner>, interval: Duration) {
    let weak: Weak<EngineInner> = Arc::downgrade(inner);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let Some(engine) = weak.upgrade() else {
                return;
            };
            if engine.ready.is_closed() {
                return;
            }
            engine.check_topics();
        }
    });
}
