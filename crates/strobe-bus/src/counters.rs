// Write-only telemetry counters consumed by the bus. The host application
// supplies a `CounterSink`; the bus resolves the counters it maintains once
// at construction and updates them from the hot paths.
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const MESSAGES_PUBLISHED_TOTAL: &str = "MessageBusMessagesPublishedTotal";
pub const MESSAGES_PUBLISHED_PER_SEC: &str = "MessageBusMessagesPublishedPerSec";
pub const SUBSCRIBERS_TOTAL: &str = "MessageBusSubscribersTotal";
pub const SUBSCRIBERS_CURRENT: &str = "MessageBusSubscribersCurrent";
pub const SUBSCRIBERS_PER_SEC: &str = "MessageBusSubscribersPerSec";
pub const ALLOCATED_WORKERS: &str = "MessageBusAllocatedWorkers";
pub const BUSY_WORKERS: &str = "MessageBusBusyWorkers";

/// One named counter. Implementations must tolerate concurrent callers.
pub trait Counter: Send + Sync {
    fn increment(&self);
    fn decrement(&self);
    fn set_raw(&self, value: u64);
}

/// Source of counters, keyed by name.
pub trait CounterSink: Send + Sync {
    fn counter(&self, name: &str) -> Arc<dyn Counter>;
}

/// Discards every update. The default when no sink is supplied.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCounterSink;

struct NoopCounter;

impl Counter for NoopCounter {
    fn increment(&self) {}
    fn decrement(&self) {}
    fn set_raw(&self, _value: u64) {}
}

impl CounterSink for NoopCounterSink {
    fn counter(&self, _name: &str) -> Arc<dyn Counter> {
        Arc::new(NoopCounter)
    }
}

/// Process-local counter backed by an atomic.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl AtomicCounter {
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Counter for AtomicCounter {
    fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    fn decrement(&self) {
        // Clamp at zero rather than wrapping.
        let mut current = self.value.load(Ordering::Relaxed);
        while current > 0 {
            match self.value.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(next) => current = next,
            }
        }
    }

    fn set_raw(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }
}

/// Sink that materializes an `AtomicCounter` per name. Useful for tests and
/// for hosts that scrape counter values themselves.
#[derive(Debug, Default)]
pub struct AtomicCounterSink {
    counters: DashMap<String, Arc<AtomicCounter>>,
}

impl AtomicCounterSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a named counter; zero if it was never resolved.
    pub fn value(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map(|counter| counter.value().value())
            .unwrap_or(0)
    }
}

impl CounterSink for AtomicCounterSink {
    fn counter(&self, name: &str) -> Arc<dyn Counter> {
        self.counters
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

// The counters the bus itself maintains, resolved once from the sink.
pub(crate) struct BusCounters {
    pub(crate) messages_published_total: Arc<dyn Counter>,
    pub(crate) messages_published_per_sec: Arc<dyn Counter>,
    pub(crate) subscribers_total: Arc<dyn Counter>,
    pub(crate) subscribers_current: Arc<dyn Counter>,
    pub(crate) subscribers_per_sec: Arc<dyn Counter>,
    pub(crate) allocated_workers: Arc<dyn Counter>,
    pub(crate) busy_workers: Arc<dyn Counter>,
}

impl BusCounters {
    pub(crate) fn resolve(sink: &dyn CounterSink) -> Self {
        Self {
            messages_published_total: sink.counter(MESSAGES_PUBLISHED_TOTAL),
            messages_published_per_sec: sink.counter(MESSAGES_PUBLISHED_PER_SEC),
            subscribers_total: sink.counter(SUBSCRIBERS_TOTAL),
            subscribers_current: sink.counter(SUBSCRIBERS_CURRENT),
            subscribers_per_sec: sink.counter(SUBSCRIBERS_PER_SEC),
            allocated_workers: sink.counter(ALLOCATED_WORKERS),
            busy_workers: sink.counter(BUSY_WORKERS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_counter_counts() {
        let counter = AtomicCounter::default();
        counter.increment();
        counter.increment();
        counter.decrement();
        assert_eq!(counter.value(), 1);
    }

    #[test]
    fn atomic_counter_decrement_clamps_at_zero() {
        let counter = AtomicCounter::default();
        counter.decrement();
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn atomic_counter_set_raw_overwrites() {
        let counter = AtomicCounter::default();
        counter.increment();
        counter.set_raw(40);
        assert_eq!(counter.value(), 40);
    }

    #[test]
    fn sink_returns_same_counter_per_name() {
        let sink = AtomicCounterSink::new();
        sink.counter(MESSAGES_PUBLISHED_TOTAL).increment();
        sink.counter(MESSAGES_PUBLISHED_TOTAL).increment();
        assert_eq!(sink.value(MESSAGES_PUBLISHED_TOTAL), 2);
        assert_eq!(sink.value(BUSY_WORKERS), 0);
    }

    #[test]
    fn noop_sink_swallows_updates() {
        let sink = NoopCounterSink;
        let counter = sink.counter(SUBSCRIBERS_TOTAL);
        counter.increment();
        counter.decrement();
        counter.set_raw(7);
    }
}
