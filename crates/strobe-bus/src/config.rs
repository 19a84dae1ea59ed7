use serde::{Deserialize, Serialize};
use std::time::Duration;

// Bus tuning knobs, read once at construction.
pub const DEFAULT_MESSAGE_STORE_CAPACITY: usize = 5000;
const DEFAULT_IDLE_CHECK_INTERVAL_MS: u64 = 5000;
const MAX_WORKERS_PER_CPU: usize = 3;

/// Message bus configuration.
///
/// Defaults scale the worker pool off the CPU count: up to three pump
/// workers per CPU, with surplus idle workers beyond one per CPU retiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    // Ring capacity of each topic's message store.
    pub message_store_capacity: usize,
    // Upper bound on concurrently allocated pump workers.
    pub max_workers: usize,
    // Idle workers in excess of this retire.
    pub max_idle_workers: usize,
    // Period of the idle poller that re-schedules every subscription.
    pub idle_check_interval_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        let cpus = cpu_count();
        Self {
            message_store_capacity: DEFAULT_MESSAGE_STORE_CAPACITY,
            max_workers: cpus * MAX_WORKERS_PER_CPU,
            max_idle_workers: cpus,
            idle_check_interval_ms: DEFAULT_IDLE_CHECK_INTERVAL_MS,
        }
    }
}

impl BusConfig {
    /// Defaults overridden by `STROBE_*` environment variables where set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = env_positive("STROBE_MESSAGE_STORE_CAPACITY") {
            config.message_store_capacity = value;
        }
        if let Some(value) = env_positive("STROBE_MAX_WORKERS") {
            config.max_workers = value;
        }
        if let Some(value) = env_positive("STROBE_MAX_IDLE_WORKERS") {
            config.max_idle_workers = value;
        }
        if let Some(value) = env_positive("STROBE_IDLE_CHECK_INTERVAL_MS") {
            config.idle_check_interval_ms = value as u64;
        }
        config
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_millis(self.idle_check_interval_ms)
    }
}

fn env_positive(name: &str) -> Option<usize> {
    parse_positive(std::env::var(name).ok())
}

fn parse_positive(value: Option<String>) -> Option<usize> {
    value
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
}

fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}
