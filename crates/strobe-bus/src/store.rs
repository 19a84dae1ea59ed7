// Per-topic message store: a fixed-capacity ring indexed by a monotonic
// 64-bit id. The oldest entries are overwritten on wrap; readers that fall
// behind the retention window silently resume at the oldest retained id.
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::Message;

#[derive(Debug)]
pub struct MessageStore {
    state: Mutex<StoreState>,
    capacity: usize,
}

#[derive(Debug)]
struct StoreState {
    // Bounded ring; front holds the oldest retained message.
    ring: VecDeque<Message>,
    // Id of the next message to be appended. Never decreases.
    next_id: u64,
}

/// Outcome of a ring read: the id of the first returned message plus a
/// contiguous copied slice. `first_id` exceeds the requested id when the
/// requested range was overwritten.
#[derive(Debug, Clone)]
pub struct StoreReadResult {
    pub first_id: u64,
    pub messages: Vec<Message>,
}

impl MessageStore {
    // Capacity must be nonzero; the bus validates its configuration.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(StoreState {
                ring: VecDeque::with_capacity(capacity.min(64)),
                next_id: 0,
            }),
            capacity,
        }
    }

    /// Append a message and return its assigned id.
    pub fn append(&self, message: Message) -> u64 {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = state.next_id;
        state.next_id += 1;
        state.ring.push_back(message);
        while state.ring.len() > self.capacity {
            state.ring.pop_front();
        }
        id
    }

    /// Id of the next message to be appended; equivalently, the number of
    /// messages ever appended.
    pub fn count(&self) -> u64 {
        self.state.lock().expect("store lock").next_id
    }

    /// Read up to `max_count` messages starting at `from_id`, clamped into
    /// the retention window. A `from_id` at or past the high watermark
    /// yields an empty result whose `first_id` is the high watermark.
    pub fn read_from(&self, from_id: u64, max_count: usize) -> StoreReadResult {
        let state = self.state.lock().expect("store lock");
        if from_id >= state.next_id {
            return StoreReadResult {
                first_id: state.next_id,
                messages: Vec::new(),
            };
        }
        let oldest = state.next_id - state.ring.len() as u64;
        let first_id = from_id.max(oldest);
        let offset = (first_id - oldest) as usize;
        let messages = state
            .ring
            .iter()
            .skip(offset)
            .take(max_count)
            .cloned()
            .collect();
        StoreReadResult { first_id, messages }
    }
}
