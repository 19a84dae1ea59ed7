// One subscriber's read-side state: an ordered cursor list, a delivery
// callback, and the pump that drains pending messages into batches.
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::topic::{Topic, TopicRegistry};
use crate::{BoxFuture, Message, MessageResult};

/// Delivery callback. Receives one batch and resolves to `true` to keep the
/// subscription alive or `false` to stop it.
pub type SubscriptionCallback =
    Arc<dyn Fn(MessageResult) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync>;

// A read position in one topic: the next id this subscription expects,
// plus a non-owning handle to the topic for fast store lookup.
#[derive(Clone)]
pub(crate) struct Cursor {
    key: String,
    id: u64,
    topic: Weak<Topic>,
}

impl Cursor {
    // Upgrade the cached topic handle, falling back to a registry lookup
    // for cursors decoded before their topic linkage was attached.
    fn resolve_topic(&mut self, topics: &TopicRegistry) -> Option<Arc<Topic>> {
        if let Some(topic) = self.topic.upgrade() {
            return Some(topic);
        }
        let topic = topics.get(&self.key)?;
        self.topic = Arc::downgrade(&topic);
        Some(topic)
    }
}

pub(crate) struct Subscription {
    identity: String,
    cursors: Mutex<Vec<Cursor>>,
    callback: SubscriptionCallback,
    max_messages: usize,
    // In the engine FIFO at most once.
    queued: AtomicBool,
    // Exactly one worker pumps at a time.
    working: AtomicBool,
    disposed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        identity: impl Into<String>,
        callback: SubscriptionCallback,
        max_messages: usize,
    ) -> Self {
        Self {
            identity: identity.into(),
            cursors: Mutex::new(Vec::new()),
            callback,
            max_messages,
            queued: AtomicBool::new(false),
            working: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn identity(&self) -> &str {
        &self.identity
    }

    /// Append a cursor for `key` unless one exists; true if appended.
    pub(crate) fn add_or_update_cursor(&self, key: &str, id: u64, topic: Weak<Topic>) -> bool {
        let mut cursors = self.lock_cursors();
        if cursors.iter().any(|cursor| cursor.key == key) {
            return false;
        }
        cursors.push(Cursor {
            key: key.to_string(),
            id,
            topic,
        });
        true
    }

    /// Set the id of an existing cursor; false if `key` has none.
    pub(crate) fn update_cursor(&self, key: &str, id: u64) -> bool {
        let mut cursors = self.lock_cursors();
        match cursors.iter_mut().find(|cursor| cursor.key == key) {
            Some(cursor) => {
                cursor.id = id;
                true
            }
            None => false,
        }
    }

    /// Attach a topic handle to an existing cursor for `key`.
    pub(crate) fn set_cursor_topic(&self, key: &str, topic: Weak<Topic>) {
        let mut cursors = self.lock_cursors();
        if let Some(cursor) = cursors.iter_mut().find(|cursor| cursor.key == key) {
            cursor.topic = topic;
        }
    }

    /// Drop all cursors for `key`.
    pub(crate) fn remove_cursor(&self, key: &str) {
        self.lock_cursors().retain(|cursor| cursor.key != key);
    }

    pub(crate) fn cursor_keys(&self) -> Vec<String> {
        self.lock_cursors()
            .iter()
            .map(|cursor| cursor.key.clone())
            .collect()
    }

    /// Serialize the current cursor list to its opaque string form.
    pub(crate) fn current_cursor(&self) -> String {
        let cursors = self.lock_cursors();
        strobe_cursor::encode(cursors.iter().map(|cursor| (cursor.key.as_str(), cursor.id)))
    }

    /// True if this call transitioned queued 0→1.
    pub(crate) fn set_queued(&self) -> bool {
        !self.queued.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn unset_queued(&self) {
        self.queued.store(false, Ordering::Release);
    }

    fn set_working(&self) -> bool {
        !self.working.swap(true, Ordering::AcqRel)
    }

    fn unset_working(&self) {
        self.working.store(false, Ordering::Release);
    }

    /// Idempotent; true if this call transitioned to disposed.
    pub(crate) fn dispose(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Pump entry point. Returns immediately when another worker already
    /// owns the pump; otherwise drains until no batch is produced, the
    /// callback stops the subscription, or the callback faults.
    pub(crate) async fn work(&self, topics: &TopicRegistry) -> anyhow::Result<()> {
        if !self.set_working() {
            return Ok(());
        }
        let outcome = self.drain(topics).await;
        self.unset_working();
        outcome
    }

    async fn drain(&self, topics: &TopicRegistry) -> anyhow::Result<()> {
        loop {
            if self.is_disposed() {
                return Ok(());
            }
            // Drain against a clone so cursor mutations stay serialized by
            // the lock while the stores are read without holding it.
            let mut cursors = self.lock_cursors().clone();
            let mut items: Vec<Message> = Vec::new();
            for cursor in &mut cursors {
                let Some(topic) = cursor.resolve_topic(topics) else {
                    continue;
                };
                let read = topic.store().read_from(cursor.id, self.max_messages);
                let next = read.first_id + read.messages.len() as u64;
                // max() keeps the id non-decreasing even when the store's
                // high watermark sits below a foreign cursor value.
                cursor.id = cursor.id.max(next);
                items.extend(read.messages);
            }
            let next_cursor =
                strobe_cursor::encode(cursors.iter().map(|cursor| (cursor.key.as_str(), cursor.id)));
            if items.is_empty() {
                return Ok(());
            }
            *self.lock_cursors() = cursors;
            let batch = MessageResult::batch(items, next_cursor);
            if (self.callback)(batch).await? {
                continue;
            }
            // The callback asked to stop: dispose and hand the caller its
            // final position.
            if self.dispose() {
                self.invoke_terminal().await;
            }
            return Ok(());
        }
    }

    /// Deliver the cursor-only terminal result. Called exactly once, by
    /// whichever path performed the dispose transition.
    pub(crate) async fn invoke_terminal(&self) {
        let result = MessageResult::terminal(self.current_cursor());
        if let Err(error) = (self.callback)(result).await {
            tracing::debug!(identity = %self.identity, %error, "terminal delivery failed");
        }
    }

    fn lock_cursors(&self) -> MutexGuard<'_, Vec<Cursor>> {
        self.cursors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for Subscription {}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Hash for Subscription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}
