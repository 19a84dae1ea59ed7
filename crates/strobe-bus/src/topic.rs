// Named topics and the registry that owns them. A topic pairs a message
// store with its subscriber set; the registry creates topics lazily and
// never removes them.
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::store::MessageStore;
use crate::subscription::Subscription;

pub(crate) struct Topic {
    key: Arc<str>,
    store: MessageStore,
    // Subscriber list and identity set share one lock: publishers snapshot
    // under the read lock, subscribe/unsubscribe take the write lock.
    state: RwLock<TopicSubscriptions>,
}

#[derive(Default)]
struct TopicSubscriptions {
    // Ordered so scheduling visits subscribers in registration order.
    list: Vec<Weak<Subscription>>,
    // Case-insensitive identity set enforcing at-most-once membership.
    identities: HashSet<String>,
}

impl Topic {
    fn new(key: Arc<str>, store_capacity: usize) -> Self {
        Self {
            key,
            store: MessageStore::new(store_capacity),
            state: RwLock::new(TopicSubscriptions::default()),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Add a subscription; false if one with the same identity is present.
    pub(crate) fn add_subscription(&self, subscription: &Arc<Subscription>) -> bool {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !state
            .identities
            .insert(subscription.identity().to_lowercase())
        {
            return false;
        }
        state.list.push(Arc::downgrade(subscription));
        true
    }

    /// Remove by identity; false if absent. Dead weak references are
    /// dropped opportunistically while scanning.
    pub(crate) fn remove_subscription(&self, identity: &str) -> bool {
        let needle = identity.to_lowercase();
        let mut state = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !state.identities.remove(&needle) {
            return false;
        }
        state.list.retain(|weak| match weak.upgrade() {
            Some(subscription) => subscription.identity().to_lowercase() != needle,
            None => false,
        });
        true
    }

    /// Snapshot the live subscriptions under the read lock.
    pub(crate) fn snapshot_subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

pub(crate) struct TopicRegistry {
    topics: DashMap<String, Arc<Topic>>,
    store_capacity: usize,
}

impl TopicRegistry {
    pub(crate) fn new(store_capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            store_capacity,
        }
    }

    /// Get-or-create: concurrent callers for one key observe one topic.
    pub(crate) fn get_or_add(&self, key: &str) -> Arc<Topic> {
        if let Some(existing) = self.topics.get(key) {
            return Arc::clone(existing.value());
        }
        self.topics
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Topic::new(Arc::from(key), self.store_capacity)))
            .clone()
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<Topic>> {
        self.topics.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn for_each(&self, mut visit: impl FnMut(&Arc<Topic>)) {
        for entry in self.topics.iter() {
            visit(entry.value());
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.topics.len()
    }
}
