// In-process message bus core for real-time signaling. Publishers append
// keyed messages to per-topic ring buffers; subscriptions drain ordered
// batches through asynchronous callbacks, resumable from an opaque cursor
// string after a brief disconnect.
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub mod config;
pub mod counters;
pub mod store;

mod engine;
mod subscription;
mod topic;

pub use config::BusConfig;
pub use strobe_cursor as cursor;
pub use subscription::SubscriptionCallback;

use counters::{BusCounters, CounterSink, NoopCounterSink};
use engine::Engine;
use subscription::Subscription;
use topic::TopicRegistry;

pub type Result<T> = std::result::Result<T, BusError>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("message store capacity must be nonzero")]
    InvalidStoreCapacity,
    #[error("worker limits invalid (max {max_workers}, idle {max_idle_workers})")]
    InvalidWorkerLimits {
        max_workers: usize,
        max_idle_workers: usize,
    },
}

/// A published message: an uninterpreted payload bound to a topic key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub key: Arc<str>,
    pub payload: Bytes,
}

impl Message {
    pub fn new(key: impl Into<Arc<str>>, payload: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }
}

/// One delivery to a subscription callback: the concatenated batch, the
/// cursor string to resume from, and whether this is the final (cursor-only)
/// delivery of a stopped subscription.
#[derive(Debug, Clone)]
pub struct MessageResult {
    pub messages: Vec<Message>,
    pub cursor: String,
    pub total_count: usize,
    pub terminal: bool,
}

impl MessageResult {
    pub(crate) fn batch(messages: Vec<Message>, cursor: String) -> Self {
        let total_count = messages.len();
        Self {
            messages,
            cursor,
            total_count,
            terminal: false,
        }
    }

    pub(crate) fn terminal(cursor: String) -> Self {
        Self {
            messages: Vec::new(),
            cursor,
            total_count: 0,
            terminal: true,
        }
    }
}

/// The read side the bus consumes: a stable identity plus the topic keys
/// currently of interest. Interest changes after subscribing go through
/// [`SubscriptionHandle::add_key`] and [`SubscriptionHandle::remove_key`].
pub trait Subscriber: Send + Sync {
    /// Stable for the subscriber's lifetime; used for equality and
    /// per-topic dedupe (case-insensitive).
    fn identity(&self) -> &str;

    fn event_keys(&self) -> Vec<String>;
}

/// The message bus.
///
/// Must be created inside a Tokio runtime: pump workers and the idle
/// poller run as spawned tasks.
///
/// ```
/// use bytes::Bytes;
/// use std::sync::Arc;
/// use strobe_bus::{Message, MessageBus, Subscriber, SubscriptionCallback};
///
/// struct Listener;
///
/// impl Subscriber for Listener {
///     fn identity(&self) -> &str {
///         "listener-1"
///     }
///
///     fn event_keys(&self) -> Vec<String> {
///         vec!["orders".to_string()]
///     }
/// }
///
/// let rt = tokio::runtime::Runtime::new().expect("rt");
/// rt.block_on(async {
///     let bus = MessageBus::new();
///     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
///     let callback: SubscriptionCallback = Arc::new(move |result| {
///         let tx = tx.clone();
///         Box::pin(async move {
///             tx.send(result).ok();
///             Ok(true)
///         })
///     });
///     let handle = bus.subscribe(&Listener, None, callback, 100);
///     bus.publish(Message::new("orders", Bytes::from_static(b"hello")));
///     let batch = rx.recv().await.expect("delivery");
///     assert_eq!(batch.messages[0].payload, Bytes::from_static(b"hello"));
///     handle.unsubscribe().await;
/// });
/// ```
pub struct MessageBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    topics: Arc<TopicRegistry>,
    engine: Engine,
    counters: Arc<BusCounters>,
}

impl Drop for BusInner {
    fn drop(&mut self) {
        // Parked workers retire once the ready queue closes.
        self.engine.close();
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default()).expect("default config is valid")
    }

    pub fn with_config(config: BusConfig) -> Result<Self> {
        Self::with_counters(config, &NoopCounterSink)
    }

    /// Build with a telemetry sink supplying the bus counters.
    pub fn with_counters(config: BusConfig, sink: &dyn CounterSink) -> Result<Self> {
        if config.message_store_capacity == 0 {
            return Err(BusError::InvalidStoreCapacity);
        }
        // A pool that retains no idle worker would retire each new worker
        // before it ever dequeues, stranding queued pumps.
        if config.max_workers == 0
            || config.max_idle_workers == 0
            || config.max_idle_workers > config.max_workers
        {
            return Err(BusError::InvalidWorkerLimits {
                max_workers: config.max_workers,
                max_idle_workers: config.max_idle_workers,
            });
        }
        let counters = Arc::new(BusCounters::resolve(sink));
        let topics = Arc::new(TopicRegistry::new(config.message_store_capacity));
        let engine = Engine::new(Arc::clone(&topics), Arc::clone(&counters), &config);
        Ok(Self {
            inner: Arc::new(BusInner {
                topics,
                engine,
                counters,
            }),
        })
    }

    /// Append to the topic's store and schedule every current subscriber.
    /// Never fails; a full ring overwrites its oldest messages.
    pub fn publish(&self, message: Message) {
        let topic = self.inner.topics.get_or_add(&message.key);
        topic.store().append(message);
        self.inner.counters.messages_published_total.increment();
        self.inner.counters.messages_published_per_sec.increment();
        metrics::counter!("bus_messages_published").increment(1);
        for subscription in topic.snapshot_subscriptions() {
            self.inner.engine.schedule(subscription);
        }
    }

    /// Register a subscription and schedule its first pump.
    ///
    /// With no cursor (or an unparseable one, which logs and falls back)
    /// the subscription starts at id 0 for each of the subscriber's event
    /// keys and receives whatever the retention windows still hold. With a
    /// cursor, the saved positions are restored; event keys the cursor
    /// does not mention anchor at their topic's current tail.
    pub fn subscribe(
        &self,
        subscriber: &dyn Subscriber,
        cursor: Option<&str>,
        callback: SubscriptionCallback,
        max_messages: usize,
    ) -> SubscriptionHandle {
        let subscription = Arc::new(Subscription::new(
            subscriber.identity(),
            callback,
            max_messages,
        ));
        let decoded = cursor.and_then(|raw| match cursor::decode(raw) {
            Ok(entries) => Some(entries),
            Err(error) => {
                tracing::debug!(
                    identity = %subscriber.identity(),
                    %error,
                    "invalid cursor string; starting fresh"
                );
                None
            }
        });
        let resuming = decoded.is_some();
        for key in subscriber.event_keys() {
            let topic = self.inner.topics.get_or_add(&key);
            // Resuming subscribers anchor unknown keys at the tail; fresh
            // ones receive the retained backlog.
            let start_id = if resuming { topic.store().count() } else { 0 };
            subscription.add_or_update_cursor(&key, start_id, Arc::downgrade(&topic));
            topic.add_subscription(&subscription);
        }
        if let Some(entries) = &decoded {
            for entry in entries {
                let topic = self.inner.topics.get_or_add(&entry.key);
                if subscription.update_cursor(&entry.key, entry.id) {
                    subscription.set_cursor_topic(&entry.key, Arc::downgrade(&topic));
                } else {
                    subscription.add_or_update_cursor(&entry.key, entry.id, Arc::downgrade(&topic));
                }
                topic.add_subscription(&subscription);
            }
        }
        self.inner.counters.subscribers_total.increment();
        self.inner.counters.subscribers_current.increment();
        self.inner.counters.subscribers_per_sec.increment();
        self.inner.engine.schedule(Arc::clone(&subscription));
        SubscriptionHandle {
            bus: Arc::clone(&self.inner),
            subscription,
            armed: true,
        }
    }

    /// Next message id for `key` as a decimal string; anchors a fresh
    /// subscription at the current tail without reading.
    pub fn cursor(&self, key: &str) -> String {
        match self.inner.topics.get(key) {
            Some(topic) => topic.store().count().to_string(),
            None => "0".to_string(),
        }
    }

    pub fn allocated_workers(&self) -> usize {
        self.inner.engine.allocated_workers()
    }

    pub fn busy_workers(&self) -> usize {
        self.inner.engine.busy_workers()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MessageBus {
    // Clones share the topic registry and worker engine.
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Owner's handle to a live subscription. Dropping it unsubscribes; prefer
/// [`SubscriptionHandle::unsubscribe`] to also await the terminal delivery.
pub struct SubscriptionHandle {
    bus: Arc<BusInner>,
    subscription: Arc<Subscription>,
    armed: bool,
}

impl SubscriptionHandle {
    /// Track a new topic key, anchored at the topic's current tail.
    pub fn add_key(&self, key: &str) {
        let topic = self.bus.topics.get_or_add(key);
        if !self
            .subscription
            .add_or_update_cursor(key, topic.store().count(), Arc::downgrade(&topic))
        {
            // Re-adding a known key resumes its existing position.
            self.subscription.set_cursor_topic(key, Arc::downgrade(&topic));
        }
        topic.add_subscription(&self.subscription);
    }

    /// Stop tracking a topic key.
    pub fn remove_key(&self, key: &str) {
        if let Some(topic) = self.bus.topics.get(key) {
            topic.remove_subscription(self.subscription.identity());
        }
        self.subscription.remove_cursor(key);
    }

    /// Detach from every topic, stop deliveries, and send the final
    /// cursor-only result so the caller can persist its position.
    pub async fn unsubscribe(mut self) {
        self.armed = false;
        self.teardown();
        if self.subscription.dispose() {
            self.subscription.invoke_terminal().await;
        }
    }

    fn teardown(&self) {
        for key in self.subscription.cursor_keys() {
            if let Some(topic) = self.bus.topics.get(&key) {
                topic.remove_subscription(self.subscription.identity());
            }
        }
        self.bus.counters.subscribers_current.decrement();
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.teardown();
        if self.subscription.dispose() {
            let subscription = Arc::clone(&self.subscription);
            // Best effort: the terminal delivery needs a runtime to run on.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    subscription.invoke_terminal().await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::{
        AtomicCounterSink, MESSAGES_PUBLISHED_TOTAL, SUBSCRIBERS_CURRENT, SUBSCRIBERS_TOTAL,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct TestSubscriber {
        identity: String,
        keys: Vec<String>,
    }

    impl TestSubscriber {
        fn new(identity: &str, keys: &[&str]) -> Self {
            Self {
                identity: identity.to_string(),
                keys: keys.iter().map(|key| key.to_string()).collect(),
            }
        }
    }

    impl Subscriber for TestSubscriber {
        fn identity(&self) -> &str {
            &self.identity
        }

        fn event_keys(&self) -> Vec<String> {
            self.keys.clone()
        }
    }

    fn forwarding_callback() -> (SubscriptionCallback, mpsc::UnboundedReceiver<MessageResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: SubscriptionCallback = Arc::new(move |result| {
            let tx = tx.clone();
            Box::pin(async move {
                tx.send(result).ok();
                Ok(true)
            })
        });
        (callback, rx)
    }

    async fn recv_soon(rx: &mut mpsc::UnboundedReceiver<MessageResult>) -> MessageResult {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timely delivery")
            .expect("channel open")
    }

    async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<MessageResult>) {
        let outcome = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(outcome.is_err(), "expected no further deliveries");
    }

    fn payloads(result: &MessageResult) -> Vec<&[u8]> {
        result
            .messages
            .iter()
            .map(|message| message.payload.as_ref())
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn backlog_round_trip() {
        let bus = MessageBus::new();
        for payload in ["a", "b", "c"] {
            bus.publish(Message::new("t", Bytes::from_static(payload.as_bytes())));
        }
        let (callback, mut rx) = forwarding_callback();
        let _handle = bus.subscribe(&TestSubscriber::new("conn-1", &["t"]), None, callback, 100);
        let batch = recv_soon(&mut rx).await;
        assert_eq!(payloads(&batch), vec![b"a" as &[u8], b"b", b"c"]);
        assert_eq!(batch.cursor, "t,0000000000000003");
        assert_eq!(batch.total_count, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn resume_from_cursor() {
        let bus = MessageBus::new();
        for payload in ["a", "b", "c"] {
            bus.publish(Message::new("t", Bytes::from_static(payload.as_bytes())));
        }
        let (callback, mut rx) = forwarding_callback();
        let _handle = bus.subscribe(
            &TestSubscriber::new("conn-2", &["t"]),
            Some("t,0000000000000001"),
            callback,
            100,
        );
        let batch = recv_soon(&mut rx).await;
        assert_eq!(payloads(&batch), vec![b"b" as &[u8], b"c"]);
        assert_eq!(batch.cursor, "t,0000000000000003");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn invalid_cursor_falls_back_to_backlog() {
        let bus = MessageBus::new();
        bus.publish(Message::new("t", Bytes::from_static(b"a")));
        let (callback, mut rx) = forwarding_callback();
        let _handle = bus.subscribe(
            &TestSubscriber::new("conn-1", &["t"]),
            Some("t\\"),
            callback,
            100,
        );
        let batch = recv_soon(&mut rx).await;
        assert_eq!(payloads(&batch), vec![b"a" as &[u8]]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_topics_drain_in_cursor_order() {
        let bus = MessageBus::new();
        bus.publish(Message::new("x", Bytes::from_static(b"x0")));
        bus.publish(Message::new("y", Bytes::from_static(b"y0")));
        bus.publish(Message::new("x", Bytes::from_static(b"x1")));
        let (callback, mut rx) = forwarding_callback();
        let _handle = bus.subscribe(
            &TestSubscriber::new("conn-1", &["x", "y"]),
            None,
            callback,
            100,
        );
        let batch = recv_soon(&mut rx).await;
        // Per-topic slices are contiguous and ordered within the batch.
        assert_eq!(payloads(&batch), vec![b"x0" as &[u8], b"x1", b"y0"]);
        assert_eq!(batch.cursor, "x,0000000000000002|y,0000000000000001");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn live_publish_reaches_existing_subscriber() {
        let bus = MessageBus::new();
        let (callback, mut rx) = forwarding_callback();
        let _handle = bus.subscribe(&TestSubscriber::new("conn-1", &["t"]), None, callback, 100);
        bus.publish(Message::new("t", Bytes::from_static(b"live")));
        let batch = recv_soon(&mut rx).await;
        assert_eq!(payloads(&batch), vec![b"live" as &[u8]]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stop_callback_gets_one_batch_and_terminal() {
        let bus = MessageBus::new();
        bus.publish(Message::new("t", Bytes::from_static(b"a")));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callback: SubscriptionCallback = Arc::new(move |result: MessageResult| {
            let tx = tx.clone();
            Box::pin(async move {
                let keep_going = result.terminal;
                tx.send(result).ok();
                Ok(keep_going)
            })
        });
        let _handle = bus.subscribe(&TestSubscriber::new("conn-1", &["t"]), None, callback, 100);
        let first = recv_soon(&mut rx).await;
        assert!(!first.terminal);
        assert_eq!(first.total_count, 1);
        let terminal = recv_soon(&mut rx).await;
        assert!(terminal.terminal);
        assert!(terminal.messages.is_empty());
        assert_eq!(terminal.cursor, "t,0000000000000001");
        // The stopped subscription stays silent from here on.
        bus.publish(Message::new("t", Bytes::from_static(b"b")));
        assert_silent(&mut rx).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unsubscribe_delivers_terminal_once() {
        let bus = MessageBus::new();
        bus.publish(Message::new("t", Bytes::from_static(b"a")));
        let (callback, mut rx) = forwarding_callback();
        let handle = bus.subscribe(&TestSubscriber::new("conn-1", &["t"]), None, callback, 100);
        let batch = recv_soon(&mut rx).await;
        assert!(!batch.terminal);
        handle.unsubscribe().await;
        let terminal = recv_soon(&mut rx).await;
        assert!(terminal.terminal);
        assert_eq!(terminal.cursor, "t,0000000000000001");
        bus.publish(Message::new("t", Bytes::from_static(b"b")));
        assert_silent(&mut rx).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ring_wrap_delivers_contiguous_suffix() {
        let config = BusConfig {
            message_store_capacity: 5,
            ..BusConfig::default()
        };
        let bus = MessageBus::with_config(config).expect("config");
        for index in 0..8u8 {
            bus.publish(Message::new("t", vec![index]));
        }
        let (callback, mut rx) = forwarding_callback();
        let _handle = bus.subscribe(&TestSubscriber::new("conn-1", &["t"]), None, callback, 100);
        let batch = recv_soon(&mut rx).await;
        let seen: Vec<u8> = batch.messages.iter().map(|m| m.payload[0]).collect();
        assert_eq!(seen, vec![3, 4, 5, 6, 7]);
        assert_eq!(batch.cursor, "t,0000000000000008");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn burst_coalesces_without_loss() {
        let bus = MessageBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callback: SubscriptionCallback = Arc::new(move |result: MessageResult| {
            let tx = tx.clone();
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                tx.send(result).ok();
                Ok(true)
            })
        });
        let _handle = bus.subscribe(&TestSubscriber::new("conn-1", &["t"]), None, callback, 100);
        for index in 0..200u8 {
            bus.publish(Message::new("t", vec![index]));
        }
        let mut seen: Vec<u8> = Vec::new();
        while seen.len() < 200 {
            let batch = recv_soon(&mut rx).await;
            for message in &batch.messages {
                seen.push(message.payload[0]);
            }
        }
        // Every message exactly once, in order, across coalesced batches.
        assert_eq!(seen, (0..200u8).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn dynamic_keys_follow_interest() {
        let bus = MessageBus::new();
        let (callback, mut rx) = forwarding_callback();
        let handle = bus.subscribe(&TestSubscriber::new("conn-1", &["x"]), None, callback, 100);
        bus.publish(Message::new("y", Bytes::from_static(b"before")));
        handle.add_key("y");
        // Interest added at the tail: the earlier publish is not replayed.
        bus.publish(Message::new("y", Bytes::from_static(b"after")));
        let batch = recv_soon(&mut rx).await;
        assert_eq!(payloads(&batch), vec![b"after" as &[u8]]);
        handle.remove_key("y");
        bus.publish(Message::new("y", Bytes::from_static(b"gone")));
        assert_silent(&mut rx).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cursor_reports_next_id_as_decimal() {
        let bus = MessageBus::new();
        assert_eq!(bus.cursor("t"), "0");
        for _ in 0..3 {
            bus.publish(Message::new("t", Bytes::from_static(b"m")));
        }
        assert_eq!(bus.cursor("t"), "3");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn counters_track_publishes_and_subscribers() {
        let sink = AtomicCounterSink::new();
        let bus = MessageBus::with_counters(BusConfig::default(), &sink).expect("config");
        bus.publish(Message::new("t", Bytes::from_static(b"a")));
        bus.publish(Message::new("t", Bytes::from_static(b"b")));
        let (callback, mut rx) = forwarding_callback();
        let handle = bus.subscribe(&TestSubscriber::new("conn-1", &["t"]), None, callback, 100);
        recv_soon(&mut rx).await;
        assert_eq!(sink.value(MESSAGES_PUBLISHED_TOTAL), 2);
        assert_eq!(sink.value(SUBSCRIBERS_TOTAL), 1);
        assert_eq!(sink.value(SUBSCRIBERS_CURRENT), 1);
        handle.unsubscribe().await;
        assert_eq!(sink.value(SUBSCRIBERS_CURRENT), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn worker_counts_stay_observable_and_bounded() {
        let bus = MessageBus::new();
        let (callback, mut rx) = forwarding_callback();
        let _handle = bus.subscribe(&TestSubscriber::new("conn-1", &["t"]), None, callback, 100);
        bus.publish(Message::new("t", Bytes::from_static(b"m")));
        recv_soon(&mut rx).await;
        let max_workers = BusConfig::default().max_workers;
        assert!(bus.allocated_workers() >= 1);
        assert!(bus.allocated_workers() <= max_workers);
        assert!(bus.busy_workers() <= bus.allocated_workers() + 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn dropping_handle_unsubscribes() {
        let bus = MessageBus::new();
        let received = Arc::new(AtomicBool::new(false));
        let callback: SubscriptionCallback = {
            let received = Arc::clone(&received);
            Arc::new(move |result: MessageResult| {
                let received = Arc::clone(&received);
                Box::pin(async move {
                    if !result.terminal {
                        received.store(true, Ordering::SeqCst);
                    }
                    Ok(true)
                })
            })
        };
        {
            let _handle =
                bus.subscribe(&TestSubscriber::new("conn-1", &["t"]), None, callback, 100);
        }
        bus.publish(Message::new("t", Bytes::from_static(b"m")));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!received.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn duplicate_identity_subscribes_once_per_topic() {
        let bus = MessageBus::new();
        let (callback_a, mut rx_a) = forwarding_callback();
        let _first = bus.subscribe(&TestSubscriber::new("conn-1", &["t"]), None, callback_a, 100);
        let (callback_b, mut rx_b) = forwarding_callback();
        let _second = bus.subscribe(&TestSubscriber::new("CONN-1", &["t"]), None, callback_b, 100);
        // Let both initial pumps drain before the topic sees traffic; the
        // rejected duplicate is never scheduled again afterwards.
        tokio::time::sleep(Duration::from_millis(200)).await;
        bus.publish(Message::new("t", Bytes::from_static(b"m")));
        let batch = recv_soon(&mut rx_a).await;
        assert_eq!(batch.total_count, 1);
        assert_silent(&mut rx_b).await;
    }

    #[test]
    fn config_validation_rejects_bad_limits() {
        // Validation short-circuits before anything is spawned, so no
        // runtime is required on the error paths.
        let zero_capacity = BusConfig {
            message_store_capacity: 0,
            ..BusConfig::default()
        };
        assert!(matches!(
            MessageBus::with_config(zero_capacity),
            Err(BusError::InvalidStoreCapacity)
        ));
        let bad_workers = BusConfig {
            max_workers: 2,
            max_idle_workers: 5,
            ..BusConfig::default()
        };
        assert!(matches!(
            MessageBus::with_config(bad_workers),
            Err(BusError::InvalidWorkerLimits { .. })
        ));
    }
}
