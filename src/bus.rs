//! Topic-keyed publish/subscribe with bounded replay
//!
//! Topics are structured keys, never concatenated strings. Each topic keeps a
//! FIFO of the most recent events up to its replay depth; late subscribers
//! get that history before any live event. Delivery is synchronous and in
//! subscriber-registration order, which is what gives one topic its strict
//! publish ordering.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Subscriber callback. Live events arrive as one-element slices; a replay
/// snapshot arrives as a single chronological batch.
pub type Handler<E> = Box<dyn FnMut(&[E]) + Send>;

/// Proof of one subscription, required to unsubscribe.
///
/// Replaces handler-identity lookup: the bus never needs to compare
/// callbacks, only ids.
#[derive(Debug)]
pub struct SubscriptionHandle<T> {
    topic: T,
    id: u64,
}

impl<T> SubscriptionHandle<T> {
    pub fn topic(&self) -> &T {
        &self.topic
    }
}

struct Topic<E> {
    depth: usize,
    /// Scoped topics belong to one consumer connection and may be purged
    /// wholesale when it dies.
    scoped: bool,
    history: VecDeque<E>,
    subscribers: Vec<(u64, Handler<E>)>,
}

impl<E> Topic<E> {
    fn new(depth: usize, scoped: bool) -> Self {
        Self {
            depth,
            scoped,
            history: VecDeque::new(),
            subscribers: Vec::new(),
        }
    }
}

/// Publish/subscribe bus over structured topic keys
pub struct EventBus<T, E> {
    topics: HashMap<T, Topic<E>>,
    next_subscription: u64,
}

impl<T, E> Default for EventBus<T, E>
where
    T: Eq + Hash + Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> EventBus<T, E>
where
    T: Eq + Hash + Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
            next_subscription: 0,
        }
    }

    /// Open a broadcast topic with a fixed replay depth.
    ///
    /// Opening an existing topic is a no-op so that replay history survives
    /// producer reconnects.
    pub fn open_topic(&mut self, key: T, depth: usize) {
        self.topics
            .entry(key)
            .or_insert_with(|| Topic::new(depth, false));
    }

    /// Open (or reuse) a per-connection scoped topic
    pub fn open_scoped_topic(&mut self, key: T, depth: usize) {
        self.topics
            .entry(key)
            .or_insert_with(|| Topic::new(depth, true));
    }

    pub fn has_topic(&self, key: &T) -> bool {
        self.topics.contains_key(key)
    }

    pub fn history_len(&self, key: &T) -> usize {
        self.topics.get(key).map_or(0, |t| t.history.len())
    }

    /// Append to the topic's bounded history, then deliver synchronously to
    /// every current subscriber in registration order. Publishing to a topic
    /// nobody opened creates it with no replay.
    pub fn publish(&mut self, key: &T, event: E) {
        let topic = self
            .topics
            .entry(key.clone())
            .or_insert_with(|| Topic::new(0, false));

        if topic.depth > 0 {
            if topic.history.len() == topic.depth {
                topic.history.pop_front();
            }
            topic.history.push_back(event.clone());
        }

        for (_, handler) in topic.subscribers.iter_mut() {
            handler(std::slice::from_ref(&event));
        }
    }

    /// Replay buffered history to `handler`, then register it for future
    /// publishes. With `want_snapshot` set, more than one buffered event is
    /// delivered as a single batched call; otherwise events are replayed
    /// individually in chronological order.
    pub fn subscribe(
        &mut self,
        key: T,
        want_snapshot: bool,
        mut handler: Handler<E>,
    ) -> SubscriptionHandle<T> {
        let topic = self
            .topics
            .entry(key.clone())
            .or_insert_with(|| Topic::new(0, false));

        if !topic.history.is_empty() {
            let replay: Vec<E> = topic.history.iter().cloned().collect();
            if want_snapshot && replay.len() > 1 {
                handler(&replay);
            } else {
                for event in &replay {
                    handler(std::slice::from_ref(event));
                }
            }
        }

        let id = self.next_subscription;
        self.next_subscription += 1;
        topic.subscribers.push((id, handler));

        SubscriptionHandle { topic: key, id }
    }

    /// Remove a subscription. With `purge` set, a scoped topic is dropped
    /// entirely, history included, reclaiming memory tied to a dead
    /// connection. Broadcast topics ignore `purge`.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle<T>, purge: bool) {
        let Some(topic) = self.topics.get_mut(&handle.topic) else {
            return;
        };

        topic.subscribers.retain(|(id, _)| *id != handle.id);

        if purge && topic.scoped {
            self.topics.remove(&handle.topic);
        }
    }

    /// Drop a scoped topic outright, history and subscribers included.
    /// Broadcast topics are left alone.
    pub fn purge_scoped(&mut self, key: &T) {
        if self.topics.get(key).is_some_and(|t| t.scoped) {
            self.topics.remove(key);
        }
    }

    pub fn subscriber_count(&self, key: &T) -> usize {
        self.topics.get(key).map_or(0, |t| t.subscribers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<Vec<u32>>>>;

    fn collector(log: &Log) -> Handler<u32> {
        let log = Arc::clone(log);
        Box::new(move |events| log.lock().unwrap().push(events.to_vec()))
    }

    fn flat(log: &Log) -> Vec<u32> {
        log.lock().unwrap().iter().flatten().copied().collect()
    }

    #[test]
    fn test_history_keeps_last_k_in_order() {
        let mut bus: EventBus<&str, u32> = EventBus::new();
        bus.open_topic("log", 3);

        for n in 1..=5 {
            bus.publish(&"log", n);
        }

        let log: Log = Default::default();
        bus.subscribe("log", false, collector(&log));
        assert_eq!(flat(&log), vec![3, 4, 5]);
    }

    #[test]
    fn test_history_shorter_than_depth() {
        let mut bus: EventBus<&str, u32> = EventBus::new();
        bus.open_topic("log", 10);
        bus.publish(&"log", 1);
        bus.publish(&"log", 2);

        assert_eq!(bus.history_len(&"log"), 2);
    }

    #[test]
    fn test_depth_zero_keeps_no_history() {
        let mut bus: EventBus<&str, u32> = EventBus::new();
        bus.publish(&"log", 1);

        assert_eq!(bus.history_len(&"log"), 0);

        let log: Log = Default::default();
        bus.subscribe("log", true, collector(&log));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_replay_precedes_live_events() {
        let mut bus: EventBus<&str, u32> = EventBus::new();
        bus.open_topic("log", 4);
        bus.publish(&"log", 1);
        bus.publish(&"log", 2);

        let log: Log = Default::default();
        bus.subscribe("log", false, collector(&log));
        bus.publish(&"log", 3);

        assert_eq!(flat(&log), vec![1, 2, 3]);
        // Individual replay calls, not a batch
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_snapshot_replay_is_one_batch() {
        let mut bus: EventBus<&str, u32> = EventBus::new();
        bus.open_topic("log", 4);
        bus.publish(&"log", 1);
        bus.publish(&"log", 2);

        let log: Log = Default::default();
        bus.subscribe("log", true, collector(&log));

        assert_eq!(log.lock().unwrap().as_slice(), &[vec![1, 2]]);
    }

    #[test]
    fn test_single_buffered_event_is_not_batched() {
        let mut bus: EventBus<&str, u32> = EventBus::new();
        bus.open_topic("log", 4);
        bus.publish(&"log", 1);

        let log: Log = Default::default();
        bus.subscribe("log", true, collector(&log));

        assert_eq!(log.lock().unwrap().as_slice(), &[vec![1]]);
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let mut bus: EventBus<&str, u32> = EventBus::new();
        let order: Arc<Mutex<Vec<&'static str>>> = Default::default();

        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe("log", false, Box::new(move |_| order.lock().unwrap().push(name)));
        }

        bus.publish(&"log", 1);
        assert_eq!(
            order.lock().unwrap().as_slice(),
            &["first", "second", "third"]
        );
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus: EventBus<&str, u32> = EventBus::new();
        let log: Log = Default::default();

        let handle = bus.subscribe("log", false, collector(&log));
        bus.publish(&"log", 1);
        bus.unsubscribe(handle, false);
        bus.publish(&"log", 2);

        assert_eq!(flat(&log), vec![1]);
    }

    #[test]
    fn test_purge_drops_scoped_topic_and_history() {
        let mut bus: EventBus<&str, u32> = EventBus::new();
        bus.open_scoped_topic("scoped", 1);
        bus.publish(&"scoped", 9);

        let log: Log = Default::default();
        let handle = bus.subscribe("scoped", false, collector(&log));
        bus.unsubscribe(handle, true);

        assert!(!bus.has_topic(&"scoped"));
    }

    #[test]
    fn test_purge_is_ignored_for_broadcast_topics() {
        let mut bus: EventBus<&str, u32> = EventBus::new();
        bus.open_topic("log", 2);
        bus.publish(&"log", 1);

        let log: Log = Default::default();
        let handle = bus.subscribe("log", false, collector(&log));
        bus.unsubscribe(handle, true);

        assert!(bus.has_topic(&"log"));
        assert_eq!(bus.history_len(&"log"), 1);
    }

    #[test]
    fn test_purge_scoped_by_key() {
        let mut bus: EventBus<&str, u32> = EventBus::new();
        bus.open_scoped_topic("scoped", 1);
        bus.publish(&"scoped", 9);
        bus.open_topic("log", 1);
        bus.publish(&"log", 1);

        bus.purge_scoped(&"scoped");
        bus.purge_scoped(&"log");

        assert!(!bus.has_topic(&"scoped"));
        assert!(bus.has_topic(&"log"));
    }

    #[test]
    fn test_reopen_preserves_history() {
        let mut bus: EventBus<&str, u32> = EventBus::new();
        bus.open_topic("log", 2);
        bus.publish(&"log", 1);
        bus.open_topic("log", 5);

        assert_eq!(bus.history_len(&"log"), 1);

        // Depth is fixed at first open
        bus.publish(&"log", 2);
        bus.publish(&"log", 3);
        assert_eq!(bus.history_len(&"log"), 2);
    }
}
