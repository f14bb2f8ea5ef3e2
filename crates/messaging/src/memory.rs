use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::message::Message;
use crate::publisher::Publisher;
use crate::{MessagingError, Result};

/// Default number of partitions per channel.
pub const DEFAULT_PARTITION_COUNT: usize = 2;

/// Default number of unconsumed messages kept per partition.
pub const DEFAULT_BACKLOG_CAPACITY: usize = 1024;

/// Picks the partition for a key with a stable FNV-1a hash.
///
/// The same key always maps to the same partition for a given count.
pub fn select_partition(partition_key: &str, partition_count: usize) -> usize {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = partition_key
        .bytes()
        .fold(OFFSET_BASIS, |h, b| (h ^ u64::from(b)).wrapping_mul(PRIME));
    (hash % partition_count.max(1) as u64) as usize
}

#[derive(Default)]
struct Partition {
    /// Messages published while nobody was subscribed, with their global sequence.
    backlog: VecDeque<(u64, Message)>,
    subscribers: Vec<mpsc::UnboundedSender<Message>>,
}

struct ChannelState {
    partitions: Vec<Partition>,
}

impl ChannelState {
    fn new(partition_count: usize) -> Self {
        Self {
            partitions: (0..partition_count).map(|_| Partition::default()).collect(),
        }
    }
}

#[derive(Default)]
struct BrokerState {
    channels: HashMap<String, ChannelState>,
    /// Only populated when the broker was built [`with_history`](InMemoryBroker::with_history).
    history: Option<Vec<(String, Message)>>,
    unavailable: HashSet<String>,
    sequence: u64,
}

/// In-memory partitioned message broker for tests and single-process runs.
///
/// Each channel is split into a fixed number of partitions. A message goes to
/// the partition selected by its partition key, so messages with the same key
/// keep their publish order. Subscribers get one ordered receiver per
/// partition; without subscribers, messages are held in a backlog that can be
/// polled with [`receive`](Self::receive) or handed to the next subscriber.
///
/// Delivered messages are not retained. Each partition backlog keeps at most
/// `backlog_capacity` messages and drops the oldest beyond that. A publish
/// history is only kept when enabled with [`with_history`](Self::with_history).
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    partition_count: usize,
    backlog_capacity: usize,
}

impl InMemoryBroker {
    /// Creates a broker with [`DEFAULT_PARTITION_COUNT`] partitions per channel.
    pub fn new() -> Self {
        Self::with_partitions(DEFAULT_PARTITION_COUNT)
    }

    /// Creates a broker with `partition_count` partitions per channel (at least one).
    pub fn with_partitions(partition_count: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            partition_count: partition_count.max(1),
            backlog_capacity: DEFAULT_BACKLOG_CAPACITY,
        }
    }

    /// Records every successful publish, readable through [`history`](Self::history).
    ///
    /// Starts from empty broker state, so use it right after construction;
    /// clones made afterwards share the history.
    pub fn with_history(self) -> Self {
        let state = BrokerState {
            history: Some(Vec::new()),
            ..BrokerState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            ..self
        }
    }

    /// Caps every partition backlog at `capacity` messages (at least one).
    pub fn with_backlog_capacity(mut self, capacity: usize) -> Self {
        self.backlog_capacity = capacity.max(1);
        self
    }

    pub fn partition_count(&self) -> usize {
        self.partition_count
    }

    pub fn backlog_capacity(&self) -> usize {
        self.backlog_capacity
    }

    /// Messages waiting in the backlog of `channel`, across partitions.
    pub async fn backlog_len(&self, channel: &str) -> usize {
        self.state
            .lock()
            .await
            .channels
            .get(channel)
            .map(|c| c.partitions.iter().map(|p| p.backlog.len()).sum())
            .unwrap_or(0)
    }

    /// Makes `channel` refuse publishes, simulating a broker outage.
    pub async fn set_unavailable(&self, channel: &str, unavailable: bool) {
        let mut state = self.state.lock().await;
        if unavailable {
            state.unavailable.insert(channel.to_string());
        } else {
            state.unavailable.remove(channel);
        }
    }

    /// Subscribes to every partition of `channel`.
    ///
    /// Any backlog is handed to the new subscription first, in order.
    pub async fn subscribe(&self, channel: &str) -> Subscription {
        let mut guard = self.state.lock().await;
        let count = self.partition_count;
        let channel_state = guard
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| ChannelState::new(count));

        let mut partitions = Vec::with_capacity(count);
        for (index, partition) in channel_state.partitions.iter_mut().enumerate() {
            let (tx, rx) = mpsc::unbounded_channel();
            for (_, message) in partition.backlog.drain(..) {
                let _ = tx.send(message);
            }
            partition.subscribers.push(tx);
            partitions.push(PartitionReceiver {
                partition: index,
                receiver: rx,
            });
        }

        tracing::debug!(channel, partitions = count, "subscribed");
        Subscription {
            channel: channel.to_string(),
            partitions,
        }
    }

    /// Takes the oldest backlog message on `channel`, across partitions.
    pub async fn receive(&self, channel: &str) -> Option<Message> {
        let mut guard = self.state.lock().await;
        let channel_state = guard.channels.get_mut(channel)?;

        let oldest = channel_state
            .partitions
            .iter()
            .enumerate()
            .filter_map(|(index, p)| p.backlog.front().map(|(seq, _)| (index, *seq)))
            .min_by_key(|(_, seq)| *seq)
            .map(|(index, _)| index)?;

        channel_state.partitions[oldest]
            .backlog
            .pop_front()
            .map(|(_, message)| message)
    }

    /// Takes every backlog message on `channel`, oldest first.
    pub async fn drain(&self, channel: &str) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Some(message) = self.receive(channel).await {
            messages.push(message);
        }
        messages
    }

    /// Every successfully published message as `(channel, message)`, in publish order.
    ///
    /// Always empty unless the broker was built [`with_history`](Self::with_history).
    pub async fn history(&self) -> Vec<(String, Message)> {
        self.state.lock().await.history.clone().unwrap_or_default()
    }

    /// Published messages for one channel, in publish order.
    pub async fn history_for(&self, channel: &str) -> Vec<Message> {
        self.state
            .lock()
            .await
            .history
            .iter()
            .flatten()
            .filter(|(c, _)| c == channel)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Clears backlogs and history; subscriptions stay attached.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        if let Some(history) = state.history.as_mut() {
            history.clear();
        }
        for channel in state.channels.values_mut() {
            for partition in &mut channel.partitions {
                partition.backlog.clear();
            }
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for InMemoryBroker {
    async fn publish(&self, channel: &str, message: Message) -> Result<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if state.unavailable.contains(channel) {
            metrics::counter!("event_publish_failures_total", "channel" => channel.to_string())
                .increment(1);
            return Err(MessagingError::ChannelUnavailable {
                channel: channel.to_string(),
            });
        }

        let index = select_partition(message.partition_key().unwrap_or_default(), self.partition_count);
        state.sequence += 1;
        let sequence = state.sequence;
        if let Some(history) = state.history.as_mut() {
            history.push((channel.to_string(), message.clone()));
        }

        let count = self.partition_count;
        let partition = &mut state
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| ChannelState::new(count))
            .partitions[index];

        partition.subscribers.retain(|tx| !tx.is_closed());
        if partition.subscribers.is_empty() {
            if partition.backlog.len() >= self.backlog_capacity {
                partition.backlog.pop_front();
                metrics::counter!("events_dropped_total", "channel" => channel.to_string())
                    .increment(1);
                tracing::warn!(channel, partition = index, "backlog full, dropped oldest message");
            }
            partition.backlog.push_back((sequence, message));
        } else {
            for tx in &partition.subscribers {
                let _ = tx.send(message.clone());
            }
        }

        metrics::counter!("events_published_total", "channel" => channel.to_string()).increment(1);
        tracing::debug!(channel, partition = index, sequence, "message published");
        Ok(())
    }
}

/// A consumer's view of one channel: one receiver per partition.
pub struct Subscription {
    channel: String,
    partitions: Vec<PartitionReceiver>,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Splits the subscription so each partition can be consumed by its own worker.
    pub fn into_partitions(self) -> Vec<PartitionReceiver> {
        self.partitions
    }
}

/// Ordered stream of messages from one partition.
pub struct PartitionReceiver {
    partition: usize,
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl PartitionReceiver {
    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Waits for the next message; `None` once the broker is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Returns the next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(key: &str, n: i64) -> Message {
        Message::builder()
            .partition_key(key)
            .payload_raw(serde_json::json!({ "n": n }))
            .build()
            .unwrap()
    }

    #[test]
    fn partition_selection_is_stable_and_in_range() {
        for count in 1..8 {
            for key in ["1", "2", "42", "1000"] {
                let p = select_partition(key, count);
                assert!(p < count);
                assert_eq!(p, select_partition(key, count));
            }
        }
        assert_eq!(select_partition("anything", 0), 0);
    }

    #[tokio::test]
    async fn receive_returns_messages_in_publish_order_across_partitions() {
        let broker = InMemoryBroker::with_partitions(4);
        for (i, key) in ["1", "2", "3", "4", "1"].iter().enumerate() {
            broker.publish("products", message(key, i as i64)).await.unwrap();
        }

        let drained = broker.drain("products").await;
        let order: Vec<i64> = drained.iter().map(|m| m.payload["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert!(broker.receive("products").await.is_none());
    }

    #[tokio::test]
    async fn receive_on_unknown_channel_is_empty() {
        let broker = InMemoryBroker::new();
        assert!(broker.receive("nothing").await.is_none());
    }

    #[tokio::test]
    async fn unavailable_channel_rejects_publish() {
        let broker = InMemoryBroker::new().with_history();
        broker.set_unavailable("reviews", true).await;

        let result = broker.publish("reviews", message("1", 1)).await;
        assert!(matches!(result, Err(MessagingError::ChannelUnavailable { .. })));
        assert!(broker.history().await.is_empty());

        broker.set_unavailable("reviews", false).await;
        broker.publish("reviews", message("1", 2)).await.unwrap();
        assert_eq!(broker.history_for("reviews").await.len(), 1);
    }

    #[tokio::test]
    async fn same_key_lands_on_one_partition_in_order() {
        let broker = InMemoryBroker::with_partitions(3);
        let subscription = broker.subscribe("products").await;
        assert_eq!(subscription.partition_count(), 3);

        for n in 0..5 {
            broker.publish("products", message("7", n)).await.unwrap();
        }

        let expected = select_partition("7", 3);
        for mut receiver in subscription.into_partitions() {
            let mut seen = Vec::new();
            while let Some(m) = receiver.try_recv() {
                seen.push(m.payload["n"].as_i64().unwrap());
            }
            if receiver.partition() == expected {
                assert_eq!(seen, vec![0, 1, 2, 3, 4]);
            } else {
                assert!(seen.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn subscribe_hands_over_backlog() {
        let broker = InMemoryBroker::with_partitions(1);
        broker.publish("reviews", message("1", 1)).await.unwrap();
        broker.publish("reviews", message("1", 2)).await.unwrap();

        let mut receivers = broker.subscribe("reviews").await.into_partitions();
        let receiver = &mut receivers[0];
        assert_eq!(receiver.recv().await.unwrap().payload["n"], 1);
        assert_eq!(receiver.recv().await.unwrap().payload["n"], 2);
        assert!(broker.receive("reviews").await.is_none());
    }

    #[tokio::test]
    async fn dropped_subscription_falls_back_to_backlog() {
        let broker = InMemoryBroker::with_partitions(1);
        drop(broker.subscribe("products").await);

        broker.publish("products", message("1", 9)).await.unwrap();
        assert_eq!(broker.receive("products").await.unwrap().payload["n"], 9);
    }

    #[tokio::test]
    async fn clear_resets_history_and_backlog() {
        let broker = InMemoryBroker::new().with_history();
        broker.publish("products", message("1", 1)).await.unwrap();
        assert_eq!(broker.history().await.len(), 1);
        broker.clear().await;
        assert!(broker.history().await.is_empty());
        assert!(broker.receive("products").await.is_none());
    }

    #[tokio::test]
    async fn delivered_messages_are_not_retained() {
        let broker = InMemoryBroker::with_partitions(1);
        let mut receivers = broker.subscribe("products").await.into_partitions();

        for n in 0..1000 {
            broker.publish("products", message("1", n)).await.unwrap();
        }
        let mut consumed = 0;
        while receivers[0].try_recv().is_some() {
            consumed += 1;
        }

        assert_eq!(consumed, 1000);
        assert!(broker.history().await.is_empty());
        assert_eq!(broker.backlog_len("products").await, 0);
    }

    #[tokio::test]
    async fn backlog_drops_oldest_beyond_capacity() {
        let broker = InMemoryBroker::with_partitions(1).with_backlog_capacity(10);
        for n in 0..50 {
            broker.publish("products.dlq", message("1", n)).await.unwrap();
        }

        assert_eq!(broker.backlog_len("products.dlq").await, 10);
        let kept: Vec<i64> = broker
            .drain("products.dlq")
            .await
            .iter()
            .map(|m| m.payload["n"].as_i64().unwrap())
            .collect();
        assert_eq!(kept, (40..50).collect::<Vec<_>>());
    }
}
