use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::event::Event;
use crate::message::Message;
use crate::{MessagingError, Result};

/// Hands messages to named channels.
///
/// Implementations route on the message's partition key so that messages
/// sharing a key are delivered in publish order. `publish` reports failure
/// instead of retrying; retry belongs to the caller or the channel.
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Enqueues one message on `channel`.
    async fn publish(&self, channel: &str, message: Message) -> Result<()>;
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    async fn publish(&self, channel: &str, message: Message) -> Result<()> {
        (**self).publish(channel, message).await
    }
}

/// Extension trait providing event-level convenience methods for publishers.
#[async_trait]
pub trait PublisherExt: Publisher {
    /// Serializes `event` and publishes it keyed by `event.key()`.
    async fn publish_event<K, T>(&self, channel: &str, event: &Event<K, T>) -> Result<()>
    where
        K: Serialize + std::fmt::Display + Sync,
        T: Serialize + Sync,
    {
        let message = Message::from_event(event)?;
        self.publish(channel, message).await
    }

    /// Like [`publish_event`](Self::publish_event), but gives up after `timeout`.
    async fn publish_event_within<K, T>(
        &self,
        channel: &str,
        event: &Event<K, T>,
        timeout: Duration,
    ) -> Result<()>
    where
        K: Serialize + std::fmt::Display + Sync,
        T: Serialize + Sync,
    {
        let message = Message::from_event(event)?;
        self.publish_within(channel, message, timeout).await
    }

    /// Publishes an already built message, giving up after `timeout`.
    async fn publish_within(&self, channel: &str, message: Message, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.publish(channel, message))
            .await
            .map_err(|_| MessagingError::Timeout {
                channel: channel.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?
    }
}

// Blanket implementation for all Publisher implementations
impl<T: Publisher + ?Sized> PublisherExt for T {}
