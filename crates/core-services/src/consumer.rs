//! The event consumer contract shared by the three backends.

use async_trait::async_trait;
use messaging::{Channel, Event, Message};
use serde::de::DeserializeOwned;

use crate::{Result, ServiceError};

/// Applies events from one channel to a backend's storage.
///
/// Implementations must be idempotent in effect: a CREATE for an existing
/// key fails with [`ServiceError::InvalidInput`] and a DELETE for an absent
/// key succeeds without changes.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Returns the name of this consumer, used in logs and metrics.
    fn name(&self) -> &'static str;

    /// The channel this consumer reads.
    fn channel(&self) -> Channel;

    /// Handles a single message.
    async fn handle(&self, message: &Message) -> Result<()>;
}

/// Reads a message body as an event keyed by product id.
pub fn decode_event<T: DeserializeOwned>(message: &Message) -> Result<Event<i32, T>> {
    message
        .decode()
        .map_err(|e| ServiceError::Malformed(e.to_string()))
}

/// Takes the entity out of a CREATE event.
///
/// The entity's owning product, as read by `owner`, must equal the event key:
/// the key picks the partition that orders the entity's later DELETE.
pub fn require_data<T>(event: Event<i32, T>, owner: impl FnOnce(&T) -> i32) -> Result<T> {
    let key = *event.key();
    let data = event.into_data().ok_or_else(|| {
        ServiceError::Processing(format!("CREATE event without data for key {key}"))
    })?;

    let product_id = owner(&data);
    if product_id != key {
        return Err(ServiceError::InvalidInput(format!(
            "Event key {key} does not match productId: {product_id}"
        )));
    }
    Ok(data)
}
