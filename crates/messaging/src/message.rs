use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Event;
use crate::{MessagingError, Result};

/// Header carrying the ordering key; the broker routes on it.
pub const PARTITION_KEY_HEADER: &str = "partitionKey";

/// Unique identifier for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A serialized event plus transport headers, as it travels through a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this delivery unit.
    pub message_id: MessageId,

    /// Transport headers, including [`PARTITION_KEY_HEADER`].
    pub headers: HashMap<String, String>,

    /// The serialized event.
    pub payload: serde_json::Value,

    /// When the message was built.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a new message builder.
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Serializes `event` and sets its key as the partition key.
    pub fn from_event<K, T>(event: &Event<K, T>) -> Result<Self>
    where
        K: Serialize + std::fmt::Display,
        T: Serialize,
    {
        Message::builder()
            .partition_key(event.key().to_string())
            .header("eventType", event.event_type().to_string())
            .payload(event)?
            .build()
    }

    /// Returns the partition key header, if set.
    pub fn partition_key(&self) -> Option<&str> {
        self.header(PARTITION_KEY_HEADER)
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Deserializes the payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// The payload as JSON text, the form a consumer receives on the wire.
    pub fn payload_text(&self) -> String {
        self.payload.to_string()
    }
}

/// Builder for constructing messages.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    message_id: Option<MessageId>,
    headers: HashMap<String, String>,
    payload: Option<serde_json::Value>,
    timestamp: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    /// Sets the message ID. If not set, a new ID will be generated.
    pub fn message_id(mut self, id: MessageId) -> Self {
        self.message_id = Some(id);
        self
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the partition key header.
    pub fn partition_key(self, key: impl Into<String>) -> Self {
        self.header(PARTITION_KEY_HEADER, key)
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> std::result::Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Builds the message; the payload is required.
    pub fn build(self) -> Result<Message> {
        Ok(Message {
            message_id: self.message_id.unwrap_or_default(),
            headers: self.headers,
            payload: self.payload.ok_or(MessagingError::MissingField("payload"))?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use common::{ProductId, Recommendation};

    fn recommendation(product_id: i32) -> Recommendation {
        Recommendation {
            product_id,
            recommendation_id: 1,
            author: "a".into(),
            rate: 1,
            content: "c".into(),
            service_address: None,
        }
    }

    #[test]
    fn from_event_uses_owning_product_as_partition_key() {
        let key = ProductId::parse(12).unwrap();
        let event = Event::create(key, recommendation(12));
        let message = Message::from_event(&event).unwrap();
        assert_eq!(message.partition_key(), Some("12"));
        assert_eq!(message.header("eventType"), Some("CREATE"));
    }

    #[test]
    fn decode_returns_the_original_event() {
        let event = Event::create(5, recommendation(5));
        let message = Message::from_event(&event).unwrap();
        let decoded: Event<i32, Recommendation> = message.decode().unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.event_type(), EventType::Create);
    }

    #[test]
    fn build_without_payload_fails() {
        let result = Message::builder().partition_key("1").build();
        assert!(matches!(result, Err(MessagingError::MissingField("payload"))));
    }

    #[test]
    fn builder_keeps_explicit_fields() {
        let id = MessageId::new();
        let message = Message::builder()
            .message_id(id)
            .header("x", "y")
            .payload_raw(serde_json::json!({"k": 1}))
            .build()
            .unwrap();
        assert_eq!(message.message_id, id);
        assert_eq!(message.header("x"), Some("y"));
        assert_eq!(message.payload_text(), r#"{"k":1}"#);
        assert!(message.partition_key().is_none());
    }
}
