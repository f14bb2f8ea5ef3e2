//! The domain event: the unit of the write path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Intent carried by an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Create,
    Delete,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Create => f.write_str("CREATE"),
            EventType::Delete => f.write_str("DELETE"),
        }
    }
}

/// A create or delete intent for one backend entity.
///
/// `key` is the owning product's id for every entity type, so all events
/// touching one product land on the same ordered partition. `data` is
/// absent for [`EventType::Delete`].
///
/// Equality compares type, key and data only; `event_created_at` is ignored,
/// so two deliveries of the same intent compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event<K, T> {
    event_type: EventType,
    key: K,
    data: Option<T>,
    event_created_at: DateTime<Utc>,
}

impl<K, T> Event<K, T> {
    /// Creates an event stamped with the current time.
    pub fn new(event_type: EventType, key: K, data: Option<T>) -> Self {
        Self {
            event_type,
            key,
            data,
            event_created_at: Utc::now(),
        }
    }

    /// A CREATE event carrying the entity to create.
    pub fn create(key: K, data: T) -> Self {
        Self::new(EventType::Create, key, Some(data))
    }

    /// A DELETE event for everything owned by `key`.
    pub fn delete(key: K) -> Self {
        Self::new(EventType::Delete, key, None)
    }

    /// Overrides the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.event_created_at = created_at;
        self
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn event_created_at(&self) -> DateTime<Utc> {
        self.event_created_at
    }
}

impl<K: PartialEq, T: PartialEq> PartialEq for Event<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.event_type == other.event_type && self.key == other.key && self.data == other.data
    }
}

impl<K: Eq, T: Eq> Eq for Event<K, T> {}

const CREATED_AT_FIELD: &str = "eventCreatedAt";

/// Checks that a serialized event matches `expected` in everything but its
/// creation time.
///
/// Returns false when `json` is not a JSON object.
pub fn same_event_except_created_at<K, T>(json: &str, expected: &Event<K, T>) -> bool
where
    K: Serialize,
    T: Serialize,
{
    let Ok(mut actual) = serde_json::from_str::<serde_json::Value>(json) else {
        return false;
    };
    let Ok(mut expected) = serde_json::to_value(expected) else {
        return false;
    };

    match (actual.as_object_mut(), expected.as_object_mut()) {
        (Some(actual), Some(expected)) => {
            actual.remove(CREATED_AT_FIELD);
            expected.remove(CREATED_AT_FIELD);
            actual == expected
        }
        _ => false,
    }
}
