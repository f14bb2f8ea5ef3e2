//! Composite error types.

use common::InvalidProductId;
use messaging::EventType;
use thiserror::Error;

use crate::clients::Resource;

/// One event that could not be handed to its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishFailure {
    pub channel: String,
    pub event_type: EventType,
    pub reason: String,
}

impl std::fmt::Display for PublishFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on '{}': {}", self.event_type, self.channel, self.reason)
    }
}

fn describe(failures: &[PublishFailure]) -> String {
    failures
        .iter()
        .map(PublishFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors surfaced by the aggregator and the command dispatcher.
#[derive(Debug, Error)]
pub enum CompositeError {
    /// The critical resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request was rejected before or by a backend.
    #[error("{0}")]
    InvalidInput(String),

    /// A backend answered with a status outside the known taxonomy.
    #[error("{resource} service responded with status {status}")]
    Upstream {
        resource: Resource,
        status: u16,
        body: String,
    },

    /// A backend could not be reached, timed out or sent an unreadable body.
    #[error("{resource} service unavailable: {reason}")]
    UpstreamUnavailable { resource: Resource, reason: String },

    /// At least one event of a write could not be published.
    #[error("Failed to publish {} event(s): {}", .0.len(), describe(.0))]
    Publish(Vec<PublishFailure>),
}

impl From<InvalidProductId> for CompositeError {
    fn from(err: InvalidProductId) -> Self {
        CompositeError::InvalidInput(err.to_string())
    }
}

/// Convenience type alias for composite results.
pub type Result<T> = std::result::Result<T, CompositeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_id_becomes_invalid_input() {
        let err: CompositeError = InvalidProductId(-1).into();
        assert!(matches!(&err, CompositeError::InvalidInput(m) if m == "Invalid productId: -1"));
    }

    #[test]
    fn publish_error_lists_every_failure() {
        let err = CompositeError::Publish(vec![
            PublishFailure {
                channel: "products".into(),
                event_type: EventType::Create,
                reason: "down".into(),
            },
            PublishFailure {
                channel: "reviews".into(),
                event_type: EventType::Create,
                reason: "timeout".into(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Failed to publish 2 event(s): CREATE on 'products': down; CREATE on 'reviews': timeout"
        );
    }
}
