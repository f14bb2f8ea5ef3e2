//! Backend service error types.

use messaging::MessagingError;
use thiserror::Error;

/// Errors raised by the backend services and their event consumers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request or event was rejected; repeating it cannot succeed.
    #[error("{0}")]
    InvalidInput(String),

    /// The requested entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The message body is not a readable event.
    #[error("Malformed event: {0}")]
    Malformed(String),

    /// The event was readable but could not be applied.
    #[error("Event processing error: {0}")]
    Processing(String),

    /// The transport failed while handling the event.
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),
}

impl ServiceError {
    /// Whether delivering the same message again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Processing(_) | ServiceError::Messaging(_))
    }
}

/// Result type for backend service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
