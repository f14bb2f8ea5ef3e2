use thiserror::Error;

/// Errors that can occur when handing messages to a channel.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The channel backend refused or could not take the message.
    #[error("Channel '{channel}' is unavailable")]
    ChannelUnavailable { channel: String },

    /// The publish did not complete within its enqueue timeout.
    #[error("Publishing to '{channel}' timed out after {timeout_ms} ms")]
    Timeout { channel: String, timeout_ms: u64 },

    /// The publish scheduler has no free slot in its task queue.
    #[error("Publish scheduler queue is full ({capacity} tasks)")]
    SchedulerSaturated { capacity: usize },

    /// A scheduled publish task panicked or was cancelled.
    #[error("Publish task failed: {0}")]
    TaskFailed(String),

    /// The publish scheduler's worker threads could not be started.
    #[error("Failed to start publish scheduler: {0}")]
    SchedulerStart(#[from] std::io::Error),

    /// A channel name that is not one of the known channels.
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// A message was built without a required field.
    #[error("Message is missing required field '{0}'")]
    MissingField(&'static str),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
