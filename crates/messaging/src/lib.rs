//! Write-path messaging for the product composite system.
//!
//! - [`Event`]: the create/delete intent keyed by the owning product
//! - [`Message`]: a serialized event plus its partition key header
//! - [`Publisher`]: the narrow channel interface the dispatcher talks to
//! - [`InMemoryBroker`]: a partitioned in-process channel backend
//! - [`PublishScheduler`]: dedicated workers that keep publishing off the read path

pub mod channel;
pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod publisher;
pub mod scheduler;

pub use channel::{Channel, dead_letter_channel};
pub use error::{MessagingError, Result};
pub use event::{Event, EventType, same_event_except_created_at};
pub use memory::{InMemoryBroker, PartitionReceiver, Subscription, select_partition};
pub use message::{Message, MessageBuilder, MessageId, PARTITION_KEY_HEADER};
pub use publisher::{Publisher, PublisherExt};
pub use scheduler::{PublishScheduler, SchedulerConfig};
