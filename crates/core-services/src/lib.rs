//! Backend services for products, recommendations and reviews.
//!
//! Each backend owns its storage, answers reads directly and applies writes
//! that arrive as events on its channel. Consumers are idempotent in effect:
//! duplicate creates are rejected without retry and deletes of absent keys
//! are no-ops.

pub mod consumer;
pub mod error;
pub mod processor;
pub mod product;
pub mod recommendation;
pub mod review;
mod store;

pub use consumer::{EventConsumer, decode_event, require_data};
pub use error::{Result, ServiceError};
pub use processor::{
    ConsumerHandle, ConsumerRunner, Delivery, EXCEPTION_MESSAGE_HEADER, ORIGINAL_CHANNEL_HEADER,
    RetryPolicy, process_message,
};
pub use product::{ProductMessageProcessor, ProductService};
pub use recommendation::{RecommendationMessageProcessor, RecommendationService};
pub use review::{ReviewMessageProcessor, ReviewService};
