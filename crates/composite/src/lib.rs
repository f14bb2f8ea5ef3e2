//! Product composite core.
//!
//! The read side ([`ProductAggregator`]) fans out to the product,
//! recommendation and review backends and merges their answers, tolerating
//! failures of the non-critical ones. The write side ([`CommandDispatcher`])
//! turns composite creates and deletes into domain events keyed by product
//! id and publishes them without touching the backends.

pub mod aggregator;
pub mod clients;
pub mod dispatcher;
pub mod error;

pub use aggregator::{ProductAggregator, merge};
pub use clients::{
    BackendClient, BackendUrls, Fault, HttpIntegration, InMemoryBackend, ProductClient,
    RecommendationClient, Resource, ReviewClient,
};
pub use dispatcher::{CommandDispatcher, OutboundEvent, create_events, delete_events};
pub use error::{CompositeError, PublishFailure, Result};
