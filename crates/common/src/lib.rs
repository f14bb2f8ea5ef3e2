//! Shared types for the product composite system.
//!
//! - [`ProductId`] and [`ServiceAddress`] value types
//! - wire models for products, recommendations, reviews and the composite view
//! - [`HttpErrorInfo`], the structured error body every service returns

pub mod http;
pub mod model;
pub mod types;

pub use http::HttpErrorInfo;
pub use model::{
    Product, ProductAggregate, Recommendation, RecommendationSummary, Review, ReviewSummary,
    ServiceAddresses,
};
pub use types::{InvalidProductId, ProductId, ServiceAddress};
