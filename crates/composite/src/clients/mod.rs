//! Outbound calls to the product, recommendation and review backends.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use common::{Product, ProductId, Recommendation, Review};

use crate::error::Result;

pub use http::{BackendUrls, HttpIntegration};
pub use memory::{Fault, InMemoryBackend};

/// The backend resource a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Product,
    Recommendation,
    Review,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Product => "product",
            Resource::Recommendation => "recommendation",
            Resource::Review => "review",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetches the product itself. Absence is an error.
#[async_trait]
pub trait ProductClient: Send + Sync + 'static {
    async fn fetch_product(&self, product_id: ProductId) -> Result<Product>;
}

/// Fetches the recommendations of a product; none is an empty list.
#[async_trait]
pub trait RecommendationClient: Send + Sync + 'static {
    async fn fetch_recommendations(&self, product_id: ProductId) -> Result<Vec<Recommendation>>;
}

/// Fetches the reviews of a product; none is an empty list.
#[async_trait]
pub trait ReviewClient: Send + Sync + 'static {
    async fn fetch_reviews(&self, product_id: ProductId) -> Result<Vec<Review>>;
}

/// A client serving all three resources, as a single backend deployment does.
pub trait BackendClient: ProductClient + RecommendationClient + ReviewClient {}

impl<T: ProductClient + RecommendationClient + ReviewClient> BackendClient for T {}
