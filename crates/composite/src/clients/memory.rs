//! In-memory backend for tests and local wiring.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use common::{Product, ProductId, Recommendation, Review};

use super::{ProductClient, RecommendationClient, Resource, ReviewClient};
use crate::error::{CompositeError, Result};

/// Failure injected into one resource of an [`InMemoryBackend`].
#[derive(Debug, Clone)]
pub enum Fault {
    /// Answers with a status outside the known taxonomy.
    Status(u16),
    /// The backend cannot be reached.
    Unavailable,
    /// Answers normally, but only after the delay.
    Delay(Duration),
}

#[derive(Debug, Default)]
struct InMemoryBackendState {
    products: HashMap<i32, Product>,
    recommendations: HashMap<i32, Vec<Recommendation>>,
    reviews: HashMap<i32, Vec<Review>>,
    faults: HashMap<Resource, Fault>,
    calls: HashMap<Resource, usize>,
}

/// Serves all three backend resources from memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<RwLock<InMemoryBackendState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryBackendState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryBackendState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_product(&self, product: Product) {
        self.write().products.insert(product.product_id, product);
    }

    pub fn add_recommendation(&self, recommendation: Recommendation) {
        self.write()
            .recommendations
            .entry(recommendation.product_id)
            .or_default()
            .push(recommendation);
    }

    pub fn add_review(&self, review: Review) {
        self.write()
            .reviews
            .entry(review.product_id)
            .or_default()
            .push(review);
    }

    /// Makes every call to `resource` fail or stall until cleared.
    pub fn set_fault(&self, resource: Resource, fault: Fault) {
        self.write().faults.insert(resource, fault);
    }

    pub fn clear_fault(&self, resource: Resource) {
        self.write().faults.remove(&resource);
    }

    /// Number of calls received for `resource`, failed ones included.
    pub fn call_count(&self, resource: Resource) -> usize {
        self.read().calls.get(&resource).copied().unwrap_or(0)
    }

    /// Records the call and applies any injected fault.
    async fn enter(&self, resource: Resource) -> Result<()> {
        let fault = {
            let mut state = self.write();
            *state.calls.entry(resource).or_insert(0) += 1;
            state.faults.get(&resource).cloned()
        };

        match fault {
            None => Ok(()),
            Some(Fault::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Some(Fault::Status(status)) => Err(CompositeError::Upstream {
                resource,
                status,
                body: format!("{resource} backend failure"),
            }),
            Some(Fault::Unavailable) => Err(CompositeError::UpstreamUnavailable {
                resource,
                reason: "connection refused".to_string(),
            }),
        }
    }
}

#[async_trait]
impl ProductClient for InMemoryBackend {
    async fn fetch_product(&self, product_id: ProductId) -> Result<Product> {
        self.enter(Resource::Product).await?;
        self.read()
            .products
            .get(&product_id.as_i32())
            .cloned()
            .ok_or_else(|| {
                CompositeError::NotFound(format!("No product found for productId: {product_id}"))
            })
    }
}

#[async_trait]
impl RecommendationClient for InMemoryBackend {
    async fn fetch_recommendations(&self, product_id: ProductId) -> Result<Vec<Recommendation>> {
        self.enter(Resource::Recommendation).await?;
        Ok(self
            .read()
            .recommendations
            .get(&product_id.as_i32())
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ReviewClient for InMemoryBackend {
    async fn fetch_reviews(&self, product_id: ProductId) -> Result<Vec<Review>> {
        self.enter(Resource::Review).await?;
        Ok(self
            .read()
            .reviews
            .get(&product_id.as_i32())
            .cloned()
            .unwrap_or_default())
    }
}
