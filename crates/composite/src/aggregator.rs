//! Read side: concurrent fan-out to the backends and merge into one view.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{
    Product, ProductAggregate, ProductId, Recommendation, Review, ServiceAddress,
    ServiceAddresses,
};
use tokio::task::JoinError;

use crate::clients::{ProductClient, RecommendationClient, Resource, ReviewClient};
use crate::error::{CompositeError, Result};

/// Builds the composite product view from the three backends.
///
/// The product is critical: its failure fails the read. Recommendations and
/// reviews are best effort and degrade to empty lists.
pub struct ProductAggregator<P, R, V>
where
    P: ProductClient,
    R: RecommendationClient,
    V: ReviewClient,
{
    products: Arc<P>,
    recommendations: Arc<R>,
    reviews: Arc<V>,
    service_address: ServiceAddress,
    fetch_timeout: Duration,
}

impl<P, R, V> ProductAggregator<P, R, V>
where
    P: ProductClient,
    R: RecommendationClient,
    V: ReviewClient,
{
    pub fn new(
        products: Arc<P>,
        recommendations: Arc<R>,
        reviews: Arc<V>,
        service_address: ServiceAddress,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            products,
            recommendations,
            reviews,
            service_address,
            fetch_timeout,
        }
    }

    pub fn service_address(&self) -> &ServiceAddress {
        &self.service_address
    }

    /// Reads the aggregate for `product_id`.
    ///
    /// The id is validated before any backend is called. The three fetches
    /// run concurrently; when the product fetch fails, the other two are
    /// left to finish in the background and their results are dropped.
    #[tracing::instrument(skip(self))]
    pub async fn get_aggregate(&self, product_id: i32) -> Result<ProductAggregate> {
        metrics::counter!("composite_reads_total").increment(1);
        let started = Instant::now();

        let product_id = ProductId::parse(product_id)?;
        let timeout = self.fetch_timeout;

        let recommendations = {
            let client = Arc::clone(&self.recommendations);
            tokio::spawn(async move {
                within(
                    Resource::Recommendation,
                    timeout,
                    client.fetch_recommendations(product_id),
                )
                .await
            })
        };
        let reviews = {
            let client = Arc::clone(&self.reviews);
            tokio::spawn(async move {
                within(Resource::Review, timeout, client.fetch_reviews(product_id)).await
            })
        };

        let product = within(
            Resource::Product,
            timeout,
            self.products.fetch_product(product_id),
        )
        .await
        .inspect_err(|e| tracing::info!(error = %e, "product fetch failed"))?;

        let recommendations = non_critical(Resource::Recommendation, recommendations.await);
        let reviews = non_critical(Resource::Review, reviews.await);

        let aggregate = merge(product, recommendations, reviews, &self.service_address);

        metrics::histogram!("composite_read_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(
            recommendations = aggregate.recommendations.len(),
            reviews = aggregate.reviews.len(),
            "aggregate assembled"
        );
        Ok(aggregate)
    }
}

async fn within<T>(
    resource: Resource,
    timeout: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| CompositeError::UpstreamUnavailable {
            resource,
            reason: format!("no response within {} ms", timeout.as_millis()),
        })?
}

fn non_critical<T>(
    resource: Resource,
    outcome: std::result::Result<Result<Vec<T>>, JoinError>,
) -> Vec<T> {
    let reason = match outcome {
        Ok(Ok(items)) => return items,
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("fetch task aborted: {e}"),
    };

    tracing::warn!(%resource, %reason, "falling back to an empty list");
    metrics::counter!("composite_fallbacks_total", "resource" => resource.as_str()).increment(1);
    Vec::new()
}

/// Combines the backend results into the composite view.
///
/// Each backend address comes from the first element it returned; an empty
/// list leaves the address blank.
pub fn merge(
    product: Product,
    recommendations: Vec<Recommendation>,
    reviews: Vec<Review>,
    service_address: &ServiceAddress,
) -> ProductAggregate {
    let rec = recommendations
        .first()
        .and_then(|r| r.service_address.clone())
        .unwrap_or_default();
    let rev = reviews
        .first()
        .and_then(|r| r.service_address.clone())
        .unwrap_or_default();

    ProductAggregate {
        product_id: product.product_id,
        name: product.name,
        weight: product.weight,
        recommendations: recommendations.into_iter().map(Into::into).collect(),
        reviews: reviews.into_iter().map(Into::into).collect(),
        service_addresses: Some(ServiceAddresses {
            cmp: service_address.to_string(),
            pro: product.service_address.unwrap_or_default(),
            rev,
            rec,
        }),
    }
}
