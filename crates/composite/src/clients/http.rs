//! HTTP implementation of the backend clients.

use std::time::Duration;

use async_trait::async_trait;
use common::{HttpErrorInfo, Product, ProductId, Recommendation, Review};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use super::{ProductClient, RecommendationClient, Resource, ReviewClient};
use crate::error::{CompositeError, Result};

/// Base URLs of the three backends, e.g. `http://localhost:7001`.
#[derive(Debug, Clone)]
pub struct BackendUrls {
    pub product: String,
    pub recommendation: String,
    pub review: String,
}

impl BackendUrls {
    /// All three resources served from one base URL.
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            product: base.clone(),
            recommendation: base.clone(),
            review: base,
        }
    }
}

/// Talks to the backends over HTTP with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpIntegration {
    client: Client,
    urls: BackendUrls,
    timeout: Duration,
}

impl HttpIntegration {
    pub fn new(urls: BackendUrls, timeout: Duration) -> Self {
        Self::with_client(Client::new(), urls, timeout)
    }

    /// Reuses an existing client and its connection pool.
    pub fn with_client(client: Client, urls: BackendUrls, timeout: Duration) -> Self {
        Self {
            client,
            urls: BackendUrls {
                product: trim_base(urls.product),
                recommendation: trim_base(urls.recommendation),
                review: trim_base(urls.review),
            },
            timeout,
        }
    }

    pub fn urls(&self) -> &BackendUrls {
        &self.urls
    }

    async fn get_json<T: DeserializeOwned>(&self, resource: Resource, url: String) -> Result<T> {
        tracing::debug!(%resource, %url, "calling backend");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(resource, &e))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| CompositeError::UpstreamUnavailable {
                    resource,
                    reason: format!("unreadable response body: {e}"),
                });
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify(resource, status, &body))
    }
}

fn trim_base(base: String) -> String {
    base.trim_end_matches('/').to_string()
}

fn transport_error(resource: Resource, err: &reqwest::Error) -> CompositeError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    CompositeError::UpstreamUnavailable { resource, reason }
}

/// Maps a non-2xx backend response onto the error taxonomy.
pub fn classify(resource: Resource, status: StatusCode, body: &str) -> CompositeError {
    match status {
        StatusCode::NOT_FOUND => CompositeError::NotFound(HttpErrorInfo::message_from_body(body)),
        StatusCode::UNPROCESSABLE_ENTITY => {
            CompositeError::InvalidInput(HttpErrorInfo::message_from_body(body))
        }
        _ => {
            tracing::warn!(%resource, status = status.as_u16(), "unexpected backend status");
            CompositeError::Upstream {
                resource,
                status: status.as_u16(),
                body: body.to_string(),
            }
        }
    }
}

#[async_trait]
impl ProductClient for HttpIntegration {
    async fn fetch_product(&self, product_id: ProductId) -> Result<Product> {
        let url = format!("{}/product/{product_id}", self.urls.product);
        self.get_json(Resource::Product, url).await
    }
}

#[async_trait]
impl RecommendationClient for HttpIntegration {
    async fn fetch_recommendations(&self, product_id: ProductId) -> Result<Vec<Recommendation>> {
        let url = format!(
            "{}/recommendation?productId={product_id}",
            self.urls.recommendation
        );
        self.get_json(Resource::Recommendation, url).await
    }
}

#[async_trait]
impl ReviewClient for HttpIntegration {
    async fn fetch_reviews(&self, product_id: ProductId) -> Result<Vec<Review>> {
        let url = format!("{}/reviews?productId={product_id}", self.urls.review);
        self.get_json(Resource::Review, url).await
    }
}
