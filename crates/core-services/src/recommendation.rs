//! Recommendation backend: storage, queries and the `recommendations` consumer.

use std::sync::Arc;

use async_trait::async_trait;
use common::{Recommendation, ServiceAddress};
use messaging::{Channel, EventType, Message};

use crate::consumer::{EventConsumer, decode_event, require_data};
use crate::store::{OwnedStore, validate_product_id};
use crate::{Result, ServiceError};

/// Recommendations keyed by `(productId, recommendationId)`.
#[derive(Clone)]
pub struct RecommendationService {
    store: Arc<OwnedStore<Recommendation>>,
    service_address: ServiceAddress,
}

impl RecommendationService {
    pub fn new(service_address: ServiceAddress) -> Self {
        Self {
            store: Arc::new(OwnedStore::new()),
            service_address,
        }
    }

    /// Recommendations of a product ordered by id; empty when there are none.
    #[tracing::instrument(skip(self))]
    pub async fn get_recommendations(&self, product_id: i32) -> Result<Vec<Recommendation>> {
        validate_product_id(product_id)?;

        let mut found = self.store.owned_by(product_id).await;
        for recommendation in &mut found {
            recommendation.service_address = Some(self.service_address.to_string());
        }
        tracing::info!(product_id, found = found.len(), "recommendations read");
        Ok(found)
    }

    #[tracing::instrument(
        skip(self, body),
        fields(product_id = body.product_id, recommendation_id = body.recommendation_id)
    )]
    pub async fn create_recommendation(&self, mut body: Recommendation) -> Result<Recommendation> {
        validate_product_id(body.product_id)?;
        body.service_address = None;

        let key = (body.product_id, body.recommendation_id);
        if !self.store.insert_new(key, body.clone()).await {
            return Err(ServiceError::InvalidInput(format!(
                "Duplicate key, Product Id: {}, Recommendation Id: {}",
                body.product_id, body.recommendation_id
            )));
        }
        Ok(body)
    }

    /// Removes every recommendation of the product.
    #[tracing::instrument(skip(self))]
    pub async fn delete_recommendations(&self, product_id: i32) -> Result<()> {
        validate_product_id(product_id)?;
        let deleted = self.store.remove_owned_by(product_id).await;
        tracing::info!(product_id, deleted, "recommendations deleted");
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.store.len().await
    }
}

/// Applies `recommendations` channel events to a [`RecommendationService`].
#[derive(Clone)]
pub struct RecommendationMessageProcessor {
    service: RecommendationService,
}

impl RecommendationMessageProcessor {
    pub fn new(service: RecommendationService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventConsumer for RecommendationMessageProcessor {
    fn name(&self) -> &'static str {
        "recommendation"
    }

    fn channel(&self) -> Channel {
        Channel::Recommendations
    }

    async fn handle(&self, message: &Message) -> Result<()> {
        let event = decode_event::<Recommendation>(message)?;
        tracing::info!(event_type = %event.event_type(), key = event.key(), "processing recommendation event");

        match event.event_type() {
            EventType::Create => {
                let recommendation = require_data(event, |r: &Recommendation| r.product_id)?;
                self.service.create_recommendation(recommendation).await?;
            }
            EventType::Delete => self.service.delete_recommendations(*event.key()).await?,
        }
        Ok(())
    }
}
