//! Review backend.

use std::sync::Arc;

use async_trait::async_trait;
use common::{Review, ServiceAddress};
use messaging::{Channel, EventType, Message};

use crate::consumer::{EventConsumer, decode_event, require_data};
use crate::store::{OwnedStore, validate_product_id};
use crate::{Result, ServiceError};

/// Reviews keyed by `(productId, reviewId)`.
#[derive(Clone)]
pub struct ReviewService {
    store: Arc<OwnedStore<Review>>,
    service_address: ServiceAddress,
}

impl ReviewService {
    pub fn new(service_address: ServiceAddress) -> Self {
        Self {
            store: Arc::new(OwnedStore::new()),
            service_address,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_reviews(&self, product_id: i32) -> Result<Vec<Review>> {
        validate_product_id(product_id)?;

        let address = self.service_address.to_string();
        let found: Vec<Review> = self
            .store
            .owned_by(product_id)
            .await
            .into_iter()
            .map(|review| Review {
                service_address: Some(address.clone()),
                ..review
            })
            .collect();
        tracing::info!(product_id, found = found.len(), "reviews read");
        Ok(found)
    }

    #[tracing::instrument(
        skip(self, body),
        fields(product_id = body.product_id, review_id = body.review_id)
    )]
    pub async fn create_review(&self, body: Review) -> Result<Review> {
        validate_product_id(body.product_id)?;
        let stored = Review {
            service_address: None,
            ..body
        };

        if !self
            .store
            .insert_new((stored.product_id, stored.review_id), stored.clone())
            .await
        {
            return Err(ServiceError::InvalidInput(format!(
                "Duplicate key, Product Id: {}, Review Id: {}",
                stored.product_id, stored.review_id
            )));
        }
        Ok(stored)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_reviews(&self, product_id: i32) -> Result<()> {
        validate_product_id(product_id)?;
        let deleted = self.store.remove_owned_by(product_id).await;
        tracing::info!(product_id, deleted, "reviews deleted");
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.store.len().await
    }
}

/// Applies `reviews` channel events to a [`ReviewService`].
#[derive(Clone)]
pub struct ReviewMessageProcessor {
    service: ReviewService,
}

impl ReviewMessageProcessor {
    pub fn new(service: ReviewService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventConsumer for ReviewMessageProcessor {
    fn name(&self) -> &'static str {
        "review"
    }

    fn channel(&self) -> Channel {
        Channel::Reviews
    }

    async fn handle(&self, message: &Message) -> Result<()> {
        let event = decode_event::<Review>(message)?;
        tracing::info!(event_type = %event.event_type(), key = event.key(), "processing review event");

        match event.event_type() {
            EventType::Create => {
                let review = require_data(event, |r: &Review| r.product_id)?;
                self.service.create_review(review).await.map(drop)
            }
            EventType::Delete => self.service.delete_reviews(*event.key()).await,
        }
    }
}
