//! Product backend: storage, queries and the `products` consumer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Product, ServiceAddress};
use messaging::{Channel, EventType, Message};
use tokio::sync::RwLock;

use crate::consumer::{EventConsumer, decode_event, require_data};
use crate::store::validate_product_id;
use crate::{Result, ServiceError};

/// Products keyed by product id.
#[derive(Clone)]
pub struct ProductService {
    products: Arc<RwLock<HashMap<i32, Product>>>,
    service_address: ServiceAddress,
}

impl ProductService {
    pub fn new(service_address: ServiceAddress) -> Self {
        Self {
            products: Arc::new(RwLock::new(HashMap::new())),
            service_address,
        }
    }

    /// Returns the product, stamped with this instance's address.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, product_id: i32) -> Result<Product> {
        let id = validate_product_id(product_id)?;

        let mut product = self
            .products
            .read()
            .await
            .get(&id.as_i32())
            .cloned()
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No product found for productId: {product_id}"))
            })?;

        product.service_address = Some(self.service_address.to_string());
        tracing::debug!(product_id, "product found");
        Ok(product)
    }

    /// Stores a new product; an existing id is a duplicate.
    #[tracing::instrument(skip(self, body), fields(product_id = body.product_id))]
    pub async fn create_product(&self, mut body: Product) -> Result<Product> {
        validate_product_id(body.product_id)?;
        body.service_address = None;

        let mut products = self.products.write().await;
        if products.contains_key(&body.product_id) {
            return Err(ServiceError::InvalidInput(format!(
                "Duplicate key, Product Id: {}",
                body.product_id
            )));
        }
        products.insert(body.product_id, body.clone());
        Ok(body)
    }

    /// Removes the product if present.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, product_id: i32) -> Result<()> {
        validate_product_id(product_id)?;
        if self.products.write().await.remove(&product_id).is_some() {
            tracing::info!(product_id, "product deleted");
        }
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.products.read().await.len()
    }
}

/// Applies `products` channel events to a [`ProductService`].
#[derive(Clone)]
pub struct ProductMessageProcessor {
    service: ProductService,
}

impl ProductMessageProcessor {
    pub fn new(service: ProductService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventConsumer for ProductMessageProcessor {
    fn name(&self) -> &'static str {
        "product"
    }

    fn channel(&self) -> Channel {
        Channel::Products
    }

    async fn handle(&self, message: &Message) -> Result<()> {
        let event = decode_event::<Product>(message)?;
        tracing::info!(event_type = %event.event_type(), key = event.key(), "processing product event");

        match event.event_type() {
            EventType::Create => {
                let product = require_data(event, |p: &Product| p.product_id)?;
                self.service.create_product(product).await?;
            }
            EventType::Delete => self.service.delete_product(*event.key()).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging::Event;

    fn service() -> ProductService {
        ProductService::new(ServiceAddress::new("product", 7001))
    }

    fn create_message(product_id: i32) -> Message {
        let mut product = Product::new(product_id, format!("Name {product_id}"), product_id);
        product.service_address = Some("SA".into());
        Message::from_event(&Event::create(product_id, product)).unwrap()
    }

    fn delete_message(product_id: i32) -> Message {
        Message::from_event(&Event::<i32, Product>::delete(product_id)).unwrap()
    }

    #[tokio::test]
    async fn test_get_product_after_create_event() {
        let service = service();
        let processor = ProductMessageProcessor::new(service.clone());

        processor.handle(&create_message(1)).await.unwrap();

        let product = service.get_product(1).await.unwrap();
        assert_eq!(product.product_id, 1);
        assert_eq!(product.name, "Name 1");
        assert_eq!(product.service_address.as_deref(), Some("product:7001"));
    }

    #[tokio::test]
    async fn test_duplicate_create_is_rejected() {
        let service = service();
        let processor = ProductMessageProcessor::new(service.clone());

        processor.handle(&create_message(1)).await.unwrap();
        let result = processor.handle(&create_message(1)).await;

        assert!(matches!(result, Err(ServiceError::InvalidInput(m)) if m == "Duplicate key, Product Id: 1"));
        assert_eq!(service.count().await, 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let service = service();
        let processor = ProductMessageProcessor::new(service.clone());

        processor.handle(&create_message(1)).await.unwrap();
        processor.handle(&delete_message(1)).await.unwrap();
        assert_eq!(service.count().await, 0);

        processor.handle(&delete_message(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_with_invalid_key_is_rejected() {
        let processor = ProductMessageProcessor::new(service());
        let result = processor.handle(&delete_message(0)).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(m)) if m == "Invalid productId: 0"));
    }

    #[tokio::test]
    async fn test_get_missing_product() {
        let result = service().get_product(13).await;
        assert!(matches!(result, Err(ServiceError::NotFound(m)) if m == "No product found for productId: 13"));
    }

    #[tokio::test]
    async fn test_get_invalid_id() {
        let result = service().get_product(-1).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(m)) if m == "Invalid productId: -1"));
    }

    #[tokio::test]
    async fn test_stored_product_drops_incoming_address() {
        let service = service();
        let created = service
            .create_product(Product {
                service_address: Some("elsewhere".into()),
                ..Product::new(2, "n", 1)
            })
            .await
            .unwrap();
        assert!(created.service_address.is_none());
    }
}
