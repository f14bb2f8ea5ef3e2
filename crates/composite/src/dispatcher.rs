//! Write side: turns composite commands into ordered domain events.

use std::sync::Arc;
use std::time::Duration;

use common::{Product, ProductAggregate, ProductId, Recommendation, Review};
use messaging::{Channel, Event, EventType, Message, PublishScheduler, Publisher, PublisherExt};

use crate::error::{CompositeError, PublishFailure, Result};

/// A serialized event bound for one channel.
#[derive(Debug, Clone)]
pub struct OutboundEvent {
    pub channel: Channel,
    pub event_type: EventType,
    pub message: Message,
}

impl OutboundEvent {
    fn new<T: serde::Serialize>(channel: Channel, event: &Event<ProductId, T>) -> Result<Self> {
        let message = Message::from_event(event).map_err(|e| {
            CompositeError::Publish(vec![PublishFailure {
                channel: channel.to_string(),
                event_type: event.event_type(),
                reason: e.to_string(),
            }])
        })?;
        Ok(Self {
            channel,
            event_type: event.event_type(),
            message,
        })
    }

    fn failure(&self, reason: impl Into<String>) -> PublishFailure {
        PublishFailure {
            channel: self.channel.to_string(),
            event_type: self.event_type,
            reason: reason.into(),
        }
    }
}

/// The events a composite create produces, in dispatch order: the product,
/// then each recommendation, then each review. Every event is keyed by the
/// owning product id.
pub fn create_events(product_id: ProductId, body: ProductAggregate) -> Result<Vec<OutboundEvent>> {
    let raw = product_id.as_i32();
    let mut events = Vec::with_capacity(1 + body.recommendations.len() + body.reviews.len());

    events.push(OutboundEvent::new(
        Channel::Products,
        &Event::create(product_id, Product::new(raw, body.name, body.weight)),
    )?);
    for summary in body.recommendations {
        events.push(OutboundEvent::new(
            Channel::Recommendations,
            &Event::create(product_id, summary.into_recommendation(raw)),
        )?);
    }
    for summary in body.reviews {
        events.push(OutboundEvent::new(
            Channel::Reviews,
            &Event::create(product_id, summary.into_review(raw)),
        )?);
    }
    Ok(events)
}

/// One DELETE per entity type, without data.
pub fn delete_events(product_id: ProductId) -> Result<Vec<OutboundEvent>> {
    Ok(vec![
        OutboundEvent::new(Channel::Products, &Event::<_, Product>::delete(product_id))?,
        OutboundEvent::new(
            Channel::Recommendations,
            &Event::<_, Recommendation>::delete(product_id),
        )?,
        OutboundEvent::new(Channel::Reviews, &Event::<_, Review>::delete(product_id))?,
    ])
}

/// Publishes composite writes as events on the publish scheduler.
///
/// A write succeeds once every event is accepted by its channel; it does not
/// wait for the backends to apply them.
pub struct CommandDispatcher<B: Publisher + 'static> {
    publisher: Arc<B>,
    scheduler: Arc<PublishScheduler>,
    publish_timeout: Duration,
}

impl<B: Publisher + 'static> CommandDispatcher<B> {
    pub fn new(publisher: Arc<B>, scheduler: Arc<PublishScheduler>, publish_timeout: Duration) -> Self {
        Self {
            publisher,
            scheduler,
            publish_timeout,
        }
    }

    /// Publishes the create events for `body`.
    #[tracing::instrument(skip(self, body), fields(product_id = body.product_id))]
    pub async fn create_aggregate(&self, body: ProductAggregate) -> Result<()> {
        let product_id = ProductId::parse(body.product_id)?;
        let events = create_events(product_id, body)?;
        self.dispatch("create", events).await
    }

    /// Publishes the delete events for `product_id`. Deleting an unknown
    /// product succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn delete_aggregate(&self, product_id: i32) -> Result<()> {
        let product_id = ProductId::parse(product_id)?;
        let events = delete_events(product_id)?;
        self.dispatch("delete", events).await
    }

    async fn dispatch(&self, operation: &'static str, events: Vec<OutboundEvent>) -> Result<()> {
        metrics::counter!("composite_writes_total", "operation" => operation).increment(1);

        let total = events.len();
        let targets: Vec<(Channel, EventType)> =
            events.iter().map(|e| (e.channel, e.event_type)).collect();

        let publisher = Arc::clone(&self.publisher);
        let timeout = self.publish_timeout;
        let failures = match self
            .scheduler
            .run(publish_in_order(publisher, events, timeout))
            .await
        {
            Ok(failures) => failures,
            Err(e) => {
                // Nothing was handed to a channel.
                let reason = e.to_string();
                targets
                    .into_iter()
                    .map(|(channel, event_type)| PublishFailure {
                        channel: channel.to_string(),
                        event_type,
                        reason: reason.clone(),
                    })
                    .collect()
            }
        };

        if failures.is_empty() {
            tracing::info!(operation, events = total, "events dispatched");
            return Ok(());
        }

        tracing::error!(
            operation,
            failed = failures.len(),
            events = total,
            "event dispatch incomplete"
        );
        Err(CompositeError::Publish(failures))
    }
}

/// Publishes every event in order, each with its own timeout. A failed
/// publish does not stop the ones after it.
async fn publish_in_order<B: Publisher + ?Sized>(
    publisher: Arc<B>,
    events: Vec<OutboundEvent>,
    timeout: Duration,
) -> Vec<PublishFailure> {
    let mut failures = Vec::new();
    for event in events {
        let channel = event.channel.as_str();
        if let Err(e) = publisher
            .publish_within(channel, event.message.clone(), timeout)
            .await
        {
            tracing::error!(channel, event_type = %event.event_type, error = %e, "publish failed");
            failures.push(event.failure(e.to_string()));
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{RecommendationSummary, ReviewSummary};
    use messaging::{InMemoryBroker, SchedulerConfig, same_event_except_created_at};

    fn scheduler() -> Arc<PublishScheduler> {
        Arc::new(
            PublishScheduler::new(SchedulerConfig {
                thread_pool_size: 1,
                task_queue_size: 8,
                thread_name: "publish-test".to_string(),
            })
            .unwrap(),
        )
    }

    fn dispatcher(broker: &InMemoryBroker) -> CommandDispatcher<InMemoryBroker> {
        CommandDispatcher::new(
            Arc::new(broker.clone()),
            scheduler(),
            Duration::from_millis(500),
        )
    }

    fn body(product_id: i32, recommendations: i32, reviews: i32) -> ProductAggregate {
        ProductAggregate {
            product_id,
            name: "name".into(),
            weight: 1,
            recommendations: (1..=recommendations)
                .map(|id| RecommendationSummary {
                    recommendation_id: id,
                    author: "a".into(),
                    rate: 1,
                    content: "c".into(),
                })
                .collect(),
            reviews: (1..=reviews)
                .map(|id| ReviewSummary {
                    review_id: id,
                    author: "a".into(),
                    subject: "s".into(),
                    content: "c".into(),
                })
                .collect(),
            service_addresses: None,
        }
    }

    fn pid(raw: i32) -> ProductId {
        ProductId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_create_publishes_product_recommendation_review_in_order() {
        let broker = InMemoryBroker::new().with_history();
        dispatcher(&broker).create_aggregate(body(1, 1, 1)).await.unwrap();

        let history = broker.history().await;
        let channels: Vec<&str> = history.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(channels, vec!["products", "recommendations", "reviews"]);
        assert!(history.iter().all(|(_, m)| m.partition_key() == Some("1")));

        let expected_product = Event::create(1, Product::new(1, "name", 1));
        assert!(same_event_except_created_at(
            &history[0].1.payload_text(),
            &expected_product
        ));

        let expected_recommendation = Event::create(
            1,
            Recommendation {
                product_id: 1,
                recommendation_id: 1,
                author: "a".into(),
                rate: 1,
                content: "c".into(),
                service_address: None,
            },
        );
        assert!(same_event_except_created_at(
            &history[1].1.payload_text(),
            &expected_recommendation
        ));
    }

    #[tokio::test]
    async fn test_create_without_children_publishes_only_the_product() {
        let broker = InMemoryBroker::new().with_history();
        dispatcher(&broker).create_aggregate(body(2, 0, 0)).await.unwrap();

        assert_eq!(broker.history_for("products").await.len(), 1);
        assert!(broker.history_for("recommendations").await.is_empty());
        assert!(broker.history_for("reviews").await.is_empty());
    }

    #[test]
    fn test_create_events_follow_input_order() {
        let events = create_events(pid(3), body(3, 2, 3)).unwrap();
        let channels: Vec<Channel> = events.iter().map(|e| e.channel).collect();
        assert_eq!(
            channels,
            vec![
                Channel::Products,
                Channel::Recommendations,
                Channel::Recommendations,
                Channel::Reviews,
                Channel::Reviews,
                Channel::Reviews,
            ]
        );
        assert_eq!(events[2].message.payload["data"]["recommendationId"], 2);
    }

    #[test]
    fn test_delete_events_carry_no_data() {
        let events = delete_events(pid(4)).unwrap();
        assert_eq!(events.len(), 3);
        for event in &events {
            assert_eq!(event.event_type, EventType::Delete);
            assert_eq!(event.message.payload["key"], 4);
            assert!(event.message.payload["data"].is_null());
        }
    }

    #[tokio::test]
    async fn test_delete_twice_succeeds() {
        let broker = InMemoryBroker::new().with_history();
        let dispatcher = dispatcher(&broker);

        dispatcher.delete_aggregate(1).await.unwrap();
        dispatcher.delete_aggregate(1).await.unwrap();

        let history = broker.history().await;
        assert_eq!(history.len(), 6);
        assert!(same_event_except_created_at(
            &history[3].1.payload_text(),
            &Event::<i32, Product>::delete(1)
        ));
    }

    #[tokio::test]
    async fn test_invalid_id_publishes_nothing() {
        let broker = InMemoryBroker::new().with_history();
        let dispatcher = dispatcher(&broker);

        let created = dispatcher.create_aggregate(body(0, 1, 1)).await;
        let deleted = dispatcher.delete_aggregate(-1).await;

        assert!(matches!(created, Err(CompositeError::InvalidInput(m)) if m == "Invalid productId: 0"));
        assert!(matches!(deleted, Err(CompositeError::InvalidInput(m)) if m == "Invalid productId: -1"));
        assert!(broker.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_one_unavailable_channel_does_not_stop_the_rest() {
        let broker = InMemoryBroker::new().with_history();
        broker.set_unavailable("recommendations", true).await;

        let result = dispatcher(&broker).create_aggregate(body(1, 2, 1)).await;

        let Err(CompositeError::Publish(failures)) = result else {
            panic!("expected publish failure");
        };
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| f.channel == "recommendations"));

        assert_eq!(broker.history_for("products").await.len(), 1);
        assert_eq!(broker.history_for("reviews").await.len(), 1);
    }

    struct StalledPublisher;

    #[async_trait]
    impl Publisher for StalledPublisher {
        async fn publish(&self, _channel: &str, _message: Message) -> messaging::Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_channel_times_out_every_event() {
        let dispatcher = CommandDispatcher::new(
            Arc::new(StalledPublisher),
            scheduler(),
            Duration::from_millis(20),
        );

        let result = dispatcher.delete_aggregate(1).await;

        let Err(CompositeError::Publish(failures)) = result else {
            panic!("expected publish failure");
        };
        assert_eq!(failures.len(), 3);
        assert!(failures.iter().all(|f| f.reason.contains("timed out")));
    }

    #[tokio::test]
    async fn test_saturated_scheduler_fails_the_whole_write() {
        let scheduler = Arc::new(
            PublishScheduler::new(SchedulerConfig {
                thread_pool_size: 1,
                task_queue_size: 1,
                thread_name: "publish-test".to_string(),
            })
            .unwrap(),
        );
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let busy = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move {
                scheduler
                    .run(async move {
                        let _ = release_rx.await;
                    })
                    .await
            })
        };
        while scheduler.available_slots() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let broker = InMemoryBroker::new().with_history();
        let dispatcher = CommandDispatcher::new(
            Arc::new(broker.clone()),
            Arc::clone(&scheduler),
            Duration::from_millis(500),
        );
        let result = dispatcher.delete_aggregate(1).await;

        let Err(CompositeError::Publish(failures)) = result else {
            panic!("expected publish failure");
        };
        assert_eq!(failures.len(), 3);
        assert!(broker.history().await.is_empty());

        release_tx.send(()).unwrap();
        busy.await.unwrap().unwrap();
    }
}
