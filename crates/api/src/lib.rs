//! HTTP adapters for the product composite system.
//!
//! Two routers: the composite (aggregate reads, event-dispatched writes and
//! Prometheus metrics) and the embedded backend (product, recommendation and
//! review reads). Both carry request tracing.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use common::ServiceAddress;
use composite::{BackendClient, CommandDispatcher, ProductAggregator};
use core_services::{
    ConsumerHandle, ConsumerRunner, EventConsumer, ProductMessageProcessor, ProductService,
    RecommendationMessageProcessor, RecommendationService, RetryPolicy, ReviewMessageProcessor,
    ReviewService,
};
use messaging::{InMemoryBroker, PublishScheduler, Publisher};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;
pub use routes::backend::BackendState;
pub use routes::composite::CompositeState;

/// Creates the composite router.
pub fn create_composite_app<C, B>(
    state: Arc<CompositeState<C, B>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    C: BackendClient,
    B: Publisher + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics_handle);

    Router::new()
        .route(
            "/product-composite",
            post(routes::composite::create::<C, B>),
        )
        .route(
            "/product-composite/{id}",
            get(routes::composite::get::<C, B>).delete(routes::composite::delete::<C, B>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the backend router.
pub fn create_backend_app(state: BackendState) -> Router {
    Router::new()
        .route("/product/{id}", get(routes::backend::get_product))
        .route("/recommendation", get(routes::backend::get_recommendations))
        .route("/reviews", get(routes::backend::get_reviews))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// GET /metrics: Prometheus text exposition.
async fn render_metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}

/// Wires the composite core over `client` and `publisher`.
pub fn create_composite_state<C, B>(
    client: Arc<C>,
    publisher: Arc<B>,
    scheduler: Arc<PublishScheduler>,
    service_address: ServiceAddress,
    config: &Config,
) -> Arc<CompositeState<C, B>>
where
    C: BackendClient,
    B: Publisher + 'static,
{
    Arc::new(CompositeState {
        aggregator: ProductAggregator::new(
            Arc::clone(&client),
            Arc::clone(&client),
            client,
            service_address,
            config.fetch_timeout,
        ),
        dispatcher: CommandDispatcher::new(publisher, scheduler, config.publish_timeout),
    })
}

/// Creates the three backend services, all advertising `service_address`.
pub fn create_backend_state(service_address: ServiceAddress) -> BackendState {
    BackendState {
        products: ProductService::new(service_address.clone()),
        recommendations: RecommendationService::new(service_address.clone()),
        reviews: ReviewService::new(service_address),
    }
}

/// Starts one consumer per backend on `broker`.
pub async fn start_consumers(
    broker: &InMemoryBroker,
    backends: &BackendState,
    policy: RetryPolicy,
) -> Vec<ConsumerHandle> {
    let runner = ConsumerRunner::new(broker.clone(), policy);
    let consumers: [Arc<dyn EventConsumer>; 3] = [
        Arc::new(ProductMessageProcessor::new(backends.products.clone())),
        Arc::new(RecommendationMessageProcessor::new(
            backends.recommendations.clone(),
        )),
        Arc::new(ReviewMessageProcessor::new(backends.reviews.clone())),
    ];

    let mut handles = Vec::with_capacity(consumers.len());
    for consumer in consumers {
        handles.push(runner.start(consumer).await);
    }
    handles
}
