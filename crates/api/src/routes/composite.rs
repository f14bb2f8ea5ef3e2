//! Composite endpoints: aggregate reads and event-dispatched writes.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use common::ProductAggregate;
use composite::{BackendClient, CommandDispatcher, ProductAggregator};
use messaging::Publisher;

use super::parse_id;
use crate::error::ApiError;

/// Shared state of the composite router.
pub struct CompositeState<C: BackendClient, B: Publisher + 'static> {
    pub aggregator: ProductAggregator<C, C, C>,
    pub dispatcher: CommandDispatcher<B>,
}

/// GET /product-composite/{id}: the aggregate view.
#[tracing::instrument(skip(state, uri))]
pub async fn get<C: BackendClient, B: Publisher + 'static>(
    State(state): State<Arc<CompositeState<C, B>>>,
    uri: Uri,
    Path(raw_id): Path<String>,
) -> Result<Json<ProductAggregate>, ApiError> {
    let product_id = parse_id(uri.path(), &raw_id)?;
    let aggregate = state
        .aggregator
        .get_aggregate(product_id)
        .await
        .map_err(|e| ApiError::composite(uri.path(), e))?;
    Ok(Json(aggregate))
}

/// POST /product-composite: publishes create events; 202 once accepted.
#[tracing::instrument(skip_all)]
pub async fn create<C: BackendClient, B: Publisher + 'static>(
    State(state): State<Arc<CompositeState<C, B>>>,
    uri: Uri,
    body: Result<Json<ProductAggregate>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(uri.path(), e.body_text()))?;
    tracing::debug!(product_id = body.product_id, "create composite");

    state
        .dispatcher
        .create_aggregate(body)
        .await
        .map_err(|e| ApiError::composite(uri.path(), e))?;
    Ok(StatusCode::ACCEPTED)
}

/// DELETE /product-composite/{id}: publishes delete events; 202 once accepted.
#[tracing::instrument(skip(state, uri))]
pub async fn delete<C: BackendClient, B: Publisher + 'static>(
    State(state): State<Arc<CompositeState<C, B>>>,
    uri: Uri,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product_id = parse_id(uri.path(), &raw_id)?;
    state
        .dispatcher
        .delete_aggregate(product_id)
        .await
        .map_err(|e| ApiError::composite(uri.path(), e))?;
    Ok(StatusCode::ACCEPTED)
}
