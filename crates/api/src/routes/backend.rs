//! Backend read endpoints; writes reach the backends only as events.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::Uri;
use common::{Product, Recommendation, Review};
use core_services::{ProductService, RecommendationService, ReviewService};

use super::parse_id;
use crate::error::ApiError;

const PRODUCT_ID_PARAM: &str = "productId";

/// Shared state of the backend router.
#[derive(Clone)]
pub struct BackendState {
    pub products: ProductService,
    pub recommendations: RecommendationService,
    pub reviews: ReviewService,
}

fn product_id_param(uri: &Uri, params: &HashMap<String, String>) -> Result<i32, ApiError> {
    let raw = params.get(PRODUCT_ID_PARAM).ok_or_else(|| {
        ApiError::bad_request(
            uri.path(),
            format!("Required int parameter '{PRODUCT_ID_PARAM}' is not present"),
        )
    })?;
    parse_id(uri.path(), raw)
}

/// GET /product/{id}
#[tracing::instrument(skip(state, uri))]
pub async fn get_product(
    State(state): State<BackendState>,
    uri: Uri,
    Path(raw_id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product_id = parse_id(uri.path(), &raw_id)?;
    state
        .products
        .get_product(product_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::service(uri.path(), e))
}

/// GET /recommendation?productId=
#[tracing::instrument(skip(state, uri))]
pub async fn get_recommendations(
    State(state): State<BackendState>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let product_id = product_id_param(&uri, &params)?;
    state
        .recommendations
        .get_recommendations(product_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::service(uri.path(), e))
}

/// GET /reviews?productId=
#[tracing::instrument(skip(state, uri))]
pub async fn get_reviews(
    State(state): State<BackendState>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let product_id = product_id_param(&uri, &params)?;
    state
        .reviews
        .get_reviews(product_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::service(uri.path(), e))
}
