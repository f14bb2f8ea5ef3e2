//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::HttpErrorInfo;
use composite::CompositeError;
use core_services::ServiceError;

/// Message for ids that are not integers.
pub const TYPE_MISMATCH: &str = "Type mismatch.";

/// API-level error, rendered as an [`HttpErrorInfo`] for the request path.
#[derive(Debug)]
pub enum ApiError {
    /// Error from the composite aggregator or dispatcher.
    Composite { path: String, error: CompositeError },
    /// Error from a backend service.
    Service { path: String, error: ServiceError },
    /// Malformed request.
    BadRequest { path: String, message: String },
}

impl ApiError {
    pub fn composite(path: impl Into<String>, error: CompositeError) -> Self {
        ApiError::Composite {
            path: path.into(),
            error,
        }
    }

    pub fn service(path: impl Into<String>, error: ServiceError) -> Self {
        ApiError::Service {
            path: path.into(),
            error,
        }
    }

    pub fn bad_request(path: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn type_mismatch(path: impl Into<String>) -> Self {
        Self::bad_request(path, TYPE_MISMATCH)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, path, message) = match self {
            ApiError::Composite { path, error } => {
                let (status, message) = composite_error_to_response(error);
                (status, path, message)
            }
            ApiError::Service { path, error } => {
                let (status, message) = service_error_to_response(error);
                (status, path, message)
            }
            ApiError::BadRequest { path, message } => (StatusCode::BAD_REQUEST, path, message),
        };

        metrics::counter!("http_errors_total", "status" => status.as_u16().to_string()).increment(1);
        let body = HttpErrorInfo::new(status.as_u16(), path, message);
        (status, Json(body)).into_response()
    }
}

fn composite_error_to_response(err: CompositeError) -> (StatusCode, String) {
    match err {
        CompositeError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        CompositeError::InvalidInput(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
        CompositeError::Upstream {
            resource, status, ..
        } => {
            tracing::error!(%resource, status, "backend returned an unexpected status");
            (
                StatusCode::BAD_GATEWAY,
                format!("{resource} service failed"),
            )
        }
        CompositeError::UpstreamUnavailable { resource, reason } => {
            tracing::error!(%resource, %reason, "backend unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("{resource} service unavailable"),
            )
        }
        CompositeError::Publish(failures) => {
            tracing::error!(failed = failures.len(), "write not accepted");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Failed to publish {} event(s)", failures.len()),
            )
        }
    }
}

fn service_error_to_response(err: ServiceError) -> (StatusCode, String) {
    match err {
        ServiceError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        ServiceError::InvalidInput(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
        other => {
            tracing::error!(error = %other, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use composite::{PublishFailure, Resource};
    use messaging::EventType;

    async fn render(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_keeps_message_and_path() {
        let (status, body) = render(ApiError::composite(
            "/product-composite/13",
            CompositeError::NotFound("No product found for productId: 13".into()),
        ))
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["httpStatus"], 404);
        assert_eq!(body["path"], "/product-composite/13");
        assert_eq!(body["message"], "No product found for productId: 13");
    }

    #[tokio::test]
    async fn test_upstream_details_stay_internal() {
        let (status, body) = render(ApiError::composite(
            "/product-composite/1",
            CompositeError::Upstream {
                resource: Resource::Product,
                status: 500,
                body: "stack trace".into(),
            },
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["message"], "product service failed");
    }

    #[tokio::test]
    async fn test_publish_failure_is_unavailable() {
        let (status, body) = render(ApiError::composite(
            "/product-composite",
            CompositeError::Publish(vec![PublishFailure {
                channel: "reviews".into(),
                event_type: EventType::Create,
                reason: "down".into(),
            }]),
        ))
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "Failed to publish 1 event(s)");
    }

    #[tokio::test]
    async fn test_service_invalid_input_is_unprocessable() {
        let (status, body) = render(ApiError::service(
            "/product/-1",
            ServiceError::InvalidInput("Invalid productId: -1".into()),
        ))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Invalid productId: -1");
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let (status, body) = render(ApiError::type_mismatch("/product/no-integer")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], TYPE_MISMATCH);
    }
}
