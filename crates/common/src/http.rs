//! Structured error body exchanged over HTTP by every service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error payload returned alongside 4xx/5xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpErrorInfo {
    pub timestamp: DateTime<Utc>,
    pub path: String,
    pub http_status: u16,
    pub message: String,
}

impl HttpErrorInfo {
    pub fn new(http_status: u16, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            path: path.into(),
            http_status,
            message: message.into(),
        }
    }

    /// Extracts the `message` field from an error body, falling back to the
    /// raw text when the body is not a structured error.
    pub fn message_from_body(body: &str) -> String {
        #[derive(Deserialize)]
        struct MessageOnly {
            message: String,
        }

        match serde_json::from_str::<MessageOnly>(body) {
            Ok(parsed) => parsed.message,
            Err(_) => body.to_string(),
        }
    }
}
