//! HTTP handlers for the composite and the embedded backends.

pub mod backend;
pub mod composite;

use crate::error::ApiError;

/// Parses an integer id from a path segment or query value.
pub(crate) fn parse_id(path: &str, raw: &str) -> Result<i32, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::type_mismatch(path))
}
