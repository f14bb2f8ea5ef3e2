use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a raw product id is outside the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid productId: {0}")]
pub struct InvalidProductId(pub i32);

/// Identity of a product, valid when `>= 1`.
///
/// Also used as the partition key for every event that touches the product,
/// including recommendation and review events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct ProductId(i32);

impl ProductId {
    /// Validates a raw id coming from a request.
    pub fn parse(raw: i32) -> Result<Self, InvalidProductId> {
        if raw < 1 {
            return Err(InvalidProductId(raw));
        }
        Ok(Self(raw))
    }

    /// Returns the raw integer value.
    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i32> for ProductId {
    type Error = InvalidProductId;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<ProductId> for i32 {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

/// Address of the service instance that produced a response, `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceAddress(String);

impl ServiceAddress {
    pub fn new(host: impl AsRef<str>, port: u16) -> Self {
        Self(format!("{}:{port}", host.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
