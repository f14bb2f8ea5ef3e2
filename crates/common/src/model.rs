//! Wire types shared by the composite and the three backend services.
//!
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// A product as owned by the product service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: i32,
    pub name: String,
    pub weight: i32,
    #[serde(default)]
    pub service_address: Option<String>,
}

impl Product {
    pub fn new(product_id: i32, name: impl Into<String>, weight: i32) -> Self {
        Self {
            product_id,
            name: name.into(),
            weight,
            service_address: None,
        }
    }
}

/// A recommendation as owned by the recommendation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub product_id: i32,
    pub recommendation_id: i32,
    pub author: String,
    pub rate: i32,
    pub content: String,
    #[serde(default)]
    pub service_address: Option<String>,
}

/// A review as owned by the review service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub product_id: i32,
    pub review_id: i32,
    pub author: String,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub service_address: Option<String>,
}

/// Recommendation as embedded in a [`ProductAggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationSummary {
    pub recommendation_id: i32,
    pub author: String,
    pub rate: i32,
    pub content: String,
}

impl RecommendationSummary {
    /// Expands the summary into a full recommendation owned by `product_id`.
    pub fn into_recommendation(self, product_id: i32) -> Recommendation {
        Recommendation {
            product_id,
            recommendation_id: self.recommendation_id,
            author: self.author,
            rate: self.rate,
            content: self.content,
            service_address: None,
        }
    }
}

impl From<Recommendation> for RecommendationSummary {
    fn from(r: Recommendation) -> Self {
        Self {
            recommendation_id: r.recommendation_id,
            author: r.author,
            rate: r.rate,
            content: r.content,
        }
    }
}

/// Review as embedded in a [`ProductAggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub review_id: i32,
    pub author: String,
    pub subject: String,
    pub content: String,
}

impl ReviewSummary {
    /// Expands the summary into a full review owned by `product_id`.
    pub fn into_review(self, product_id: i32) -> Review {
        Review {
            product_id,
            review_id: self.review_id,
            author: self.author,
            subject: self.subject,
            content: self.content,
            service_address: None,
        }
    }
}

impl From<Review> for ReviewSummary {
    fn from(r: Review) -> Self {
        Self {
            review_id: r.review_id,
            author: r.author,
            subject: r.subject,
            content: r.content,
        }
    }
}

/// Which instance served each part of an aggregate read.
///
/// Empty strings mean the corresponding backend returned nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAddresses {
    /// The composite itself.
    pub cmp: String,
    /// Product service.
    pub pro: String,
    /// Review service.
    pub rev: String,
    /// Recommendation service.
    pub rec: String,
}

/// The composite product view, and also the body of a composite create request.
///
/// On input, `recommendations` and `reviews` may be absent or null and
/// `service_addresses` is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAggregate {
    pub product_id: i32,
    pub name: String,
    pub weight: i32,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recommendations: Vec<RecommendationSummary>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reviews: Vec<ReviewSummary>,
    #[serde(default)]
    pub service_addresses: Option<ServiceAddresses>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
