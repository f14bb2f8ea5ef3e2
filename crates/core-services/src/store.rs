//! Storage for entities owned by a product, keyed by `(productId, childId)`.

use std::collections::BTreeMap;

use common::ProductId;
use tokio::sync::RwLock;

use crate::{Result, ServiceError};

/// Checks a raw product id, reporting it as invalid input.
pub(crate) fn validate_product_id(product_id: i32) -> Result<ProductId> {
    ProductId::parse(product_id).map_err(|e| ServiceError::InvalidInput(e.to_string()))
}

/// Uniqueness is enforced on the composite key.
pub(crate) struct OwnedStore<T> {
    entries: RwLock<BTreeMap<(i32, i32), T>>,
}

impl<T: Clone> OwnedStore<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Entities of one product, ordered by child id.
    pub(crate) async fn owned_by(&self, product_id: i32) -> Vec<T> {
        self.entries
            .read()
            .await
            .range((product_id, i32::MIN)..=(product_id, i32::MAX))
            .map(|(_, entity)| entity.clone())
            .collect()
    }

    /// Inserts unless the key is taken; returns whether it was inserted.
    pub(crate) async fn insert_new(&self, key: (i32, i32), entity: T) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, entity);
        true
    }

    /// Removes every entity of one product; returns how many went.
    pub(crate) async fn remove_owned_by(&self, product_id: i32) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(owner, _), _| *owner != product_id);
        before - entries.len()
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
