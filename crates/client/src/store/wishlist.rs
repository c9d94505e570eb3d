//! Wishlist store.
//!
//! A set of full product snapshots keyed by product id. All mutations are
//! idempotent set operations; the add/remove endpoints acknowledge without
//! returning the collection, so the acknowledged optimistic mutation is the
//! reconciliation and a full fetch replaces wholesale.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use copperleaf_core::{Product, ProductId};

use crate::error::ApiError;
use crate::http::RequestPipeline;
use crate::persist::PersistenceGateway;

use super::{Collection, OptimisticStore, SharedStore, StoreSnapshot, WriteKind};

/// The wishlist collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct WishlistCollection {
    /// Product snapshots, unique by product id, in insertion order.
    pub items: Vec<Product>,
}

impl WishlistCollection {
    /// Whether a product is on the wishlist.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.items.iter().any(|item| &item.id == product_id)
    }

    /// Number of wishlisted products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the wishlist is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The wishlist mutation vocabulary.
#[derive(Debug, Clone)]
pub enum WishlistMutation {
    /// Add a product snapshot; a present product is a no-op.
    Add(Product),
    /// Remove by product id; an absent product is a no-op.
    Remove(ProductId),
    /// Empty the set.
    Clear,
}

impl Collection for WishlistCollection {
    type Mutation = WishlistMutation;

    fn apply(&mut self, mutation: &Self::Mutation) {
        match mutation {
            WishlistMutation::Add(product) => {
                if !self.contains(&product.id) {
                    self.items.push(product.clone());
                }
            }
            WishlistMutation::Remove(product_id) => {
                self.items.retain(|item| &item.id != product_id);
            }
            WishlistMutation::Clear => self.items.clear(),
        }
    }
}

/// Response of the membership-check endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WishlistStatus {
    is_in_wishlist: bool,
}

/// Optimistic wishlist store.
///
/// Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct WishlistStore {
    inner: Arc<WishlistStoreInner>,
}

struct WishlistStoreInner {
    store: SharedStore<WishlistCollection>,
    pipeline: RequestPipeline,
    persistence: PersistenceGateway,
}

impl WishlistStore {
    /// Create an empty wishlist store.
    #[must_use]
    pub fn new(pipeline: RequestPipeline, persistence: PersistenceGateway) -> Self {
        Self {
            inner: Arc::new(WishlistStoreInner {
                store: Arc::new(OptimisticStore::new()),
                pipeline,
                persistence,
            }),
        }
    }

    /// Current observable state.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot<WishlistCollection> {
        self.inner.store.snapshot()
    }

    /// Load a previously persisted wishlist before the UI becomes
    /// interactive.
    pub fn hydrate(&self, collection: WishlistCollection) {
        self.inner.store.hydrate(collection);
    }

    /// Replace local state with server truth.
    ///
    /// # Errors
    ///
    /// Returns the classified error; the local snapshot is left untouched.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) -> Result<WishlistCollection, ApiError> {
        let ticket = self.inner.store.begin_fetch();
        match self
            .inner
            .pipeline
            .get::<Vec<Product>>("/users/wishlist")
            .await
        {
            Ok(items) => {
                let server = WishlistCollection { items };
                match self.inner.store.commit(ticket, server, WriteKind::Fetch) {
                    Some(applied) => {
                        self.inner.persistence.save_wishlist(&applied);
                        Ok(applied)
                    }
                    None => Ok(self.inner.store.snapshot().collection),
                }
            }
            Err(err) => {
                self.inner.store.fail(err.to_string(), WriteKind::Fetch);
                Err(err)
            }
        }
    }

    /// Add a product. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the classified error; the optimistic change is kept.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add(&self, product: Product) -> Result<WishlistCollection, ApiError> {
        let path = format!("/users/wishlist/{}", product.id);
        let mutation = WishlistMutation::Add(product);
        self.mutate(&mutation, async {
            self.inner.pipeline.post_empty::<()>(&path).await
        })
        .await
    }

    /// Remove a product by id. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the classified error; the optimistic change is kept.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove(&self, product_id: ProductId) -> Result<WishlistCollection, ApiError> {
        let path = format!("/users/wishlist/{product_id}");
        let mutation = WishlistMutation::Remove(product_id);
        self.mutate(&mutation, async {
            self.inner.pipeline.delete::<()>(&path).await
        })
        .await
    }

    /// Empty the wishlist.
    ///
    /// # Errors
    ///
    /// Returns the classified error; the optimistic change is kept.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<WishlistCollection, ApiError> {
        self.mutate(&WishlistMutation::Clear, async {
            self.inner.pipeline.delete::<()>("/users/wishlist").await
        })
        .await
    }

    /// Ask the server whether a product is wishlisted; does not touch local
    /// state.
    ///
    /// # Errors
    ///
    /// Returns the classified error.
    pub async fn check(&self, product_id: &ProductId) -> Result<bool, ApiError> {
        let status: WishlistStatus = self
            .inner
            .pipeline
            .get(&format!("/users/wishlist/check/{product_id}"))
            .await?;
        Ok(status.is_in_wishlist)
    }

    /// Local membership check against the current snapshot.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.inner.store.snapshot().collection.contains(product_id)
    }

    /// Drop local state back to the empty wishlist (logout, invalidation).
    pub fn reset(&self) {
        let empty = self.inner.store.reset();
        self.inner.persistence.save_wishlist(&empty);
    }

    /// Optimistic apply, acknowledged call, confirm.
    ///
    /// The endpoints return no collection body, so the optimistic state is
    /// the reconciled state once the server acknowledges.
    async fn mutate<F>(
        &self,
        mutation: &WishlistMutation,
        call: F,
    ) -> Result<WishlistCollection, ApiError>
    where
        F: Future<Output = Result<(), ApiError>>,
    {
        let (_ticket, optimistic) = self.inner.store.apply_local(mutation);
        self.inner.persistence.save_wishlist(&optimistic);

        match call.await {
            Ok(()) => {
                let confirmed = self.inner.store.confirm(WriteKind::Mutation);
                self.inner.persistence.save_wishlist(&confirmed);
                Ok(confirmed)
            }
            Err(err) => {
                self.inner.store.fail(err.to_string(), WriteKind::Mutation);
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for WishlistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WishlistStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: &str) -> Product {
        serde_json::from_value(serde_json::json!({
            "_id": id,
            "name": format!("product {id}"),
            "price": 15.0
        }))
        .unwrap()
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut wishlist = WishlistCollection::default();
        wishlist.apply(&WishlistMutation::Add(product("p")));
        wishlist.apply(&WishlistMutation::Add(product("p")));
        assert_eq!(wishlist.len(), 1);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut wishlist = WishlistCollection::default();
        wishlist.apply(&WishlistMutation::Add(product("p")));
        let before = wishlist.clone();
        wishlist.apply(&WishlistMutation::Remove(ProductId::new("ghost")));
        assert_eq!(wishlist, before);
    }

    #[test]
    fn test_clear_empties_set() {
        let mut wishlist = WishlistCollection::default();
        wishlist.apply(&WishlistMutation::Add(product("a")));
        wishlist.apply(&WishlistMutation::Add(product("b")));
        wishlist.apply(&WishlistMutation::Clear);
        assert!(wishlist.is_empty());
    }

    #[test]
    fn test_serializes_as_bare_array() {
        let mut wishlist = WishlistCollection::default();
        wishlist.apply(&WishlistMutation::Add(product("a")));
        let json = serde_json::to_value(&wishlist).unwrap();
        assert!(json.is_array(), "wire shape is the service's bare array");
    }
}
