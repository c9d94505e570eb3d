//! Cart store.
//!
//! Aggregates are the invariant here: after every mutation, local or
//! server-confirmed, `total_items == Σ quantity` and
//! `total_price == Σ quantity × unit price`. They are recomputed
//! synchronously inside [`Collection::apply`], never left stale.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use copperleaf_core::{Money, ProductId, ProductSummary};

use crate::error::ApiError;
use crate::http::RequestPipeline;
use crate::persist::PersistenceGateway;

use super::{Collection, OptimisticStore, SharedStore, StoreSnapshot, WriteKind};

/// One line of the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartLine {
    /// The referenced product. Unique across lines.
    pub product: ProductSummary,
    /// Units of the product. Always positive; zero removes the line.
    pub quantity: u32,
    /// Unit price captured when the line was created.
    pub price: Money,
}

impl CartLine {
    fn total(&self) -> Money {
        self.price * self.quantity
    }
}

/// The cart collection with its derived aggregates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartCollection {
    /// Cart lines in insertion order.
    #[serde(default)]
    pub items: Vec<CartLine>,
    /// `Σ quantity` over all lines.
    #[serde(default)]
    pub total_items: u32,
    /// `Σ quantity × unit price` over all lines.
    #[serde(default)]
    pub total_price: Money,
}

impl CartCollection {
    /// Whether a product is already in the cart.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.items.iter().any(|line| &line.product.id == product_id)
    }

    fn recompute(&mut self) {
        self.total_items = self
            .items
            .iter()
            .fold(0u32, |sum, line| sum.saturating_add(line.quantity));
        self.total_price = self.items.iter().map(CartLine::total).sum();
    }
}

/// The cart mutation vocabulary.
#[derive(Debug, Clone)]
pub enum CartMutation {
    /// Add units of a product; an existing line increments its quantity
    /// instead of duplicating.
    Add {
        product: ProductSummary,
        quantity: u32,
    },
    /// Set a line's quantity. Zero removes the line; an unknown product is
    /// a no-op.
    Update {
        product_id: ProductId,
        quantity: u32,
    },
    /// Remove a line. Idempotent: an absent product is a no-op.
    Remove { product_id: ProductId },
    /// Empty the cart.
    Clear,
}

impl Collection for CartCollection {
    type Mutation = CartMutation;

    fn apply(&mut self, mutation: &Self::Mutation) {
        match mutation {
            CartMutation::Add { product, quantity } => {
                if let Some(line) = self
                    .items
                    .iter_mut()
                    .find(|line| line.product.id == product.id)
                {
                    line.quantity = line.quantity.saturating_add(*quantity);
                } else {
                    self.items.push(CartLine {
                        product: product.clone(),
                        quantity: *quantity,
                        price: product.price,
                    });
                }
            }
            CartMutation::Update {
                product_id,
                quantity,
            } => {
                if *quantity == 0 {
                    self.items.retain(|line| &line.product.id != product_id);
                } else if let Some(line) = self
                    .items
                    .iter_mut()
                    .find(|line| &line.product.id == product_id)
                {
                    line.quantity = *quantity;
                }
            }
            CartMutation::Remove { product_id } => {
                self.items.retain(|line| &line.product.id != product_id);
            }
            CartMutation::Clear => self.items.clear(),
        }
        self.recompute();
    }
}

/// Request body for the add and update endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartItemBody<'a> {
    product_id: &'a ProductId,
    quantity: u32,
}

/// Response of the lightweight badge-count endpoint.
#[derive(Debug, Deserialize)]
struct CartCount {
    count: u32,
}

/// Optimistic cart store.
///
/// Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    store: SharedStore<CartCollection>,
    pipeline: RequestPipeline,
    persistence: PersistenceGateway,
}

impl CartStore {
    /// Create an empty cart store.
    #[must_use]
    pub fn new(pipeline: RequestPipeline, persistence: PersistenceGateway) -> Self {
        Self {
            inner: Arc::new(CartStoreInner {
                store: Arc::new(OptimisticStore::new()),
                pipeline,
                persistence,
            }),
        }
    }

    /// Current observable state.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot<CartCollection> {
        self.inner.store.snapshot()
    }

    /// Load a previously persisted cart before the UI becomes interactive.
    pub fn hydrate(&self, collection: CartCollection) {
        self.inner.store.hydrate(collection);
    }

    /// Replace local state with server truth.
    ///
    /// # Errors
    ///
    /// Returns the classified error; the local snapshot is left untouched.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) -> Result<CartCollection, ApiError> {
        let ticket = self.inner.store.begin_fetch();
        match self.inner.pipeline.get::<CartCollection>("/cart").await {
            Ok(server) => Ok(self.reconcile(ticket, server, WriteKind::Fetch)),
            Err(err) => {
                self.inner.store.fail(err.to_string(), WriteKind::Fetch);
                Err(err)
            }
        }
    }

    /// Add units of a product.
    ///
    /// # Errors
    ///
    /// Returns the classified error; the optimistic change is kept.
    #[instrument(skip(self, product), fields(product_id = %product.id, quantity))]
    pub async fn add(
        &self,
        product: ProductSummary,
        quantity: u32,
    ) -> Result<CartCollection, ApiError> {
        let product_id = product.id.clone();
        let mutation = CartMutation::Add { product, quantity };
        let body = CartItemBody {
            product_id: &product_id,
            quantity,
        };
        self.mutate(&mutation, async {
            self.inner.pipeline.post("/cart/add", &body).await
        })
        .await
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns the classified error; the optimistic change is kept.
    #[instrument(skip(self), fields(product_id = %product_id, quantity))]
    pub async fn update_quantity(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartCollection, ApiError> {
        let body = CartItemBody {
            product_id: &product_id,
            quantity,
        };
        let mutation = CartMutation::Update {
            product_id: product_id.clone(),
            quantity,
        };
        self.mutate(&mutation, async {
            self.inner.pipeline.put("/cart/update", &body).await
        })
        .await
    }

    /// Remove a product's line. A no-op server-side and locally if absent.
    ///
    /// # Errors
    ///
    /// Returns the classified error; the optimistic change is kept.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove(&self, product_id: ProductId) -> Result<CartCollection, ApiError> {
        let path = format!("/cart/remove/{product_id}");
        let mutation = CartMutation::Remove { product_id };
        self.mutate(&mutation, async { self.inner.pipeline.delete(&path).await })
            .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns the classified error; the optimistic change is kept.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<CartCollection, ApiError> {
        self.mutate(&CartMutation::Clear, async {
            self.inner.pipeline.delete("/cart/clear").await
        })
        .await
    }

    /// Badge count straight from the server; does not touch local state.
    ///
    /// # Errors
    ///
    /// Returns the classified error.
    pub async fn count(&self) -> Result<u32, ApiError> {
        let count: CartCount = self.inner.pipeline.get("/cart/count").await?;
        Ok(count.count)
    }

    /// Drop local state back to the empty cart (logout, invalidation).
    pub fn reset(&self) {
        let empty = self.inner.store.reset();
        self.inner.persistence.save_cart(&empty);
    }

    /// Optimistic apply, network call, reconcile.
    async fn mutate<F>(
        &self,
        mutation: &CartMutation,
        call: F,
    ) -> Result<CartCollection, ApiError>
    where
        F: Future<Output = Result<CartCollection, ApiError>>,
    {
        let (ticket, optimistic) = self.inner.store.apply_local(mutation);
        self.inner.persistence.save_cart(&optimistic);

        match call.await {
            Ok(server) => Ok(self.reconcile(ticket, server, WriteKind::Mutation)),
            Err(err) => {
                self.inner.store.fail(err.to_string(), WriteKind::Mutation);
                Err(err)
            }
        }
    }

    fn reconcile(&self, ticket: u64, server: CartCollection, kind: WriteKind) -> CartCollection {
        match self.inner.store.commit(ticket, server, kind) {
            Some(applied) => {
                self.inner.persistence.save_cart(&applied);
                applied
            }
            // Stale response dropped; current state is already newer.
            None => self.inner.store.snapshot().collection,
        }
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore").finish_non_exhaustive()
    }
}
