//! Orders client.
//!
//! Thin typed pass-through over the order endpoints. Orders are server
//! truth from the moment they are created, so nothing here is optimistic
//! or cached.

use std::sync::Arc;

use serde::Deserialize;
use tracing::instrument;

use copperleaf_core::{CreateOrder, Order, OrderId, OrderPage, PaymentReceipt};

use crate::error::ApiError;
use crate::http::RequestPipeline;

/// Secret handed to the payment form to complete a charge.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub client_secret: String,
}

/// Orders client. Cheap to clone.
#[derive(Clone)]
pub struct OrdersClient {
    inner: Arc<OrdersInner>,
}

struct OrdersInner {
    pipeline: RequestPipeline,
}

impl OrdersClient {
    /// Create an orders client over the shared pipeline.
    #[must_use]
    pub fn new(pipeline: RequestPipeline) -> Self {
        Self {
            inner: Arc::new(OrdersInner { pipeline }),
        }
    }

    /// Place an order from checkout state.
    ///
    /// # Errors
    ///
    /// Returns the classified request error; a 400 carries the service's
    /// validation message (for example, insufficient stock).
    #[instrument(skip_all)]
    pub async fn create_order(&self, order: &CreateOrder) -> Result<Order, ApiError> {
        self.inner.pipeline.post("/orders", order).await
    }

    /// Fetch one page of the shopper's order history.
    ///
    /// # Errors
    ///
    /// Returns the classified request error.
    #[instrument(skip(self))]
    pub async fn my_orders(&self, page: u32, limit: u32) -> Result<OrderPage, ApiError> {
        let path = format!("/orders/my-orders?page={page}&limit={limit}");
        self.inner.pipeline.get(&path).await
    }

    /// Fetch one order.
    ///
    /// # Errors
    ///
    /// Returns the classified request error; another shopper's order maps
    /// to [`ApiError::Forbidden`].
    #[instrument(skip(self), fields(order = %id))]
    pub async fn get_order(&self, id: &OrderId) -> Result<Order, ApiError> {
        self.inner.pipeline.get(&format!("/orders/{id}")).await
    }

    /// Start a payment attempt for an order.
    ///
    /// # Errors
    ///
    /// Returns the classified request error.
    #[instrument(skip(self), fields(order = %id))]
    pub async fn create_payment_intent(&self, id: &OrderId) -> Result<PaymentIntent, ApiError> {
        self.inner
            .pipeline
            .post_empty(&format!("/orders/{id}/create-payment-intent"))
            .await
    }

    /// Record a completed payment against an order.
    ///
    /// # Errors
    ///
    /// Returns the classified request error.
    #[instrument(skip(self, receipt), fields(order = %id))]
    pub async fn mark_paid(
        &self,
        id: &OrderId,
        receipt: &PaymentReceipt,
    ) -> Result<Order, ApiError> {
        self.inner
            .pipeline
            .put(&format!("/orders/{id}/pay"), receipt)
            .await
    }

    /// Cancel an order that has not shipped.
    ///
    /// # Errors
    ///
    /// Returns the classified request error; a 400 carries the service's
    /// reason when the order can no longer be cancelled.
    #[instrument(skip(self), fields(order = %id))]
    pub async fn cancel(&self, id: &OrderId) -> Result<Order, ApiError> {
        self.inner
            .pipeline
            .put(&format!("/orders/{id}/cancel"), &serde_json::json!({}))
            .await
    }
}

impl std::fmt::Debug for OrdersClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersClient").finish_non_exhaustive()
    }
}
