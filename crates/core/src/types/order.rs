//! Order records for the pass-through order endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{OrderId, ProductId};
use super::money::Money;

/// Fulfillment status of an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

/// A purchased line within an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    /// Product purchased.
    pub product: ProductId,
    /// Product name at time of purchase.
    pub name: String,
    /// Unit price at time of purchase.
    pub price: Money,
    /// Units purchased.
    pub quantity: u32,
    /// Primary image URL at time of purchase.
    #[serde(default)]
    pub image: String,
}

/// Shipping destination for an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub phone: String,
}

/// An order as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,
    pub order_number: String,
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub items_price: Money,
    pub tax_price: Money,
    pub shipping_price: Money,
    pub total_price: Money,
    pub status: OrderStatus,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for creating an order from the current cart.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub order_items: Vec<CreateOrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub items_price: Money,
    pub tax_price: Money,
    pub shipping_price: Money,
    pub total_price: Money,
}

/// One line of a [`CreateOrder`] payload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateOrderItem {
    pub product: ProductId,
    pub quantity: u32,
}

/// Payment confirmation recorded against an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub email_address: Option<String>,
}

/// A page of orders with pagination metadata.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

/// Pagination metadata shared by paged endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current: u32,
    pub pages: u32,
    pub total: u64,
    pub has_next: bool,
    pub has_prev: bool,
}
