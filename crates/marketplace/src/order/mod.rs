use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod delivery;
pub mod status;

pub use delivery::{Delivery, DeliveryStatus};
pub use status::OrderStatus;

use crate::{Cart, CartItem, MenuItemId, OrderId, UserId};

/// Read-only client projection of a server-owned order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "orderDate")]
    pub placed_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    pub total_price: Decimal,
    pub order_status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,
}

impl Order {
    pub const fn is_active(&self) -> bool {
        self.order_status.is_active()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub user_id: UserId,
    pub items: Vec<OrderItemRequest>,
    pub total_price: Decimal,
    pub delivery_address: String,
}

impl OrderRequest {
    pub fn from_cart(user_id: UserId, cart: &Cart, delivery_address: impl Into<String>) -> Self {
        let items = cart
            .items
            .iter()
            .map(|item| OrderItemRequest {
                menu_item_id: item.menu_item_id(),
                quantity: item.quantity,
            })
            .collect();

        Self {
            user_id,
            items,
            total_price: cart.total_price(),
            delivery_address: delivery_address.into(),
        }
    }
}
