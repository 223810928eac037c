use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

pub mod cart;
pub mod error;
pub mod http;
pub mod order;
pub mod payment;
pub mod restaurant;
pub mod session;

pub use cart::{Cart, CartItem, MenuItem};
pub use error::{MarketplaceError, PaymentError};
pub use http::{ApiEnv, HttpMarketplace};
pub use order::{Delivery, DeliveryStatus, Order, OrderItemRequest, OrderRequest, OrderStatus};
pub use payment::{
    PaymentDetails, PaymentGateway, PaymentIntent, PaymentReceipt, SimulatedGateway,
};
pub use restaurant::Restaurant;
pub use session::{BearerToken, Session};
pub use test::TestMarketplace;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of the authenticated principal.
    UserId
);
numeric_id!(MenuItemId);
numeric_id!(CartItemId);
numeric_id!(OrderId);
numeric_id!(RestaurantId);

/// The marketplace backend as seen by the client.
///
/// Every call acts on behalf of the principal the implementation was built
/// for; implementations never read ambient session state.
#[async_trait]
pub trait Marketplace: Send + Sync + 'static {
    async fn restaurants(&self, category: Option<&str>)
    -> Result<Vec<Restaurant>, MarketplaceError>;

    /// A single restaurant together with its menu.
    async fn restaurant(&self, id: RestaurantId) -> Result<Restaurant, MarketplaceError>;

    async fn fetch_cart(&self) -> Result<Cart, MarketplaceError>;

    async fn add_to_cart(
        &self,
        menu_item_id: MenuItemId,
        quantity: u32,
    ) -> Result<Cart, MarketplaceError>;

    /// Removes one unit of the given cart line. A line at quantity one is
    /// dropped from the cart.
    async fn remove_from_cart(&self, cart_item_id: CartItemId) -> Result<Cart, MarketplaceError>;

    async fn clear_cart(&self) -> Result<Cart, MarketplaceError>;

    async fn create_payment_intent(&self, amount: Decimal)
    -> Result<PaymentIntent, MarketplaceError>;

    async fn place_order(&self, request: &OrderRequest) -> Result<Order, MarketplaceError>;

    /// Full order list of the principal, newest first as returned by the backend.
    async fn fetch_orders(&self) -> Result<Vec<Order>, MarketplaceError>;

    fn user_id(&self) -> UserId;
}

/// Type alias for a dynamic marketplace trait object wrapped in Arc
pub type DynMarketplace = Arc<dyn Marketplace>;
