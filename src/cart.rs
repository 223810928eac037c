use quickbite_marketplace::{Cart, CartItemId, Marketplace, MenuItemId};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::CartError;

/// Session-scoped cart kept in sync with the backend. Every mutation goes
/// through the marketplace and the returned cart replaces the local one.
pub struct CartService<M: Marketplace + ?Sized> {
    marketplace: Arc<M>,
    cart: Cart,
}

impl<M: Marketplace + ?Sized> CartService<M> {
    pub fn new(marketplace: Arc<M>) -> Self {
        Self {
            marketplace,
            cart: Cart::default(),
        }
    }

    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    pub fn total_price(&self) -> Decimal {
        self.cart.total_price()
    }

    pub async fn load(&mut self) -> Result<&Cart, CartError> {
        let cart = self.marketplace.fetch_cart().await?;
        Ok(self.replace(cart))
    }

    pub async fn add(
        &mut self,
        menu_item_id: MenuItemId,
        quantity: u32,
    ) -> Result<&Cart, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        info!("Adding {quantity} x menu item {menu_item_id} to cart");
        let cart = self.marketplace.add_to_cart(menu_item_id, quantity).await?;
        Ok(self.replace(cart))
    }

    /// Removes one unit of the line; the line disappears when it was the last unit.
    pub async fn remove(&mut self, cart_item_id: CartItemId) -> Result<&Cart, CartError> {
        info!("Removing one unit of cart item {cart_item_id}");
        let cart = self.marketplace.remove_from_cart(cart_item_id).await?;
        Ok(self.replace(cart))
    }

    pub async fn clear(&mut self) -> Result<&Cart, CartError> {
        info!("Clearing cart");
        let cart = self.marketplace.clear_cart().await?;
        Ok(self.replace(cart))
    }

    fn replace(&mut self, cart: Cart) -> &Cart {
        self.cart = cart;
        debug!(
            "Cart now has {} lines totalling {:.2}",
            self.cart.items.len(),
            self.cart.total_price()
        );
        &self.cart
    }
}
