use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CartItemId, MarketplaceError, MenuItemId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// One line of the cart. `quantity` is always at least one; a line whose
/// quantity would reach zero is removed instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub menu_item: MenuItem,
    pub quantity: u32,
}

impl CartItem {
    pub const fn menu_item_id(&self) -> MenuItemId {
        self.menu_item.id
    }

    pub const fn unit_price(&self) -> Decimal {
        self.menu_item.price
    }

    pub fn line_total(&self) -> Decimal {
        self.menu_item.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of `unit_price * quantity` over the current lines.
    pub fn total_price(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Adds `quantity` units of `menu_item`, merging into an existing line for
    /// the same menu entry.
    pub fn add_item(
        &mut self,
        menu_item: MenuItem,
        quantity: u32,
    ) -> Result<&CartItem, MarketplaceError> {
        if quantity == 0 {
            return Err(MarketplaceError::InvalidQuantity(quantity));
        }

        if let Some(index) = self
            .items
            .iter()
            .position(|item| item.menu_item_id() == menu_item.id)
        {
            let item = &mut self.items[index];
            item.quantity += quantity;
            return Ok(&self.items[index]);
        }

        let id = self.next_item_id();
        self.items.push(CartItem {
            id,
            menu_item,
            quantity,
        });

        let index = self.items.len() - 1;
        Ok(&self.items[index])
    }

    /// Decrements the line by one unit, dropping it when it was the last one.
    /// Returns the remaining quantity of the line.
    pub fn remove_item(&mut self, cart_item_id: CartItemId) -> Result<u32, MarketplaceError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == cart_item_id)
            .ok_or(MarketplaceError::CartItemNotFound(cart_item_id))?;

        if self.items[index].quantity > 1 {
            self.items[index].quantity -= 1;
            Ok(self.items[index].quantity)
        } else {
            self.items.remove(index);
            Ok(0)
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    // Local ids only need to be unique within this cart until the backend
    // projection replaces them.
    fn next_item_id(&self) -> CartItemId {
        let max = self.items.iter().map(|item| item.id.0).max().unwrap_or(0);
        CartItemId(max + 1)
    }
}
