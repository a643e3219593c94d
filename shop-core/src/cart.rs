use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{CartId, CartItemId, ProductId};
use crate::money::{Price, Quantity};
use crate::order::{subtotal, PricedLine};

/// One product line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub product: ProductId,
    pub title: String,
    pub unit_price: Price,
    pub quantity: Quantity,
    pub line_total: Price,
}

impl CartLine {
    /// Builds a line, computing its total from the current product price.
    ///
    /// # Errors
    /// Returns [`CoreError::AmountOverflow`] if the line total exceeds ten digits.
    pub fn new(
        id: CartItemId,
        product: ProductId,
        title: String,
        unit_price: Price,
        quantity: Quantity,
    ) -> Result<Self, CoreError> {
        let line_total = unit_price.checked_mul(quantity)?;
        Ok(Self { id, product, title, unit_price, quantity, line_total })
    }

    /// This line as a priced line.
    #[must_use]
    pub fn priced(&self) -> PricedLine {
        PricedLine { unit_price: self.unit_price, quantity: self.quantity }
    }
}

/// A shopping cart with its lines and running total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub items: Vec<CartLine>,
    pub total: Price,
}

impl Cart {
    /// Builds a cart view, summing its lines.
    ///
    /// # Errors
    /// Returns [`CoreError::AmountOverflow`] if the total exceeds ten digits.
    pub fn new(id: CartId, items: Vec<CartLine>) -> Result<Self, CoreError> {
        let lines: Vec<PricedLine> = items.iter().map(CartLine::priced).collect();
        let total = subtotal(&lines)?;
        Ok(Self { id, items, total })
    }

    /// Returns `true` when the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
