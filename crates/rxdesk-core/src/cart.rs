//! # Cart Store
//!
//! The mutable working set of lines for one in-progress sale.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Scan / click product ─────► add_item()        ─► push or qty += n      │
//! │  "+" / shortcut ───────────► increment_quantity() ─► qty += 1           │
//! │  "-" / shortcut ───────────► decrement_quantity() ─► qty -= 1 (0 drops) │
//! │  Trash icon ───────────────► remove_item()     ─► line removed          │
//! │  Cancel sale / commit ─────► clear()           ─► empty                 │
//! │                                                                         │
//! │  NOTE: no stock check happens here. Stock is verified once, at         │
//! │        commit time, against a fresh snapshot.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by `product_id` (adding the same product again
//!   increases quantity)
//! - Every line has quantity >= 1
//! - At most `MAX_CART_LINES` lines, at most `MAX_ITEM_QUANTITY` per line

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CartLine, InventorySnapshot, InventorySnapshotItem};
use crate::validation::{validate_cart_size, validate_product_id, validate_quantity};
use crate::MAX_ITEM_QUANTITY;

/// The shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    lines: Vec<CartLine>,

    /// Line most recently added or adjusted; keyboard shortcuts act on it.
    last_touched: Option<String>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds a product or increases its quantity if already present.
    ///
    /// The product's name, prices and expiry are frozen into the line the
    /// first time it is added.
    pub fn add_item(&mut self, product: &InventorySnapshotItem, quantity: i64) -> CoreResult<()> {
        validate_product_id(&product.product_id)?;
        validate_quantity(quantity)?;

        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product.product_id)
        {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            line.quantity = new_qty;
            self.last_touched = Some(product.product_id.clone());
            return Ok(());
        }

        validate_cart_size(self.lines.len()).map_err(|_| CoreError::CartTooLarge {
            max: crate::MAX_CART_LINES,
        })?;

        self.lines.push(CartLine {
            product_id: product.product_id.clone(),
            product: product.to_product_snapshot(),
            quantity,
            quoted_price: product.effective_price(),
        });
        self.last_touched = Some(product.product_id.clone());
        Ok(())
    }

    /// Adds one to a line's quantity.
    pub fn increment_quantity(&mut self, product_id: &str) -> CoreResult<()> {
        let line = self.line_mut(product_id)?;
        if line.quantity + 1 > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: line.quantity + 1,
                max: MAX_ITEM_QUANTITY,
            });
        }
        line.quantity += 1;
        self.last_touched = Some(product_id.to_string());
        Ok(())
    }

    /// Takes one off a line's quantity; a line at 1 is removed.
    pub fn decrement_quantity(&mut self, product_id: &str) -> CoreResult<()> {
        let line = self.line_mut(product_id)?;
        if line.quantity <= 1 {
            return self.remove_item(product_id);
        }
        line.quantity -= 1;
        self.last_touched = Some(product_id.to_string());
        Ok(())
    }

    /// Sets a line's quantity outright. Zero removes the line.
    pub fn set_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }
        validate_quantity(quantity)?;

        let line = self.line_mut(product_id)?;
        line.quantity = quantity;
        self.last_touched = Some(product_id.to_string());
        Ok(())
    }

    /// Removes a line by product ID.
    pub fn remove_item(&mut self, product_id: &str) -> CoreResult<()> {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);

        if self.lines.len() == initial_len {
            return Err(CoreError::NotInCart(product_id.to_string()));
        }

        if self.last_touched.as_deref() == Some(product_id) {
            self.last_touched = self.lines.last().map(|l| l.product_id.clone());
        }
        Ok(())
    }

    /// Clears all lines.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.last_touched = None;
    }

    /// Replaces the cart contents, e.g. when resuming a held transaction.
    pub fn restore(&mut self, lines: Vec<CartLine>) {
        self.last_touched = lines.last().map(|l| l.product_id.clone());
        self.lines = lines;
    }

    /// Overwrites each line's working prices with the snapshot's. Lines the
    /// snapshot does not carry keep theirs. Quoted prices are left alone.
    pub(crate) fn reprice(&mut self, snapshot: &InventorySnapshot) {
        for line in &mut self.lines {
            if let Some(item) = snapshot.get(&line.product_id) {
                line.product.unit_price = item.unit_price;
                line.product.selling_price = item.selling_price;
            }
        }
    }

    /// Marks every working price as shown to the cashier.
    pub fn acknowledge_prices(&mut self) {
        for line in &mut self.lines {
            line.quoted_price = line.product.effective_price();
        }
    }

    /// Sum of quantity × (selling price ?? unit price) over all lines.
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Total number of units across all lines.
    pub fn total_items(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// The line keyboard shortcuts should act on.
    pub fn last_item_id(&self) -> Option<&str> {
        self.last_touched
            .as_deref()
            .or_else(|| self.lines.last().map(|l| l.product_id.as_str()))
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Number of distinct lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn line_mut(&mut self, product_id: &str) -> CoreResult<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or_else(|| CoreError::NotInCart(product_id.to_string()))
    }
}

/// Cart totals summary for API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub line_count: usize,
    pub total_items: i64,
    pub total: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            line_count: cart.len(),
            total_items: cart.total_items(),
            total: cart.total(),
        }
    }
}
