//! # Cart Commands
//!
//! No stock checks happen here; the checkout gates own that.

use serde::Serialize;
use tracing::debug;

use rxdesk_core::{Cart, CartLine, CartTotals};

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::{CartState, InventoryProvider};

/// What a cart view renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
    pub last_item_id: Option<String>,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        CartView {
            lines: cart.lines().to_vec(),
            totals: CartTotals::from(cart),
            last_item_id: cart.last_item_id().map(str::to_string),
        }
    }
}

pub async fn get_cart(cart: &CartState) -> CartView {
    cart.with_cart(|c| CartView::from(c)).await
}

/// Adds by barcode or product id, looked up in the current snapshot.
pub async fn add_to_cart(
    cart: &CartState,
    inventory: &InventoryProvider,
    code: &str,
    quantity: i64,
) -> ApiResult<CartView> {
    debug!(code = %code, quantity, "add_to_cart command");

    let item = inventory
        .find(code)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", code))?;

    cart.with_cart_mut(|c| -> ApiResult<CartView> {
        c.add_item(&item, quantity)?;
        Ok(CartView::from(&*c))
    })
    .await
}

pub async fn increment_item(cart: &CartState, product_id: &str) -> ApiResult<CartView> {
    cart.with_cart_mut(|c| -> ApiResult<CartView> {
        c.increment_quantity(product_id)?;
        Ok(CartView::from(&*c))
    })
    .await
}

/// Removes the line when it drops below one.
pub async fn decrement_item(cart: &CartState, product_id: &str) -> ApiResult<CartView> {
    cart.with_cart_mut(|c| -> ApiResult<CartView> {
        c.decrement_quantity(product_id)?;
        Ok(CartView::from(&*c))
    })
    .await
}

/// `quantity == 0` removes the line.
pub async fn set_item_quantity(
    cart: &CartState,
    product_id: &str,
    quantity: i64,
) -> ApiResult<CartView> {
    debug!(product_id = %product_id, quantity, "set_item_quantity command");
    cart.with_cart_mut(|c| -> ApiResult<CartView> {
        c.set_quantity(product_id, quantity)?;
        Ok(CartView::from(&*c))
    })
    .await
}

/// Keyboard `+`/`-`: adjusts the most recently touched line by one.
pub async fn adjust_last_item(cart: &CartState, increase: bool) -> ApiResult<CartView> {
    cart.with_cart_mut(|c| -> ApiResult<CartView> {
        let id = c
            .last_item_id()
            .map(str::to_string)
            .ok_or_else(|| ApiError::new(ErrorCode::CartError, "Cart is empty"))?;
        if increase {
            c.increment_quantity(&id)?;
        } else {
            c.decrement_quantity(&id)?;
        }
        Ok(CartView::from(&*c))
    })
    .await
}

pub async fn remove_from_cart(cart: &CartState, product_id: &str) -> ApiResult<CartView> {
    cart.with_cart_mut(|c| -> ApiResult<CartView> {
        c.remove_item(product_id)?;
        Ok(CartView::from(&*c))
    })
    .await
}

pub async fn clear_cart(cart: &CartState) -> CartView {
    cart.with_cart_mut(|c| {
        c.clear();
        CartView::from(&*c)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rxdesk_backend::InMemoryBackend;
    use rxdesk_core::{InventorySnapshotItem, Money};
    use rxdesk_db::{Database, DbConfig};

    async fn setup() -> (CartState, InventoryProvider) {
        let backend = InMemoryBackend::new();
        backend
            .set_inventory(
                "b1",
                vec![InventorySnapshotItem {
                    product_id: "p1".to_string(),
                    name: "Paracetamol 500mg".to_string(),
                    branch_stock: 3,
                    selling_price: Some(Money::from_minor(500)),
                    unit_price: Money::from_minor(400),
                    expiry_date: None,
                    reorder_level: 0,
                    batch_number: None,
                    barcode: Some("6001".to_string()),
                }],
            )
            .await;
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        (
            CartState::new(),
            InventoryProvider::new("b1", Arc::new(backend), db),
        )
    }

    #[tokio::test]
    async fn test_scan_twice_increments_one_line() {
        let (cart, inventory) = setup().await;

        add_to_cart(&cart, &inventory, "6001", 1).await.unwrap();
        let view = add_to_cart(&cart, &inventory, "p1", 1).await.unwrap();

        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.totals.total_items, 2);
        assert_eq!(view.totals.total, Money::from_minor(1000));
    }

    #[tokio::test]
    async fn test_add_does_not_check_stock() {
        let (cart, inventory) = setup().await;
        let view = add_to_cart(&cart, &inventory, "p1", 50).await.unwrap();
        assert_eq!(view.totals.total_items, 50);
    }

    #[tokio::test]
    async fn test_unknown_code_not_found() {
        let (cart, inventory) = setup().await;
        let err = add_to_cart(&cart, &inventory, "nope", 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_adjust_last_item_down_to_removal() {
        let (cart, inventory) = setup().await;
        add_to_cart(&cart, &inventory, "p1", 1).await.unwrap();

        let view = adjust_last_item(&cart, true).await.unwrap();
        assert_eq!(view.totals.total_items, 2);

        adjust_last_item(&cart, false).await.unwrap();
        let view = adjust_last_item(&cart, false).await.unwrap();
        assert!(view.lines.is_empty());

        let err = adjust_last_item(&cart, false).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CartError);
    }
}
