//! # Held Transaction Commands
//!
//! Purely local: holding never touches inventory or the backend. A resumed
//! cart goes through the normal checkout gates, so stale prices or stock
//! are caught at commit time.

use chrono::Utc;
use tracing::{debug, info};

use rxdesk_core::HeldTransaction;

use crate::commands::cart::CartView;
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::CartState;

/// Parks the active cart and clears it.
pub async fn hold_cart(cart: &CartState, customer_name: &str) -> ApiResult<HeldTransaction> {
    debug!(customer = %customer_name, "hold_cart command");

    let held = cart
        .with_held(|c, held| held.hold(c, customer_name, Utc::now()))
        .await?;

    info!(id = %held.id, lines = held.items.len(), total = held.total.minor(), "Cart held");
    Ok(held)
}

/// Puts a held cart back. Refused while the active cart has lines, so
/// nothing is silently overwritten.
pub async fn resume_held(cart: &CartState, id: &str) -> ApiResult<CartView> {
    debug!(id = %id, "resume_held command");

    cart.with_held(|c, held| -> ApiResult<CartView> {
        if !c.is_empty() {
            return Err(ApiError::new(
                ErrorCode::CartError,
                "Hold or clear the current cart before resuming another",
            ));
        }
        let resumed = held.resume_into(id, c)?;
        info!(id = %resumed.id, lines = resumed.items.len(), "Held cart resumed");
        Ok(CartView::from(&*c))
    })
    .await
}

/// Discards a held cart without resuming it.
pub async fn delete_held(cart: &CartState, id: &str) -> ApiResult<()> {
    cart.with_held(|_, held| held.delete(id)).await?;
    info!(id = %id, "Held cart deleted");
    Ok(())
}

/// Newest first.
pub async fn list_held(cart: &CartState) -> Vec<HeldTransaction> {
    cart.with_held(|_, held| held.list().into_iter().cloned().collect())
        .await
}
