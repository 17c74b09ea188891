//! # Invoice Command
//!
//! Unpaid invoice slips for credit customers. The backend issues the short
//! code and barcode, so this is online only. The cart stays as it is: the
//! cashier decides whether to clear it once the slip is printed.

use chrono::{Local, Utc};
use tracing::{debug, info, warn};

use rxdesk_core::{ReceiptDocument, SaleReconciler};

use crate::error::{ApiError, ApiResult};
use crate::state::{CartState, InventoryProvider, TillConfig};

pub async fn generate_invoice(
    cart: &CartState,
    inventory: &InventoryProvider,
    config: &TillConfig,
    customer_name: Option<String>,
) -> ApiResult<ReceiptDocument> {
    let cart = cart.lock().await;
    debug!(lines = cart.len(), "generate_invoice command");

    let reconciler = SaleReconciler::new(config.checkout_context());
    reconciler.check_expiry(&cart, Local::now().date_naive())?;

    let request = reconciler.build_pending_request(&cart)?;
    let pending = match inventory.backend().create_pending_transaction(&request).await {
        Ok(pending) => {
            inventory.set_offline(false);
            pending
        }
        Err(e) if e.is_transient() => {
            inventory.set_offline(true);
            warn!(error = %e, "Invoice not issued");
            return Err(ApiError::offline("Generating an invoice"));
        }
        Err(e) => return Err(e.into()),
    };

    let customer_name = customer_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    let document = ReceiptDocument::unpaid_invoice(
        &cart,
        &pending,
        config.letterhead(),
        config.currency_format(),
        customer_name,
        Utc::now(),
    )?;

    info!(short_code = %pending.short_code, total = document.total.minor(), "Invoice issued");
    Ok(document)
}
