//! # Checkout Command
//!
//! ## One Checkout Attempt
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  try_begin ── already running? ──► CHECKOUT_IN_PROGRESS                 │
//! │     │                                                                   │
//! │  lock cart (held until the attempt ends)                                │
//! │     │                                                                   │
//! │  expiry gate ── expired line? ──► EXPIRED_ITEM (no network call)        │
//! │     │                                                                   │
//! │  inventory.refresh() ── backend, or local cache when unreachable        │
//! │     │                                                                   │
//! │  reconcile: expiry, stock (online), price drift vs. quoted price        │
//! │     │            └── shortfall ──► INSUFFICIENT_STOCK (cart untouched)  │
//! │     │                                                                   │
//! │  build request, client reference = unresolved attempt's or new          │
//! │     │                                                                   │
//! │     ├── online:  backend.commit_sale                                    │
//! │     │      ├── network error ──► NETWORK_ERROR, cart and reference kept │
//! │     │      └── rejected ───────► SALE_REJECTED, cart kept               │
//! │     │                                                                   │
//! │     └── offline: journal + local stock decrement, one transaction       │
//! │     │                                                                   │
//! │  finalize ──► receipt ──► clear cart (retained: prices acknowledged)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A network error after the request left the till means the outcome is
//! unknown. The attempt is remembered; retrying the same cart sends the
//! same client reference, and the backend drops it if it already has it.
//!
//! Repricing lands in the cart before the commit, but a line only counts as
//! disclosed once a sale goes through. A failed attempt's price changes are
//! reported again on the next one.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use rxdesk_core::{
    offline_receipt_id, CoreError, FinalizedSale, PaymentDetails, PriceChange, ReceiptDocument,
    SaleReceipt, SaleReconciler, SaleRequest,
};

use crate::error::{ApiError, ApiResult};
use crate::state::{CartState, CheckoutState, InventoryProvider, TillConfig};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub payment: PaymentDetails,

    /// Keep the lines in the cart after the sale (e.g. to sell the same
    /// items again).
    #[serde(default)]
    pub retain_cart: bool,
}

impl CheckoutRequest {
    pub fn new(payment: PaymentDetails) -> Self {
        CheckoutRequest {
            payment,
            retain_cart: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub sale: FinalizedSale,

    /// Lines charged at a different price than when they were added.
    pub price_changes: Vec<PriceChange>,

    /// One message describing every price change, for the cashier.
    pub notice: Option<String>,

    pub receipt: ReceiptDocument,
}

pub async fn checkout(
    cart: &CartState,
    checkout: &CheckoutState,
    inventory: &InventoryProvider,
    config: &TillConfig,
    request: CheckoutRequest,
) -> ApiResult<CheckoutOutcome> {
    let _in_flight = checkout
        .try_begin()
        .ok_or_else(ApiError::checkout_in_progress)?;

    let mut cart = cart.lock().await;
    if cart.is_empty() {
        return Err(CoreError::EmptyCart.into());
    }

    debug!(
        lines = cart.len(),
        method = %request.payment.method,
        "checkout command"
    );

    let reconciler = SaleReconciler::new(config.checkout_context());
    let today = Local::now().date_naive();

    reconciler.check_expiry(&cart, today)?;

    let snapshot = inventory.refresh().await?;
    let reconciliation = reconciler.reconcile(&mut cart, &snapshot, today)?;

    let draft = reconciler.build_sale_request(&cart, &request.payment, "", snapshot.offline)?;
    let sale_request = SaleRequest {
        client_reference: checkout.reference_for(&draft).await,
        ..draft
    };
    let now = Utc::now();

    let receipt = if snapshot.offline {
        commit_offline(inventory, &sale_request, now).await?
    } else {
        match inventory.backend().commit_sale(&sale_request).await {
            Ok(receipt) => receipt,
            Err(e) if e.is_transient() => {
                inventory.set_offline(true);
                warn!(
                    client_reference = %sale_request.client_reference,
                    error = %e,
                    "Sale commit outcome unknown"
                );
                checkout.mark_unresolved(sale_request).await;
                return Err(e.into());
            }
            Err(e) => {
                warn!(
                    client_reference = %sale_request.client_reference,
                    error = %e,
                    "Sale rejected by backend"
                );
                checkout.resolve().await;
                return Err(e.into());
            }
        }
    };
    checkout.resolve().await;

    let sale = reconciler.finalize(&sale_request, &cart, &receipt, now);
    let document = ReceiptDocument::paid(&sale, config.letterhead(), config.currency_format());
    let notice = reconciler.price_notice(&reconciliation.price_changes);

    if !reconciliation.price_changes.is_empty() {
        info!(changed = reconciliation.price_changes.len(), "Prices updated at checkout");
    }

    if request.retain_cart {
        cart.acknowledge_prices();
    } else {
        cart.clear();
    }

    info!(
        receipt_id = %sale.receipt_id,
        total = sale.total.minor(),
        offline = sale.offline,
        "Sale committed"
    );

    Ok(CheckoutOutcome {
        sale,
        price_changes: reconciliation.price_changes,
        notice,
        receipt: document,
    })
}

/// Journals the sale and draws the local cache down in one step. A retry
/// with the same client reference gets the receipt already issued.
async fn commit_offline(
    inventory: &InventoryProvider,
    request: &SaleRequest,
    now: DateTime<Utc>,
) -> ApiResult<SaleReceipt> {
    let entry = inventory
        .journal_offline_sale(request, &offline_receipt_id(now))
        .await?;

    info!(receipt_id = %entry.receipt_id, "Sale journaled for sync");
    Ok(SaleReceipt {
        receipt_id: entry.receipt_id,
    })
}
