//! # Sale Reconciliation Engine
//!
//! Decides whether a cart may be sold against a fresh inventory snapshot,
//! corrects stale prices, and builds the commit request.
//!
//! ## Checkout State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One Checkout Attempt                                │
//! │                                                                         │
//! │  ┌─────────────┐  any line expired   ┌──────────────────────────────┐  │
//! │  │ ExpiryGate  │────────────────────►│ Blocked(Expired[..])         │  │
//! │  │ (always)    │                     └──────────────────────────────┘  │
//! │  └──────┬──────┘                                                       │
//! │         │ offline? ──────────────────────────────────┐                 │
//! │         ▼                                            │                 │
//! │  ┌─────────────┐  missing / short    ┌─────────────────────────────┐  │
//! │  │ StockGate   │────────────────────►│ Blocked(Stock[..])          │  │
//! │  │ (online)    │                     └─────────────────────────────┘  │
//! │  └──────┬──────┘                                     │                 │
//! │         ▼                                            │                 │
//! │  ┌─────────────┐  reprice lines,                     │                 │
//! │  │ PriceDrift  │  collect (name, old, new)           │                 │
//! │  │ (online)    │                                     │                 │
//! │  └──────┬──────┘                                     │                 │
//! │         ▼                                            ▼                 │
//! │  ┌───────────────────────────────────────────────────────────────┐    │
//! │  │ Commit: total = Σ qty × fresh price, SaleRequest built        │    │
//! │  └───────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Every gate reports every affected line at once.
//! - A blocked attempt leaves the cart exactly as it was. Prices are only
//!   rewritten after both gates pass.
//! - Quantities are never clamped to available stock.
//! - Offline, the snapshot is the local cache: stock and prices are
//!   trusted, expiry is still enforced.
//! - Drift is measured against the price the cashier was last shown, not
//!   the line's working price. Only a committed sale acknowledges it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::Cart;
use crate::error::{CheckoutBlocked, CoreError, CoreResult, ExpiredLine, StockIssue, StockShortfall};
use crate::money::Money;
use crate::session::CheckoutContext;
use crate::types::{
    FinalizedSale, InventorySnapshot, PaymentDetails, PendingTransactionRequest, SaleLine,
    SaleReceipt, SaleRequest, SaleRequestItem,
};
use crate::validation::{validate_customer_name, validate_price};

// =============================================================================
// Results
// =============================================================================

/// A line whose price moved between add-to-cart and checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PriceChange {
    pub product_id: String,
    pub name: String,
    pub old_price: Money,
    pub new_price: Money,
}

/// Outcome of the gates for a cart that may proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Lines charged at a price other than the one last shown.
    pub price_changes: Vec<PriceChange>,

    /// Cart total after repricing.
    pub total: Money,

    /// Stock and price checks were skipped.
    pub offline: bool,
}

// =============================================================================
// Engine
// =============================================================================

/// Runs the checkout gates for one session.
#[derive(Debug, Clone)]
pub struct SaleReconciler {
    context: CheckoutContext,
}

impl SaleReconciler {
    pub fn new(context: CheckoutContext) -> Self {
        SaleReconciler { context }
    }

    pub fn context(&self) -> &CheckoutContext {
        &self.context
    }

    /// Fails with every line whose expiry date is strictly before `today`.
    pub fn check_expiry(&self, cart: &Cart, today: NaiveDate) -> Result<(), CheckoutBlocked> {
        let expired: Vec<ExpiredLine> = cart
            .lines()
            .iter()
            .filter_map(|line| {
                let expiry_date = line.product.expiry_date?;
                (expiry_date < today).then(|| ExpiredLine {
                    product_id: line.product_id.clone(),
                    name: line.product.name.clone(),
                    expiry_date,
                })
            })
            .collect();

        if expired.is_empty() {
            Ok(())
        } else {
            Err(CheckoutBlocked::Expired(expired))
        }
    }

    /// Fails with every line the snapshot cannot cover.
    pub fn check_stock(&self, cart: &Cart, snapshot: &InventorySnapshot) -> Result<(), CheckoutBlocked> {
        let issues: Vec<StockIssue> = cart
            .lines()
            .iter()
            .filter_map(|line| {
                let requested = line.quantity;
                let shortfall = match snapshot.get(&line.product_id) {
                    None => StockShortfall::NoLongerAvailable,
                    Some(item) if item.branch_stock <= 0 => StockShortfall::OutOfStock { requested },
                    Some(item) if item.branch_stock < requested => StockShortfall::Partial {
                        available: item.branch_stock,
                        requested,
                    },
                    Some(_) => return None,
                };
                Some(StockIssue {
                    product_id: line.product_id.clone(),
                    name: line.product.name.clone(),
                    shortfall,
                })
            })
            .collect();

        if issues.is_empty() {
            Ok(())
        } else {
            Err(CheckoutBlocked::Stock(issues))
        }
    }

    /// Lines whose quoted price differs from the snapshot. Does not modify
    /// the cart.
    pub fn detect_price_drift(&self, cart: &Cart, snapshot: &InventorySnapshot) -> Vec<PriceChange> {
        cart.lines()
            .iter()
            .filter_map(|line| {
                let item = snapshot.get(&line.product_id)?;
                let new_price = item.effective_price();
                (line.quoted_price != new_price).then(|| PriceChange {
                    product_id: line.product_id.clone(),
                    name: line.product.name.clone(),
                    old_price: line.quoted_price,
                    new_price,
                })
            })
            .collect()
    }

    /// Lines already charged at a price the cashier has not been shown,
    /// e.g. repriced by an earlier attempt that failed to commit.
    pub fn undisclosed_changes(&self, cart: &Cart) -> Vec<PriceChange> {
        cart.lines()
            .iter()
            .filter(|line| line.price_changed())
            .map(|line| PriceChange {
                product_id: line.product_id.clone(),
                name: line.product.name.clone(),
                old_price: line.quoted_price,
                new_price: line.product.effective_price(),
            })
            .collect()
    }

    /// Runs the gates in order and, when they pass, reprices drifted lines.
    ///
    /// Price changes are reported against each line's quoted price, so a
    /// change applied by an attempt that never committed is reported again.
    /// On `Err` the cart has not been touched.
    pub fn reconcile(
        &self,
        cart: &mut Cart,
        snapshot: &InventorySnapshot,
        today: NaiveDate,
    ) -> Result<Reconciliation, CheckoutBlocked> {
        self.check_expiry(cart, today)?;

        if snapshot.offline {
            return Ok(Reconciliation {
                price_changes: self.undisclosed_changes(cart),
                total: cart.total(),
                offline: true,
            });
        }

        self.check_stock(cart, snapshot)?;

        cart.reprice(snapshot);
        let price_changes = self.detect_price_drift(cart, snapshot);

        Ok(Reconciliation {
            price_changes,
            total: cart.total(),
            offline: false,
        })
    }

    /// One notice summarising every repriced line, or `None` if nothing moved.
    ///
    /// ```text
    /// Prices updated:
    /// Paracetamol: 500 → 600
    /// ```
    pub fn price_notice(&self, changes: &[PriceChange]) -> Option<String> {
        if changes.is_empty() {
            return None;
        }

        let currency = &self.context.currency;
        let mut notice = String::from("Prices updated:");
        for change in changes {
            notice.push_str(&format!(
                "\n{}: {} → {}",
                change.name,
                currency.format_amount(change.old_price),
                currency.format_amount(change.new_price)
            ));
        }
        Some(notice)
    }

    /// Builds the commit request from the (already reconciled) cart.
    pub fn build_sale_request(
        &self,
        cart: &Cart,
        payment: &PaymentDetails,
        client_reference: &str,
        offline: bool,
    ) -> CoreResult<SaleRequest> {
        let items = self.request_items(cart)?;
        let customer_name = payment.customer.customer_name().map(str::trim);
        if let Some(name) = customer_name {
            validate_customer_name(name)?;
        }

        Ok(SaleRequest {
            client_reference: client_reference.to_string(),
            branch_id: self.context.branch_id.clone(),
            items,
            total: cart.total(),
            customer_name: customer_name.map(str::to_string),
            customer_id: payment.customer.customer_id().map(str::to_string),
            shift_id: self.context.shift_id.clone(),
            staff_name: self.context.staff_name.clone(),
            payment_method: payment.method,
            prescription_images: payment.prescription_images.clone(),
            force_offline: offline,
        })
    }

    /// Builds the request for an unpaid (credit) invoice.
    pub fn build_pending_request(&self, cart: &Cart) -> CoreResult<PendingTransactionRequest> {
        Ok(PendingTransactionRequest {
            branch_id: self.context.branch_id.clone(),
            items: self.request_items(cart)?,
            total: cart.total(),
        })
    }

    /// Freezes an accepted request into the sale the receipt is printed from.
    pub fn finalize(
        &self,
        request: &SaleRequest,
        cart: &Cart,
        receipt: &SaleReceipt,
        timestamp: DateTime<Utc>,
    ) -> FinalizedSale {
        let items: Vec<SaleLine> = cart.lines().iter().map(|line| line.to_sale_line()).collect();
        let total = items.iter().map(|l| l.line_total).sum();

        FinalizedSale {
            receipt_id: receipt.receipt_id.clone(),
            items,
            total,
            payment_method: request.payment_method,
            customer_id: request.customer_id.clone(),
            customer_name: request.customer_name.clone(),
            staff_name: request.staff_name.clone(),
            timestamp,
            offline: request.force_offline,
        }
    }

    fn request_items(&self, cart: &Cart) -> CoreResult<Vec<SaleRequestItem>> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart);
        }

        cart.lines()
            .iter()
            .map(|line| -> CoreResult<SaleRequestItem> {
                let unit_price = line.product.effective_price();
                validate_price("unit price", unit_price)?;
                Ok(SaleRequestItem {
                    product_id: line.product_id.clone(),
                    qty: line.quantity,
                    unit_price,
                })
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CustomerSelection, InventorySnapshotItem, PaymentMethod};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn item(id: &str, name: &str, stock: i64, selling: i64) -> InventorySnapshotItem {
        InventorySnapshotItem {
            product_id: id.to_string(),
            name: name.to_string(),
            branch_stock: stock,
            selling_price: Some(Money::from_minor(selling)),
            unit_price: Money::from_minor(selling - 100),
            expiry_date: None,
            reorder_level: 0,
            batch_number: None,
            barcode: None,
        }
    }

    fn snapshot(items: Vec<InventorySnapshotItem>, offline: bool) -> InventorySnapshot {
        InventorySnapshot::new("branch-1", items, offline, Utc::now())
    }

    fn engine() -> SaleReconciler {
        SaleReconciler::new(CheckoutContext::new("branch-1").with_staff("Neema"))
    }

    #[test]
    fn test_price_drift_reprices_and_recomputes_total() {
        let mut cart = Cart::new();
        cart.add_item(&item("para", "Paracetamol", 10, 500), 2).unwrap();

        let fresh = snapshot(vec![item("para", "Paracetamol", 10, 600)], false);
        let engine = engine();
        let outcome = engine.reconcile(&mut cart, &fresh, today()).unwrap();

        assert_eq!(outcome.total, Money::from_minor(1200));
        assert_eq!(cart.total(), Money::from_minor(1200));
        assert_eq!(outcome.price_changes.len(), 1);

        let notice = engine.price_notice(&outcome.price_changes).unwrap();
        assert!(notice.contains("Paracetamol: 500 → 600"));
    }

    #[test]
    fn test_partial_stock_blocks_and_leaves_cart_unchanged() {
        let mut cart = Cart::new();
        cart.add_item(&item("amox", "Amoxicillin", 10, 800), 5).unwrap();
        let before = cart.clone();

        let fresh = snapshot(vec![item("amox", "Amoxicillin", 2, 900)], false);
        let err = engine().reconcile(&mut cart, &fresh, today()).unwrap_err();

        assert!(err.to_string().contains("only 2 left (you have 5 in cart)"));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_stock_gate_names_every_item() {
        let mut cart = Cart::new();
        cart.add_item(&item("amox", "Amoxicillin", 10, 800), 5).unwrap();
        cart.add_item(&item("ibu", "Ibuprofen", 10, 300), 1).unwrap();
        cart.add_item(&item("cet", "Cetirizine", 10, 200), 1).unwrap();
        cart.add_item(&item("ors", "ORS Sachet", 10, 100), 1).unwrap();

        let fresh = snapshot(
            vec![
                item("amox", "Amoxicillin", 2, 800),
                item("ibu", "Ibuprofen", 0, 300),
                item("ors", "ORS Sachet", 40, 100),
            ],
            false,
        );

        match engine().reconcile(&mut cart, &fresh, today()) {
            Err(CheckoutBlocked::Stock(issues)) => {
                assert_eq!(issues.len(), 3);
                let message = CheckoutBlocked::Stock(issues).to_string();
                assert!(message.contains("Amoxicillin: only 2 left (you have 5 in cart)"));
                assert!(message.contains("Ibuprofen: out of stock (you have 1 in cart)"));
                assert!(message.contains("Cetirizine: no longer available"));
                assert!(!message.contains("ORS"));
            }
            other => panic!("expected stock block, got {:?}", other),
        }
    }

    #[test]
    fn test_offline_skips_stock_and_price_checks() {
        let mut cart = Cart::new();
        cart.add_item(&item("amox", "Amoxicillin", 10, 800), 5).unwrap();

        let cached = snapshot(vec![item("amox", "Amoxicillin", 2, 950)], true);
        let outcome = engine().reconcile(&mut cart, &cached, today()).unwrap();

        assert!(outcome.offline);
        assert!(outcome.price_changes.is_empty());
        assert_eq!(outcome.total, Money::from_minor(4000));
    }

    #[test]
    fn test_expired_line_blocks_online_and_offline() {
        let mut expired = item("syrup", "Cough Syrup", 10, 300);
        expired.expiry_date = today().pred_opt();
        let mut fine = item("para", "Paracetamol", 10, 500);
        fine.expiry_date = Some(today());

        let mut cart = Cart::new();
        cart.add_item(&expired, 1).unwrap();
        cart.add_item(&fine, 1).unwrap();
        let before = cart.clone();

        for offline in [false, true] {
            let fresh = snapshot(vec![expired.clone(), fine.clone()], offline);
            match engine().reconcile(&mut cart, &fresh, today()) {
                Err(CheckoutBlocked::Expired(lines)) => {
                    assert_eq!(lines.len(), 1);
                    assert_eq!(lines[0].name, "Cough Syrup");
                }
                other => panic!("expected expiry block, got {:?}", other),
            }
            assert_eq!(cart, before);
        }
    }

    #[test]
    fn test_expiry_gate_runs_before_stock_gate() {
        let mut expired = item("syrup", "Cough Syrup", 10, 300);
        expired.expiry_date = today().pred_opt();
        let mut cart = Cart::new();
        cart.add_item(&expired, 3).unwrap();

        let fresh = snapshot(vec![], false);
        assert!(matches!(
            engine().reconcile(&mut cart, &fresh, today()),
            Err(CheckoutBlocked::Expired(_))
        ));
    }

    #[test]
    fn test_build_sale_request_resolves_customer_and_session() {
        let ctx = CheckoutContext::new("branch-1")
            .with_staff("Neema")
            .with_shift("shift-3");
        let engine = SaleReconciler::new(ctx);

        let mut cart = Cart::new();
        cart.add_item(&item("para", "Paracetamol", 10, 500), 2).unwrap();

        let payment = PaymentDetails {
            method: PaymentMethod::MobileMoney,
            customer: CustomerSelection::Patient {
                id: "cust-9".to_string(),
                name: "Asha Mrema".to_string(),
            },
            prescription_images: vec!["rx/abc.jpg".to_string()],
        };

        let request = engine.build_sale_request(&cart, &payment, "ref-1", false).unwrap();
        assert_eq!(request.client_reference, "ref-1");
        assert_eq!(request.branch_id, "branch-1");
        assert_eq!(request.customer_id.as_deref(), Some("cust-9"));
        assert_eq!(request.customer_name.as_deref(), Some("Asha Mrema"));
        assert_eq!(request.shift_id.as_deref(), Some("shift-3"));
        assert_eq!(request.staff_name.as_deref(), Some("Neema"));
        assert_eq!(request.items[0].unit_price, Money::from_minor(500));
        assert_eq!(request.total, Money::from_minor(1000));
        assert!(!request.force_offline);
        assert_eq!(request.prescription_images.len(), 1);
    }

    #[test]
    fn test_empty_cart_cannot_be_requested() {
        let engine = engine();
        assert!(matches!(
            engine.build_sale_request(&Cart::new(), &PaymentDetails::cash(), "r", false),
            Err(CoreError::EmptyCart)
        ));
        assert!(matches!(
            engine.build_pending_request(&Cart::new()),
            Err(CoreError::EmptyCart)
        ));
    }

    #[test]
    fn test_finalize_uses_commit_time_prices() {
        let mut cart = Cart::new();
        cart.add_item(&item("para", "Paracetamol", 10, 500), 2).unwrap();
        let fresh = snapshot(vec![item("para", "Paracetamol", 10, 600)], false);
        let engine = engine();
        engine.reconcile(&mut cart, &fresh, today()).unwrap();

        let request = engine
            .build_sale_request(&cart, &PaymentDetails::cash(), "ref-2", false)
            .unwrap();
        let receipt = SaleReceipt {
            receipt_id: "R-100".to_string(),
        };
        let sale = engine.finalize(&request, &cart, &receipt, Utc::now());

        assert_eq!(sale.receipt_id, "R-100");
        assert_eq!(sale.items[0].unit_price, Money::from_minor(600));
        assert_eq!(sale.items[0].line_total, Money::from_minor(1200));
        assert_eq!(sale.total, Money::from_minor(1200));
        assert_eq!(sale.staff_name.as_deref(), Some("Neema"));
    }

    #[test]
    fn test_drift_reported_until_a_sale_acknowledges_it() {
        let mut cart = Cart::new();
        cart.add_item(&item("para", "Paracetamol", 10, 500), 2).unwrap();
        let engine = engine();

        let fresh = snapshot(vec![item("para", "Paracetamol", 10, 600)], false);
        engine.reconcile(&mut cart, &fresh, today()).unwrap();

        // The commit failed; the cart already carries the new price.
        let again = engine.reconcile(&mut cart, &fresh, today()).unwrap();
        assert_eq!(again.price_changes.len(), 1);
        assert_eq!(again.price_changes[0].old_price, Money::from_minor(500));
        assert_eq!(again.price_changes[0].new_price, Money::from_minor(600));

        let cached = snapshot(vec![item("para", "Paracetamol", 10, 600)], true);
        let offline = engine.reconcile(&mut cart, &cached, today()).unwrap();
        assert_eq!(offline.price_changes, again.price_changes);
        assert_eq!(offline.total, Money::from_minor(1200));

        cart.acknowledge_prices();
        let settled = engine.reconcile(&mut cart, &fresh, today()).unwrap();
        assert!(settled.price_changes.is_empty());
        assert_eq!(settled.total, Money::from_minor(1200));
    }

    #[test]
    fn test_price_moving_back_is_not_a_change() {
        let mut cart = Cart::new();
        cart.add_item(&item("para", "Paracetamol", 10, 500), 1).unwrap();
        let engine = engine();

        let raised = snapshot(vec![item("para", "Paracetamol", 10, 600)], false);
        engine.reconcile(&mut cart, &raised, today()).unwrap();

        let restored = snapshot(vec![item("para", "Paracetamol", 10, 500)], false);
        let outcome = engine.reconcile(&mut cart, &restored, today()).unwrap();
        assert!(outcome.price_changes.is_empty());
        assert_eq!(outcome.total, Money::from_minor(500));
    }

    #[test]
    fn test_no_notice_without_changes() {
        assert_eq!(engine().price_notice(&[]), None);
    }
}
