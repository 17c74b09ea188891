//! End-to-end checkout flows against the in-memory backend and an
//! in-memory SQLite cache.

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use rxdesk_backend::InMemoryBackend;
use rxdesk_core::{CustomerSelection, InventorySnapshotItem, Money, PaymentDetails, PaymentMethod};
use rxdesk_db::{Database, DbConfig};
use rxdesk_till::commands::checkout::{checkout, CheckoutOutcome, CheckoutRequest};
use rxdesk_till::commands::{cart, held, invoice, sync};
use rxdesk_till::error::{ApiResult, ErrorCode};
use rxdesk_till::state::{InventoryProvider, Till, TillConfig};

// =============================================================================
// Fixtures
// =============================================================================

fn item(id: &str, name: &str, stock: i64, price: i64) -> InventorySnapshotItem {
    InventorySnapshotItem {
        product_id: id.to_string(),
        name: name.to_string(),
        branch_stock: stock,
        selling_price: Some(Money::from_minor(price)),
        unit_price: Money::from_minor(price - 100),
        expiry_date: None,
        reorder_level: 0,
        batch_number: None,
        barcode: None,
    }
}

fn yesterday() -> NaiveDate {
    Local::now().date_naive().pred_opt().unwrap()
}

async fn setup(items: Vec<InventorySnapshotItem>) -> (Till, InMemoryBackend) {
    let backend = InMemoryBackend::new();
    backend.set_inventory("b1", items).await;
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let mut config = TillConfig::default();
    config.branch.id = "b1".to_string();
    config.pharmacy.name = "Uzima Pharmacy".to_string();
    config.session.staff_name = Some("Neema".to_string());

    let inventory = InventoryProvider::new("b1", Arc::new(backend.clone()), db);
    (Till::new(config, inventory), backend)
}

async fn pay(till: &Till, payment: PaymentDetails) -> ApiResult<CheckoutOutcome> {
    checkout(
        &till.cart,
        &till.checkout,
        &till.inventory,
        &till.config,
        CheckoutRequest::new(payment),
    )
    .await
}

async fn cart_quantity(till: &Till, product_id: &str) -> Option<i64> {
    till.cart
        .with_cart(|c| c.line(product_id).map(|l| l.quantity))
        .await
}

// =============================================================================
// Online Gates
// =============================================================================

#[tokio::test]
async fn test_stock_gate_names_every_short_line_and_keeps_cart() {
    let (till, backend) = setup(vec![
        item("amox", "Amoxicillin 250mg", 2, 1500),
        item("para", "Paracetamol", 0, 500),
        item("ors", "ORS Sachet", 50, 300),
    ])
    .await;

    cart::add_to_cart(&till.cart, &till.inventory, "amox", 5).await.unwrap();
    cart::add_to_cart(&till.cart, &till.inventory, "para", 1).await.unwrap();
    cart::add_to_cart(&till.cart, &till.inventory, "ors", 2).await.unwrap();

    let err = pay(&till, PaymentDetails::cash()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::InsufficientStock);
    assert!(err.message.contains("Amoxicillin 250mg: only 2 left (you have 5 in cart)"));
    assert!(err.message.contains("Paracetamol: out of stock (you have 1 in cart)"));
    assert!(!err.message.contains("ORS"));

    assert_eq!(cart_quantity(&till, "amox").await, Some(5));
    assert_eq!(cart_quantity(&till, "para").await, Some(1));
    assert_eq!(backend.commit_calls().await, 0);
}

#[tokio::test]
async fn test_product_removed_from_branch_is_no_longer_available() {
    let (till, backend) = setup(vec![item("p1", "Cetirizine", 10, 800)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 1).await.unwrap();

    backend.set_inventory("b1", vec![]).await;
    let err = pay(&till, PaymentDetails::cash()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::InsufficientStock);
    assert!(err.message.contains("Cetirizine: no longer available"));
}

#[tokio::test]
async fn test_price_drift_reprices_and_reports() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 20, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 2).await.unwrap();

    backend.set_selling_price("b1", "p1", Money::from_minor(600)).await;
    let outcome = pay(&till, PaymentDetails::cash()).await.unwrap();

    assert_eq!(outcome.sale.total, Money::from_minor(1200));
    assert_eq!(outcome.price_changes.len(), 1);
    assert_eq!(outcome.price_changes[0].old_price, Money::from_minor(500));
    assert_eq!(outcome.price_changes[0].new_price, Money::from_minor(600));
    assert!(outcome.notice.unwrap().contains("Paracetamol: 500 → 600"));

    let sales = backend.sales().await;
    assert_eq!(sales[0].total, Money::from_minor(1200));
    assert_eq!(sales[0].items[0].unit_price, Money::from_minor(600));
}

#[tokio::test]
async fn test_price_change_disclosed_again_after_rejected_commit() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 20, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 2).await.unwrap();

    backend.set_selling_price("b1", "p1", Money::from_minor(600)).await;
    backend.reject_next_commit("Shift is closed").await;
    let err = pay(&till, PaymentDetails::cash()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::SaleRejected);

    let outcome = pay(&till, PaymentDetails::cash()).await.unwrap();
    assert_eq!(outcome.sale.total, Money::from_minor(1200));
    assert_eq!(outcome.price_changes.len(), 1);
    assert_eq!(outcome.price_changes[0].old_price, Money::from_minor(500));
    assert_eq!(outcome.price_changes[0].new_price, Money::from_minor(600));
    assert!(outcome.notice.unwrap().contains("Paracetamol: 500 → 600"));
}

#[tokio::test]
async fn test_price_change_disclosed_on_offline_retry_after_lost_response() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 20, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 2).await.unwrap();

    backend.set_selling_price("b1", "p1", Money::from_minor(600)).await;
    backend.lose_next_response().await;
    let err = pay(&till, PaymentDetails::cash()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NetworkError);
    let reference = till.checkout.unresolved_reference().await.unwrap();

    backend.set_offline(true).await;
    let outcome = pay(&till, PaymentDetails::cash()).await.unwrap();
    assert!(outcome.sale.offline);
    assert_eq!(outcome.sale.total, Money::from_minor(1200));
    assert_eq!(outcome.price_changes.len(), 1);
    assert!(outcome.notice.unwrap().contains("Paracetamol: 500 → 600"));

    // Journaled under the first attempt's reference, so replay is a no-op.
    let pending = till.inventory.database().offline_sales().pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].client_reference, reference);

    backend.set_offline(false).await;
    let report = sync::sync_offline_sales(&till.inventory).await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(backend.sales().await.len(), 1);
    assert_eq!(backend.stock_of("b1", "p1").await, Some(18));
}

#[tokio::test]
async fn test_retained_cart_is_told_about_a_price_change_once() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 20, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 1).await.unwrap();
    backend.set_selling_price("b1", "p1", Money::from_minor(600)).await;

    let retained = || CheckoutRequest {
        payment: PaymentDetails::cash(),
        retain_cart: true,
    };

    let first = checkout(&till.cart, &till.checkout, &till.inventory, &till.config, retained())
        .await
        .unwrap();
    assert_eq!(first.price_changes.len(), 1);

    let second = checkout(&till.cart, &till.checkout, &till.inventory, &till.config, retained())
        .await
        .unwrap();
    assert!(second.price_changes.is_empty());
    assert!(second.notice.is_none());
    assert_eq!(second.sale.total, Money::from_minor(600));
}

#[tokio::test]
async fn test_successful_sale_clears_cart_and_prints_receipt() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 20, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 3).await.unwrap();

    let payment = PaymentDetails {
        method: PaymentMethod::MobileMoney,
        customer: CustomerSelection::Patient {
            id: "cust-9".to_string(),
            name: "Mama Asha".to_string(),
        },
        prescription_images: vec!["rx/123.jpg".to_string()],
    };
    let outcome = pay(&till, payment).await.unwrap();

    assert_eq!(outcome.sale.receipt_id, "RCPT-0001");
    assert!(!outcome.sale.offline);
    assert_eq!(outcome.sale.staff_name.as_deref(), Some("Neema"));
    assert!(outcome.notice.is_none());
    assert!(outcome.receipt.is_paid());
    assert_eq!(outcome.receipt.letterhead.name, "Uzima Pharmacy");
    assert!(cart::get_cart(&till.cart).await.lines.is_empty());

    let sales = backend.sales().await;
    assert_eq!(sales[0].customer_id.as_deref(), Some("cust-9"));
    assert_eq!(sales[0].prescription_images, vec!["rx/123.jpg".to_string()]);
    assert!(!sales[0].force_offline);
    assert_eq!(backend.stock_of("b1", "p1").await, Some(17));
}

#[tokio::test]
async fn test_retained_cart_survives_sale() {
    let (till, _backend) = setup(vec![item("p1", "Paracetamol", 20, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 1).await.unwrap();

    let request = CheckoutRequest {
        payment: PaymentDetails::cash(),
        retain_cart: true,
    };
    checkout(&till.cart, &till.checkout, &till.inventory, &till.config, request)
        .await
        .unwrap();

    assert_eq!(cart_quantity(&till, "p1").await, Some(1));
}

// =============================================================================
// Expiry Gate
// =============================================================================

#[tokio::test]
async fn test_expired_line_blocks_online_and_offline() {
    let mut expired = item("p1", "Amoxicillin Syrup", 10, 2500);
    expired.expiry_date = Some(yesterday());
    let (till, backend) = setup(vec![expired, item("p2", "Paracetamol", 10, 500)]).await;

    cart::add_to_cart(&till.cart, &till.inventory, "p1", 1).await.unwrap();
    cart::add_to_cart(&till.cart, &till.inventory, "p2", 1).await.unwrap();

    let err = pay(&till, PaymentDetails::cash()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ExpiredItem);
    assert!(err.message.contains("Amoxicillin Syrup"));
    assert!(!err.message.contains("Paracetamol"));

    backend.set_offline(true).await;
    let err = pay(&till, PaymentDetails::cash()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ExpiredItem);

    assert_eq!(backend.commit_calls().await, 0);
    assert_eq!(till.inventory.database().offline_sales().count_pending().await.unwrap(), 0);
    assert_eq!(cart::get_cart(&till.cart).await.lines.len(), 2);
}

// =============================================================================
// Offline Commit and Replay
// =============================================================================

#[tokio::test]
async fn test_offline_sale_journals_and_draws_down_cache() {
    let (till, backend) = setup(vec![
        item("p1", "Paracetamol", 10, 500),
        item("p2", "ORS Sachet", 1, 300),
    ])
    .await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 3).await.unwrap();
    // More than the cache holds: offline sales skip the stock gate.
    cart::add_to_cart(&till.cart, &till.inventory, "p2", 2).await.unwrap();

    backend.set_offline(true).await;
    let outcome = pay(&till, PaymentDetails::cash()).await.unwrap();

    assert!(outcome.sale.offline);
    assert!(outcome.sale.receipt_id.starts_with("OFF-"));
    assert!(outcome.receipt.offline);
    assert_eq!(outcome.sale.total, Money::from_minor(2100));
    assert!(till.inventory.is_offline());

    let snapshot = till.inventory.current().await.unwrap();
    assert_eq!(snapshot.get("p1").map(|i| i.branch_stock), Some(7));
    assert_eq!(snapshot.get("p2").map(|i| i.branch_stock), Some(0));

    let cached = till.inventory.database().inventory().load_branch("b1").await.unwrap();
    let p1 = cached.iter().find(|i| i.product_id == "p1").unwrap();
    assert_eq!(p1.branch_stock, 7);

    let pending = till.inventory.database().offline_sales().pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].receipt_id, outcome.sale.receipt_id);
    assert!(pending[0].request.force_offline);
    assert_eq!(backend.commit_calls().await, 0);
}

#[tokio::test]
async fn test_replay_syncs_oldest_first_and_refreshes() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 10, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 1).await.unwrap();

    backend.set_offline(true).await;
    let first = pay(&till, PaymentDetails::cash()).await.unwrap();
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 2).await.unwrap();
    pay(&till, PaymentDetails::cash()).await.unwrap();

    // Still unreachable: the pass stops at the first entry.
    let report = sync::sync_offline_sales(&till.inventory).await.unwrap();
    assert!(report.interrupted);
    assert_eq!(report.synced, 0);
    assert_eq!(report.remaining, 2);
    let pending = till.inventory.database().offline_sales().pending(10).await.unwrap();
    assert_eq!(pending[0].attempts, 1);
    assert_eq!(pending[1].attempts, 0);

    backend.set_offline(false).await;
    let report = sync::sync_offline_sales(&till.inventory).await.unwrap();
    assert_eq!(report.synced, 2);
    assert_eq!(report.remaining, 0);
    assert!(report.refreshed);
    assert!(!till.inventory.is_offline());

    let sales = backend.sales().await;
    assert_eq!(sales.len(), 2);
    assert_eq!(sales[0].client_reference, pending[0].client_reference);
    assert_eq!(sales[0].total, first.sale.total);
    assert_eq!(backend.stock_of("b1", "p1").await, Some(7));

    // The refreshed snapshot reflects the server's count.
    let snapshot = till.inventory.current().await.unwrap();
    assert!(!snapshot.offline);
    assert_eq!(snapshot.get("p1").map(|i| i.branch_stock), Some(7));
}

#[tokio::test]
async fn test_rejected_replay_is_kept_for_review() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 10, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 1).await.unwrap();

    backend.set_offline(true).await;
    pay(&till, PaymentDetails::cash()).await.unwrap();
    let entry = till.inventory.database().offline_sales().pending(1).await.unwrap().remove(0);

    backend.set_offline(false).await;
    backend.reject_reference(&entry.client_reference, "Batch recalled by supplier").await;

    let report = sync::sync_offline_sales(&till.inventory).await.unwrap();
    assert_eq!(report.synced, 0);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.remaining, 0);

    let rejected = sync::list_rejected_sales(&till.inventory, 10).await.unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].receipt_id, entry.receipt_id);
    assert!(rejected[0].last_error.as_deref().unwrap().contains("Batch recalled"));

    // Never replayed again.
    let report = sync::sync_offline_sales(&till.inventory).await.unwrap();
    assert_eq!(report.rejected, 0);
    let status = sync::sync_status(&till.inventory).await.unwrap();
    assert_eq!(status.pending, 0);
    assert_eq!(status.rejected, 1);
}

// =============================================================================
// Duplicate Submission
// =============================================================================

#[tokio::test]
async fn test_second_checkout_while_one_is_in_flight() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 10, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 1).await.unwrap();

    let in_flight = till.checkout.try_begin().unwrap();
    let err = pay(&till, PaymentDetails::cash()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::CheckoutInProgress);
    assert!(err.is_retryable());
    assert_eq!(backend.commit_calls().await, 0);

    drop(in_flight);
    pay(&till, PaymentDetails::cash()).await.unwrap();
    assert_eq!(backend.sales().await.len(), 1);
}

#[tokio::test]
async fn test_retry_after_lost_response_does_not_double_sell() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 10, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 3).await.unwrap();

    backend.lose_next_response().await;
    let err = pay(&till, PaymentDetails::cash()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NetworkError);
    assert!(err.is_retryable());
    assert_eq!(cart_quantity(&till, "p1").await, Some(3));
    let reference = till.checkout.unresolved_reference().await.unwrap();

    let outcome = pay(&till, PaymentDetails::cash()).await.unwrap();
    assert_eq!(outcome.sale.receipt_id, "RCPT-0001");

    let sales = backend.sales().await;
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].client_reference, reference);
    assert_eq!(backend.stock_of("b1", "p1").await, Some(7));
    assert!(till.checkout.unresolved_reference().await.is_none());
}

#[tokio::test]
async fn test_changed_cart_after_lost_response_gets_new_reference() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 10, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 1).await.unwrap();

    backend.lose_next_response().await;
    pay(&till, PaymentDetails::cash()).await.unwrap_err();
    let first = till.checkout.unresolved_reference().await.unwrap();

    cart::increment_item(&till.cart, "p1").await.unwrap();
    pay(&till, PaymentDetails::cash()).await.unwrap();

    let sales = backend.sales().await;
    assert_eq!(sales.len(), 2);
    assert_ne!(sales[1].client_reference, first);
}

#[tokio::test]
async fn test_backend_rejection_keeps_cart() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 10, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 4).await.unwrap();

    backend.reject_next_commit("Shift is closed").await;
    let err = pay(&till, PaymentDetails::cash()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::SaleRejected);
    assert_eq!(err.message, "Shift is closed");
    assert!(!err.is_retryable());
    assert_eq!(cart_quantity(&till, "p1").await, Some(4));
    assert!(till.checkout.unresolved_reference().await.is_none());
    assert!(!till.inventory.is_offline());
    assert_eq!(backend.stock_of("b1", "p1").await, Some(10));
}

// =============================================================================
// Held Carts
// =============================================================================

#[tokio::test]
async fn test_held_cart_is_gated_again_on_resume() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 10, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 4).await.unwrap();

    let parked = held::hold_cart(&till.cart, "Mzee Juma").await.unwrap();
    assert!(cart::get_cart(&till.cart).await.lines.is_empty());

    // Stock sold elsewhere while the cart was parked.
    backend.set_inventory("b1", vec![item("p1", "Paracetamol", 3, 500)]).await;

    held::resume_held(&till.cart, &parked.id).await.unwrap();
    let err = pay(&till, PaymentDetails::cash()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InsufficientStock);
    assert!(err.message.contains("only 3 left (you have 4 in cart)"));

    cart::set_item_quantity(&till.cart, "p1", 3).await.unwrap();
    let outcome = pay(&till, PaymentDetails::cash()).await.unwrap();
    assert_eq!(outcome.sale.total, Money::from_minor(1500));
}

// =============================================================================
// Invoices
// =============================================================================

#[tokio::test]
async fn test_invoice_online_leaves_cart_intact() {
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 10, 500)]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 2).await.unwrap();

    let document = invoice::generate_invoice(
        &till.cart,
        &till.inventory,
        &till.config,
        Some("Mama Asha".to_string()),
    )
    .await
    .unwrap();

    assert!(!document.is_paid());
    assert_eq!(document.receipt_number, "INV-0001");
    assert_eq!(document.total, Money::from_minor(1000));
    assert_eq!(document.customer_name.as_deref(), Some("Mama Asha"));
    assert!(document.render_text(42).contains("INVOICE (UNPAID)"));

    assert_eq!(cart_quantity(&till, "p1").await, Some(2));
    assert_eq!(backend.pending_transactions().await.len(), 1);
    assert_eq!(backend.commit_calls().await, 0);
}

#[tokio::test]
async fn test_invoice_unavailable_offline_and_blocked_when_expired() {
    let mut expired = item("p2", "Eye Drops", 5, 1200);
    expired.expiry_date = Some(yesterday());
    let (till, backend) = setup(vec![item("p1", "Paracetamol", 10, 500), expired]).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p1", 1).await.unwrap();

    backend.set_offline(true).await;
    let err = invoice::generate_invoice(&till.cart, &till.inventory, &till.config, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OfflineUnavailable);
    assert!(till.inventory.is_offline());

    backend.set_offline(false).await;
    cart::add_to_cart(&till.cart, &till.inventory, "p2", 1).await.unwrap();
    let err = invoice::generate_invoice(&till.cart, &till.inventory, &till.config, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ExpiredItem);
    assert!(backend.pending_transactions().await.is_empty());
}
