//! # Cart State
//!
//! The active cart plus the carts parked beside it.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cashier Action           Command                 Cart State Change     │
//! │  ──────────────           ───────                 ─────────────────     │
//! │  Scan / pick product ───► add_to_cart() ────────► line added or +qty    │
//! │  + / - key ─────────────► adjust_last_item() ───► last touched line ±1  │
//! │  Park customer ─────────► hold_cart() ──────────► cart → held list      │
//! │  Resume ────────────────► resume_held() ────────► held → cart           │
//! │  Pay ───────────────────► checkout() ───────────► cart cleared on sale  │
//! │                                                                         │
//! │  All access goes through one async Mutex per collection. Checkout       │
//! │  holds the cart lock while it waits on the backend, so the cart cannot  │
//! │  change under a sale in flight.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, MutexGuard};

use rxdesk_core::{Cart, HeldTransactions, SaleRequest};

#[derive(Debug, Default)]
pub struct CartState {
    cart: Mutex<Cart>,
    held: Mutex<HeldTransactions>,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with read access to the cart.
    pub async fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let cart = self.cart.lock().await;
        f(&cart)
    }

    /// Runs `f` with write access to the cart.
    ///
    /// ```rust,ignore
    /// cart_state.with_cart_mut(|cart| cart.add_item(&item, 1)).await?;
    /// ```
    pub async fn with_cart_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Cart) -> R,
    {
        let mut cart = self.cart.lock().await;
        f(&mut cart)
    }

    /// Runs `f` with the cart and the held list, locked in that order.
    pub async fn with_held<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Cart, &mut HeldTransactions) -> R,
    {
        let mut cart = self.cart.lock().await;
        let mut held = self.held.lock().await;
        f(&mut cart, &mut held)
    }

    /// Exclusive access for the length of a checkout.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Cart> {
        self.cart.lock().await
    }
}

// =============================================================================
// Checkout State
// =============================================================================

/// Tracks the checkout in flight and the last attempt whose outcome is
/// unknown.
#[derive(Debug, Default)]
pub struct CheckoutState {
    in_flight: AtomicBool,
    unresolved: Mutex<Option<SaleRequest>>,
}

/// Clears the in-flight flag when the checkout ends, however it ends.
#[derive(Debug)]
pub struct CheckoutGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl CheckoutState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the checkout slot, or `None` if a checkout is already running.
    pub fn try_begin(&self) -> Option<CheckoutGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CheckoutGuard {
                flag: &self.in_flight,
            })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The client reference to use for `draft`: the unresolved attempt's
    /// if it was for the same sale, otherwise a fresh one.
    pub async fn reference_for(&self, draft: &SaleRequest) -> String {
        let unresolved = self.unresolved.lock().await;
        match unresolved.as_ref() {
            Some(previous) if same_sale(previous, draft) => previous.client_reference.clone(),
            _ => uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Remembers an attempt that may or may not have reached the backend.
    pub async fn mark_unresolved(&self, request: SaleRequest) {
        *self.unresolved.lock().await = Some(request);
    }

    pub async fn resolve(&self) {
        *self.unresolved.lock().await = None;
    }

    pub async fn unresolved_reference(&self) -> Option<String> {
        self.unresolved
            .lock()
            .await
            .as_ref()
            .map(|r| r.client_reference.clone())
    }
}

/// Same items, prices, customer and payment. The reference and the
/// online/offline route may differ.
fn same_sale(a: &SaleRequest, b: &SaleRequest) -> bool {
    a.branch_id == b.branch_id
        && a.items == b.items
        && a.total == b.total
        && a.customer_id == b.customer_id
        && a.customer_name == b.customer_name
        && a.payment_method == b.payment_method
        && a.prescription_images == b.prescription_images
}
