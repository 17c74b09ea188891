//! # rxdesk-core: Checkout Logic for the RxDesk Pharmacy Till
//!
//! Everything the till decides about a sale lives here, as plain
//! functions over plain data. No database, no HTTP, no clock reads.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        RxDesk Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 rxdesk-till (commands + shell)                  │   │
//! │  │    add_to_cart, hold_cart, checkout, generate_invoice, sync    │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼───────────────────────┐  ┌───▼──────────────────┐    │
//! │  │     ★ rxdesk-core (THIS CRATE) ★     │  │  rxdesk-backend      │    │
//! │  │                                      │  │  hosted RPC client   │    │
//! │  │  cart ─► reconcile ─► receipt        │  └──────────────────────┘    │
//! │  │  held     money   validation         │  ┌──────────────────────┐    │
//! │  │                                      │  │  rxdesk-db           │    │
//! │  │  NO I/O • NO DATABASE • NO NETWORK   │  │  offline cache       │    │
//! │  └──────────────────────────────────────┘  └──────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`cart`] - Cart Store (line math, totals)
//! - [`held`] - Held-Transaction Store
//! - [`reconcile`] - Sale Reconciliation Engine (expiry gate, stock gate, price drift)
//! - [`receipt`] - Paid receipts and unpaid invoice slips
//! - [`session`] - Explicit checkout context (branch, staff, shift, currency)
//! - [`money`] - Integer money and currency formatting
//! - [`types`] - Domain types
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use rxdesk_core::money::CurrencyFormat;
//! use rxdesk_core::Money;
//!
//! let price = Money::parse_decimal("1500", 0).unwrap();
//! assert_eq!(CurrencyFormat::default().format(price), "TZS 1,500");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod held;
pub mod money;
pub mod receipt;
pub mod reconcile;
pub mod session;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartTotals};
pub use error::{CheckoutBlocked, CoreError, CoreResult, StockIssue, StockShortfall, ValidationError};
pub use held::HeldTransactions;
pub use money::{CurrencyFormat, Money};
pub use receipt::{offline_receipt_id, BranchLetterhead, Letterhead, ReceiptDocument};
pub use reconcile::{PriceChange, Reconciliation, SaleReconciler};
pub use session::CheckoutContext;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches a mistyped 1000 for 10 before it reaches the stock gate.
pub const MAX_ITEM_QUANTITY: i64 = 999;
