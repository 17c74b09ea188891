//! # Checkout Context
//!
//! Who is selling, where, and in which currency.
//!
//! The reconciliation engine receives this once, at construction, instead
//! of reading a "current user" or "current branch" from global state. Tests
//! build one with the builder methods below.

use serde::{Deserialize, Serialize};

use crate::money::CurrencyFormat;

/// Session data threaded into the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutContext {
    /// Branch whose stock the sale draws down.
    pub branch_id: String,

    /// Display name of the cashier, printed on receipts.
    pub staff_name: Option<String>,

    /// Open till shift, if shifts are tracked.
    pub shift_id: Option<String>,

    pub currency: CurrencyFormat,
}

impl CheckoutContext {
    pub fn new(branch_id: impl Into<String>) -> Self {
        CheckoutContext {
            branch_id: branch_id.into(),
            staff_name: None,
            shift_id: None,
            currency: CurrencyFormat::default(),
        }
    }

    pub fn with_staff(mut self, staff_name: impl Into<String>) -> Self {
        self.staff_name = Some(staff_name.into());
        self
    }

    pub fn with_shift(mut self, shift_id: impl Into<String>) -> Self {
        self.shift_id = Some(shift_id.into());
        self
    }

    pub fn with_currency(mut self, currency: CurrencyFormat) -> Self {
        self.currency = currency;
        self
    }
}
