//! # Receipt / Invoice Emitter
//!
//! Turns a committed sale (paid receipt) or a still-open cart plus a
//! backend pending-transaction handle (unpaid invoice) into a printable
//! document.
//!
//! ## Document Variants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FinalizedSale ─────────────────────► ReceiptDocument::paid()           │
//! │                                        status = Paid, receipt id       │
//! │                                                                         │
//! │  Cart + PendingTransaction ─────────► ReceiptDocument::unpaid_invoice() │
//! │                                        status = Unpaid, short code,    │
//! │                                        scannable barcode payload       │
//! │                                                                         │
//! │  Letterhead::resolve(pharmacy, branch) ─► header block                  │
//! │  (branch fields win when present)                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Documents copy what they need. The sale they are built from is never
//! modified.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::Cart;
use crate::error::{CoreError, CoreResult};
use crate::money::{CurrencyFormat, Money};
use crate::types::{FinalizedSale, PaymentMethod, PaymentStatus, PendingTransaction, SaleLine};

/// Narrowest slip `render_text` will lay out.
pub const MIN_RECEIPT_WIDTH: usize = 24;

// =============================================================================
// Letterhead
// =============================================================================

/// Pharmacy-level header printed on every document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Letterhead {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Tax registration number.
    pub tax_id: Option<String>,
    pub footer: Option<String>,
}

/// Branch-level overrides. Any field set here replaces the pharmacy's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BranchLetterhead {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub tax_id: Option<String>,
    pub footer: Option<String>,
}

impl Letterhead {
    /// Applies branch overrides on top of the pharmacy defaults.
    pub fn resolve(pharmacy: &Letterhead, branch: Option<&BranchLetterhead>) -> Letterhead {
        let Some(branch) = branch else {
            return pharmacy.clone();
        };

        fn pick(over: &Option<String>, base: &Option<String>) -> Option<String> {
            over.clone()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| base.clone())
        }

        Letterhead {
            name: branch
                .name
                .clone()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| pharmacy.name.clone()),
            address: pick(&branch.address, &pharmacy.address),
            phone: pick(&branch.phone, &pharmacy.phone),
            email: pick(&branch.email, &pharmacy.email),
            tax_id: pick(&branch.tax_id, &pharmacy.tax_id),
            footer: pick(&branch.footer, &pharmacy.footer),
        }
    }
}

// =============================================================================
// Receipt Document
// =============================================================================

/// A printable receipt or invoice slip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDocument {
    pub letterhead: Letterhead,
    pub status: PaymentStatus,
    /// Receipt id for paid sales, short code for unpaid invoices.
    pub receipt_number: String,
    pub issued_at: DateTime<Utc>,
    pub lines: Vec<SaleLine>,
    pub total: Money,
    pub currency: CurrencyFormat,
    pub payment_method: Option<PaymentMethod>,
    pub customer_name: Option<String>,
    pub staff_name: Option<String>,
    /// Payload a scanner reads back to find the sale or invoice.
    pub barcode: String,
    /// Sold against the local cache; the backend has not confirmed it yet.
    pub offline: bool,
}

impl ReceiptDocument {
    /// Paid receipt for a committed sale.
    pub fn paid(sale: &FinalizedSale, letterhead: Letterhead, currency: CurrencyFormat) -> Self {
        ReceiptDocument {
            letterhead,
            status: PaymentStatus::Paid,
            receipt_number: sale.receipt_id.clone(),
            issued_at: sale.timestamp,
            lines: sale.items.clone(),
            total: sale.total,
            currency,
            payment_method: Some(sale.payment_method),
            customer_name: sale.customer_name.clone(),
            staff_name: sale.staff_name.clone(),
            barcode: sale.receipt_id.clone(),
            offline: sale.offline,
        }
    }

    /// Unpaid invoice slip for a credit sale that will be settled later.
    pub fn unpaid_invoice(
        cart: &Cart,
        pending: &PendingTransaction,
        letterhead: Letterhead,
        currency: CurrencyFormat,
        customer_name: Option<String>,
        issued_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart);
        }

        Ok(ReceiptDocument {
            letterhead,
            status: PaymentStatus::Unpaid,
            receipt_number: pending.short_code.clone(),
            issued_at,
            lines: cart.lines().iter().map(|line| line.to_sale_line()).collect(),
            total: cart.total(),
            currency,
            payment_method: None,
            customer_name,
            staff_name: None,
            barcode: pending.barcode.clone(),
            offline: false,
        })
    }

    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }

    /// Lays the document out as fixed-width text for a thermal printer or
    /// preview pane.
    pub fn render_text(&self, width: usize) -> String {
        let width = width.max(MIN_RECEIPT_WIDTH);
        let rule = "-".repeat(width);
        let mut out: Vec<String> = Vec::new();

        out.push(center(&self.letterhead.name, width));
        if let Some(address) = &self.letterhead.address {
            out.push(center(address, width));
        }
        if let Some(phone) = &self.letterhead.phone {
            out.push(center(&format!("Tel: {}", phone), width));
        }
        if let Some(email) = &self.letterhead.email {
            out.push(center(email, width));
        }
        if let Some(tax_id) = &self.letterhead.tax_id {
            out.push(center(&format!("TIN: {}", tax_id), width));
        }
        out.push(rule.clone());

        let title = if self.is_paid() { "RECEIPT" } else { "INVOICE (UNPAID)" };
        out.push(center(title, width));
        let number_label = if self.is_paid() { "No" } else { "Code" };
        out.push(columns(number_label, &self.receipt_number, width));
        out.push(columns(
            "Date",
            &self.issued_at.format("%Y-%m-%d %H:%M").to_string(),
            width,
        ));
        if let Some(staff) = &self.staff_name {
            out.push(columns("Cashier", staff, width));
        }
        if let Some(customer) = &self.customer_name {
            out.push(columns("Customer", customer, width));
        }
        out.push(rule.clone());

        for line in &self.lines {
            out.push(clip(&line.name, width));
            out.push(columns(
                &format!(
                    "  {} x {}",
                    line.quantity,
                    self.currency.format_amount(line.unit_price)
                ),
                &self.currency.format_amount(line.line_total),
                width,
            ));
        }
        out.push(rule.clone());

        out.push(columns("TOTAL", &self.currency.format(self.total), width));
        match self.payment_method {
            Some(method) if self.is_paid() => {
                out.push(columns("Paid by", &method.to_string(), width));
            }
            _ => out.push(columns("Status", "UNPAID", width)),
        }
        out.push(columns("Ref", &self.barcode, width));
        if self.offline {
            out.push(center("OFFLINE SALE - pending sync", width));
        }

        if let Some(footer) = &self.letterhead.footer {
            out.push(rule);
            out.push(center(footer, width));
        }

        out.join("\n")
    }
}

/// Receipt id for a sale committed while offline: `OFF-<timestamp>-<suffix>`.
pub fn offline_receipt_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "OFF-{}-{}",
        now.format("%Y%m%d%H%M%S"),
        suffix[..6].to_uppercase()
    )
}

fn clip(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

fn center(text: &str, width: usize) -> String {
    let text = clip(text, width);
    let pad = (width - text.chars().count()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

fn columns(left: &str, right: &str, width: usize) -> String {
    let right = clip(right, width);
    let room = width.saturating_sub(right.chars().count() + 1);
    let left = clip(left, room);
    let gap = width - left.chars().count() - right.chars().count();
    format!("{}{}{}", left, " ".repeat(gap), right)
}

// =============================================================================
// Unit Tests
// =============================================================================
