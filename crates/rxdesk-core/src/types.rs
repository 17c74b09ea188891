//! # Domain Types
//!
//! Core domain types used throughout the till.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐   ┌──────────────────┐   ┌─────────────────┐ │
//! │  │ InventorySnapshotItem│   │    CartLine      │   │ FinalizedSale   │ │
//! │  │ ──────────────────── │──►│ ──────────────── │──►│ ─────────────── │ │
//! │  │ branch_stock         │   │ product snapshot │   │ receipt_id      │ │
//! │  │ selling / unit price │   │ quantity         │   │ lines, total    │ │
//! │  │ expiry_date          │   └──────────────────┘   │ payment method  │ │
//! │  └──────────────────────┘            │             └─────────────────┘ │
//! │                                      ▼                                  │
//! │                             ┌──────────────────┐                        │
//! │                             │ HeldTransaction  │                        │
//! │                             └──────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! A cart line freezes the product's name, prices and expiry when it is
//! added. The reconciliation engine compares that frozen copy against a
//! fresh [`InventorySnapshot`] at commit time.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product Snapshot
// =============================================================================

/// Product data frozen into a cart line at add time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductSnapshot {
    pub name: String,

    /// Base (cost-side) price.
    pub unit_price: Money,

    /// Shelf price. When absent the unit price is charged.
    pub selling_price: Option<Money>,

    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,

    pub barcode: Option<String>,
}

impl ProductSnapshot {
    /// The price actually charged: selling price, else unit price.
    #[inline]
    pub fn effective_price(&self) -> Money {
        self.selling_price.unwrap_or(self.unit_price)
    }

    /// True when the expiry date is strictly before `today`.
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiry_date.map(|d| d < today).unwrap_or(false)
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// One line of the in-progress sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub product: ProductSnapshot,
    /// Always >= 1 while the line exists.
    pub quantity: i64,
    /// Price the cashier was last shown for this line: at add time, or at
    /// the last sale that disclosed a change. Drift is reported against it.
    pub quoted_price: Money,
}

impl CartLine {
    /// The working price differs from the one the cashier was shown.
    pub fn price_changed(&self) -> bool {
        self.product.effective_price() != self.quoted_price
    }

    /// quantity × (selling price ?? unit price)
    #[inline]
    pub fn line_total(&self) -> Money {
        self.product.effective_price().multiply_quantity(self.quantity)
    }

    /// The line as it appears on a receipt, at its current working price.
    pub fn to_sale_line(&self) -> SaleLine {
        SaleLine {
            product_id: self.product_id.clone(),
            name: self.product.name.clone(),
            quantity: self.quantity,
            unit_price: self.product.effective_price(),
            line_total: self.line_total(),
        }
    }
}

// =============================================================================
// Inventory Snapshot
// =============================================================================

/// Branch-scoped, read-only projection of one product's stock and price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InventorySnapshotItem {
    pub product_id: String,
    pub name: String,
    pub branch_stock: i64,
    pub selling_price: Option<Money>,
    pub unit_price: Money,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    pub reorder_level: i64,
    pub batch_number: Option<String>,
    pub barcode: Option<String>,
}

impl InventorySnapshotItem {
    #[inline]
    pub fn effective_price(&self) -> Money {
        self.selling_price.unwrap_or(self.unit_price)
    }

    #[inline]
    pub fn is_sellable(&self) -> bool {
        self.branch_stock > 0
    }

    /// Stock at or below the reorder level (and a reorder level is set).
    pub fn is_low_stock(&self) -> bool {
        self.reorder_level > 0 && self.branch_stock <= self.reorder_level
    }

    /// Freezes the fields a cart line needs.
    pub fn to_product_snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            name: self.name.clone(),
            unit_price: self.unit_price,
            selling_price: self.selling_price,
            expiry_date: self.expiry_date,
            barcode: self.barcode.clone(),
        }
    }
}

/// A point-in-time read of a branch's inventory.
///
/// `offline` tells the reconciliation engine whether this came from the
/// backend (verify stock and prices) or from the local cache (trust it).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    pub branch_id: String,
    pub items: Vec<InventorySnapshotItem>,
    pub offline: bool,
    pub taken_at: DateTime<Utc>,
}

impl InventorySnapshot {
    pub fn new(
        branch_id: impl Into<String>,
        items: Vec<InventorySnapshotItem>,
        offline: bool,
        taken_at: DateTime<Utc>,
    ) -> Self {
        InventorySnapshot {
            branch_id: branch_id.into(),
            items,
            offline,
            taken_at,
        }
    }

    pub fn get(&self, product_id: &str) -> Option<&InventorySnapshotItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Looks an item up by barcode, falling back to product id.
    pub fn find(&self, code: &str) -> Option<&InventorySnapshotItem> {
        self.items
            .iter()
            .find(|i| i.barcode.as_deref() == Some(code))
            .or_else(|| self.get(code))
    }

    /// Items with stock on hand, for product listings.
    pub fn sellable(&self) -> impl Iterator<Item = &InventorySnapshotItem> {
        self.items.iter().filter(|i| i.is_sellable())
    }
}

// =============================================================================
// Held Transaction
// =============================================================================

/// A cart parked without committing a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HeldTransaction {
    pub id: String,
    pub items: Vec<CartLine>,
    pub customer_name: String,
    /// Total at hold time. Informational: prices are re-checked on resume.
    pub total: Money,
    #[ts(as = "String")]
    pub held_at: DateTime<Utc>,
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    MobileMoney,
    Insurance,
    /// Sold on account; settled later against an invoice.
    Credit,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::MobileMoney => "Mobile money",
            PaymentMethod::Insurance => "Insurance",
            PaymentMethod::Credit => "Credit",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "debit" => Ok(PaymentMethod::Card),
            "mobile" | "mobile_money" | "momo" => Ok(PaymentMethod::MobileMoney),
            "insurance" | "nhif" => Ok(PaymentMethod::Insurance),
            "credit" | "account" => Ok(PaymentMethod::Credit),
            other => Err(crate::error::ValidationError::InvalidFormat {
                field: "payment method".to_string(),
                reason: format!("unknown method '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

/// Who the sale is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomerSelection {
    /// A registered patient picked from the customer list.
    Patient { id: String, name: String },
    /// Free-text name typed at the till (may be empty).
    WalkIn { name: Option<String> },
}

impl CustomerSelection {
    pub fn customer_id(&self) -> Option<&str> {
        match self {
            CustomerSelection::Patient { id, .. } => Some(id.as_str()),
            CustomerSelection::WalkIn { .. } => None,
        }
    }

    pub fn customer_name(&self) -> Option<&str> {
        match self {
            CustomerSelection::Patient { name, .. } => Some(name.as_str()),
            CustomerSelection::WalkIn { name } => name.as_deref().filter(|n| !n.trim().is_empty()),
        }
    }
}

impl Default for CustomerSelection {
    fn default() -> Self {
        CustomerSelection::WalkIn { name: None }
    }
}

/// Everything the cashier chose in the payment dialog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    pub customer: CustomerSelection,
    /// Storage references of uploaded prescription images.
    #[serde(default)]
    pub prescription_images: Vec<String>,
}

impl PaymentDetails {
    pub fn cash() -> Self {
        PaymentDetails {
            method: PaymentMethod::Cash,
            customer: CustomerSelection::default(),
            prescription_images: Vec::new(),
        }
    }
}

// =============================================================================
// Sale Request / Finalized Sale
// =============================================================================

/// One line of a sale commit request, priced at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRequestItem {
    pub product_id: String,
    pub qty: i64,
    pub unit_price: Money,
}

/// The commit request sent to the backend (or the offline journal).
///
/// `client_reference` is the idempotency key: a retry of the same cart
/// reuses it so the backend can drop the duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRequest {
    pub client_reference: String,
    pub branch_id: String,
    pub items: Vec<SaleRequestItem>,
    pub total: Money,
    pub customer_name: Option<String>,
    pub customer_id: Option<String>,
    pub shift_id: Option<String>,
    pub staff_name: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub prescription_images: Vec<String>,
    pub force_offline: bool,
}

/// What the backend (or offline journal) returns for an accepted sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReceipt {
    pub receipt_id: String,
}

/// A line of a committed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

/// A committed sale. Immutable once built: receipts read it, never change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FinalizedSale {
    pub receipt_id: String,
    pub items: Vec<SaleLine>,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub staff_name: Option<String>,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    /// Committed against the local cache while offline.
    pub offline: bool,
}

// =============================================================================
// Pending (credit) Transaction
// =============================================================================

/// Request for an unpaid invoice to be settled later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransactionRequest {
    pub branch_id: String,
    pub items: Vec<SaleRequestItem>,
    pub total: Money,
}

/// Backend handle for an unpaid invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    /// Short code the cashier can type to look the invoice up.
    pub short_code: String,
    /// Payload for the scannable barcode.
    pub barcode: String,
}

// =============================================================================
// Unit Tests
// =============================================================================
