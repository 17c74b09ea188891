//! # Error Types
//!
//! Domain-specific error types for rxdesk-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  rxdesk-core errors (this file)                                        │
//! │  ├── CoreError        - Cart / held-cart / request-building failures   │
//! │  ├── CheckoutBlocked  - Expiry and stock gates (must be fixed by user) │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  rxdesk-db errors       → DbError                                      │
//! │  rxdesk-backend errors  → BackendError                                 │
//! │  till errors            → ApiError (what the cashier sees)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `CheckoutBlocked` always renders every affected line in one message:
//! the cashier fixes the cart once instead of clicking through a dialog
//! per item.

use chrono::NaiveDate;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The product is not a line of the current cart.
    #[error("Product {0} is not in the cart")]
    NotInCart(String),

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Checkout, hold, or invoice on an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Resume or delete of a held transaction that no longer exists.
    #[error("Held transaction not found: {0}")]
    HeldTransactionNotFound(String),

    /// A checkout gate refused the sale.
    #[error(transparent)]
    Blocked(#[from] CheckoutBlocked),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Checkout Blocked
// =============================================================================

/// A cart line whose expiry date has already passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredLine {
    pub product_id: String,
    pub name: String,
    pub expiry_date: NaiveDate,
}

/// Why a cart line fails the stock gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockShortfall {
    /// The product is gone from the branch inventory.
    NoLongerAvailable,
    /// The branch has none left.
    OutOfStock { requested: i64 },
    /// The branch has some, but fewer than the cart asks for.
    Partial { available: i64, requested: i64 },
}

/// One line that failed the stock gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockIssue {
    pub product_id: String,
    pub name: String,
    pub shortfall: StockShortfall,
}

impl std::fmt::Display for StockIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.shortfall {
            StockShortfall::NoLongerAvailable => write!(f, "{}: no longer available", self.name),
            StockShortfall::OutOfStock { requested } => write!(
                f,
                "{}: out of stock (you have {} in cart)",
                self.name, requested
            ),
            StockShortfall::Partial {
                available,
                requested,
            } => write!(
                f,
                "{}: only {} left (you have {} in cart)",
                self.name, available, requested
            ),
        }
    }
}

/// A checkout gate refused the sale. Nothing was sent to the backend and
/// the cart is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutBlocked {
    /// At least one line is past its expiry date.
    #[error("{}", render_expired(.0))]
    Expired(Vec<ExpiredLine>),

    /// At least one line asks for more than the branch holds.
    #[error("{}", render_stock(.0))]
    Stock(Vec<StockIssue>),
}

fn render_expired(lines: &[ExpiredLine]) -> String {
    let mut message = String::from("Expired items must be removed before checkout:");
    for line in lines {
        message.push_str(&format!("\n• {} (expired {})", line.name, line.expiry_date));
    }
    message
}

fn render_stock(issues: &[StockIssue]) -> String {
    let mut message = String::from("Insufficient stock:");
    for issue in issues {
        message.push_str(&format!("\n• {}", issue));
    }
    message
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_issue_messages() {
        let partial = StockIssue {
            product_id: "p1".to_string(),
            name: "Amoxicillin".to_string(),
            shortfall: StockShortfall::Partial {
                available: 2,
                requested: 5,
            },
        };
        assert_eq!(
            partial.to_string(),
            "Amoxicillin: only 2 left (you have 5 in cart)"
        );

        let empty = StockIssue {
            product_id: "p2".to_string(),
            name: "Ibuprofen".to_string(),
            shortfall: StockShortfall::OutOfStock { requested: 1 },
        };
        assert_eq!(empty.to_string(), "Ibuprofen: out of stock (you have 1 in cart)");
    }

    #[test]
    fn test_blocked_lists_every_issue() {
        let blocked = CheckoutBlocked::Stock(vec![
            StockIssue {
                product_id: "p1".to_string(),
                name: "Amoxicillin".to_string(),
                shortfall: StockShortfall::Partial {
                    available: 2,
                    requested: 5,
                },
            },
            StockIssue {
                product_id: "p2".to_string(),
                name: "Cetirizine".to_string(),
                shortfall: StockShortfall::NoLongerAvailable,
            },
        ]);

        let message = blocked.to_string();
        assert!(message.starts_with("Insufficient stock:"));
        assert!(message.contains("Amoxicillin: only 2 left (you have 5 in cart)"));
        assert!(message.contains("Cetirizine: no longer available"));
    }

    #[test]
    fn test_expired_message() {
        let blocked = CheckoutBlocked::Expired(vec![ExpiredLine {
            product_id: "p1".to_string(),
            name: "Cough Syrup".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        }]);
        assert_eq!(
            blocked.to_string(),
            "Expired items must be removed before checkout:\n• Cough Syrup (expired 2024-01-31)"
        );
    }

    #[test]
    fn test_conversions_into_core_error() {
        let validation_err = ValidationError::Required {
            field: "product id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));

        let core_err: CoreError = CheckoutBlocked::Stock(vec![]).into();
        assert!(matches!(core_err, CoreError::Blocked(_)));
    }
}
