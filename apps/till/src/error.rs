//! # API Error Type
//!
//! Unified error type for till commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Till                               │
//! │                                                                         │
//! │  Command Function  ──  Result<T, ApiError>                              │
//! │         │                                                               │
//! │         ├── CheckoutBlocked ──► EXPIRED_ITEM / INSUFFICIENT_STOCK       │
//! │         │                       (sale never sent, cart unchanged)      │
//! │         ├── BackendError    ──► NETWORK_ERROR   (transient, retry)     │
//! │         │                   ──► SALE_REJECTED   (backend said no)      │
//! │         ├── CoreError       ──► CART_ERROR / VALIDATION_ERROR / ...    │
//! │         └── DbError         ──► DATABASE_ERROR  (details logged only)  │
//! │                                                                         │
//! │  What the cashier sees:                                                 │
//! │  {                                                                      │
//! │    "code": "INSUFFICIENT_STOCK",                                        │
//! │    "message": "Insufficient stock:\n• Amoxicillin: only 2 left ..."     │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Messages are always meant for a person. Raw SQL errors and backend
//! payloads go to the log, never into `message`.

use serde::Serialize;

use rxdesk_backend::BackendError;
use rxdesk_core::{CheckoutBlocked, CoreError};
use rxdesk_db::DbError;

use crate::state::ConfigError;

/// Result type alias for till commands.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned from till commands.
///
/// ```json
/// { "code": "NETWORK_ERROR", "message": "Could not reach the server. The cart was kept; try again." }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    DatabaseError,
    ConfigError,
    Internal,
    CartError,

    /// A cart line is past its expiry date.
    ExpiredItem,

    /// A cart line asks for more than the branch holds.
    InsufficientStock,

    /// The backend could not be reached; the outcome of a commit is unknown.
    NetworkError,

    /// The backend refused the sale after the till's own checks passed.
    SaleRejected,

    /// A checkout is already waiting on the backend.
    CheckoutInProgress,

    /// The operation needs a live connection.
    OfflineUnavailable,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn checkout_in_progress() -> Self {
        ApiError::new(
            ErrorCode::CheckoutInProgress,
            "A checkout is already in progress. Please wait for it to finish.",
        )
    }

    pub fn offline(what: &str) -> Self {
        ApiError::new(
            ErrorCode::OfflineUnavailable,
            format!("{} needs a connection to the server.", what),
        )
    }

    /// True when the cashier can retry the same cart as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self.code, ErrorCode::NetworkError | ErrorCode::CheckoutInProgress)
    }
}

impl From<CheckoutBlocked> for ApiError {
    fn from(blocked: CheckoutBlocked) -> Self {
        let code = match blocked {
            CheckoutBlocked::Expired(_) => ErrorCode::ExpiredItem,
            CheckoutBlocked::Stock(_) => ErrorCode::InsufficientStock,
        };
        ApiError::new(code, blocked.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Blocked(blocked) => blocked.into(),
            CoreError::NotInCart(_) | CoreError::CartTooLarge { .. } | CoreError::EmptyCart => {
                ApiError::new(ErrorCode::CartError, err.to_string())
            }
            CoreError::HeldTransactionNotFound(id) => ApiError::not_found("Held transaction", &id),
            CoreError::QuantityTooLarge { .. } | CoreError::Validation(_) => {
                ApiError::validation(err.to_string())
            }
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Network(_) | BackendError::Timeout => {
                tracing::warn!(error = %err, "Backend unreachable");
                ApiError::new(
                    ErrorCode::NetworkError,
                    "Could not reach the server. The cart was kept; try again.",
                )
            }
            BackendError::Rejected { message, .. } => ApiError::new(ErrorCode::SaleRejected, message),
            BackendError::InvalidPayload(detail) => {
                tracing::error!(detail = %detail, "Unusable backend response");
                ApiError::internal("The server sent a response the till could not read.")
            }
            BackendError::InvalidConfig(_) | BackendError::InvalidUrl(_) => {
                ApiError::new(ErrorCode::ConfigError, err.to_string())
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Local database is busy")
            }
            other => {
                tracing::error!(error = %other, "Local database error");
                ApiError::new(ErrorCode::DatabaseError, "Local database operation failed")
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rxdesk_core::{StockIssue, StockShortfall};

    #[test]
    fn test_stock_block_maps_to_insufficient_stock() {
        let blocked = CheckoutBlocked::Stock(vec![StockIssue {
            product_id: "p1".to_string(),
            name: "Amoxicillin".to_string(),
            shortfall: StockShortfall::Partial {
                available: 2,
                requested: 5,
            },
        }]);

        let err = ApiError::from(CoreError::from(blocked));
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert!(err.message.contains("only 2 left (you have 5 in cart)"));
    }

    #[test]
    fn test_backend_errors_never_leak_raw_detail() {
        let err = ApiError::from(BackendError::Network("tcp connect error: 10.0.0.1:443".into()));
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert!(!err.message.contains("10.0.0.1"));
        assert!(err.is_retryable());

        let err = ApiError::from(BackendError::rejected(409, "Insufficient stock for Amoxicillin"));
        assert_eq!(err.code, ErrorCode::SaleRejected);
        assert_eq!(err.message, "Insufficient stock for Amoxicillin");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_db_errors_are_generic() {
        let err = ApiError::from(DbError::QueryFailed("no such table: offline_sales".into()));
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("offline_sales"));
    }

    #[test]
    fn test_serializes_screaming_snake_code() {
        let json = serde_json::to_value(ApiError::checkout_in_progress()).unwrap();
        assert_eq!(json["code"], "CHECKOUT_IN_PROGRESS");
    }
}
