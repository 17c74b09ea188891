//! # Backend Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Backend answer      │ │
//! │  │                 │  │  (transient)    │  │                         │ │
//! │  │  InvalidConfig  │  │  Network        │  │  Rejected               │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  InvalidPayload         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transient errors leave the outcome of a commit unknown: the till keeps
//! the cart and the client reference so a retry cannot double-sell.

use thiserror::Error;

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid backend configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Request never got an answer (DNS, refused, reset, TLS).
    #[error("Could not reach the backend: {0}")]
    Network(String),

    #[error("Backend request timed out")]
    Timeout,

    // =========================================================================
    // Backend Answers
    // =========================================================================
    /// The backend answered and refused. `message` is human-readable.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The backend answered with something we cannot use.
    #[error("Invalid backend payload: {0}")]
    InvalidPayload(String),
}

impl BackendError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        BackendError::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        BackendError::InvalidPayload(message.into())
    }

    /// True when the request may not have reached the backend and a retry
    /// (with the same client reference) is meaningful.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Network(_) | BackendError::Timeout)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::InvalidPayload(err.to_string())
        } else if err.is_builder() {
            BackendError::InvalidConfig(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for BackendError {
    fn from(err: url::ParseError) -> Self {
        BackendError::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::InvalidPayload(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::Timeout.is_transient());
        assert!(BackendError::Network("reset".into()).is_transient());
        assert!(!BackendError::rejected(409, "Insufficient stock").is_transient());
        assert!(!BackendError::invalid_payload("not json").is_transient());
    }

    #[test]
    fn test_rejected_displays_message_only() {
        let err = BackendError::rejected(400, "Paracetamol is out of stock");
        assert_eq!(err.to_string(), "Paracetamol is out of stock");
    }
}
