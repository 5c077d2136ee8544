//! # Service Error Types
//!
//! What the storefront and back-office see when an operation fails.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Service Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Shopper       │  │   Caller bug    │  │   External             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  Precondition   │  │  Gateway               │ │
//! │  │  Promo          │  │  Domain         │  │  Email                 │ │
//! │  │  UnknownProduct │  │                 │  │  Database              │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │  Configuration  │                                                   │
//! │  │  Config         │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use toyshop_core::{CoreError, PromoRejection, ValidationError};
use toyshop_db::DbError;

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error type.
#[derive(Debug, Error)]
pub enum ServiceError {
    // =========================================================================
    // Shopper Errors
    // =========================================================================
    /// Malformed cart or customer data.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Promo code refused. The message is safe to show to the shopper.
    #[error("{0}")]
    Promo(PromoRejection),

    /// Cart references a product that doesn't exist or isn't listed.
    #[error("Product not available: {0}")]
    UnknownProduct(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// An engine was called with inputs the caller should have ruled out.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Stock shortage or a forbidden order status change.
    #[error(transparent)]
    Domain(CoreError),

    // =========================================================================
    // Dependency Errors
    // =========================================================================
    /// Store operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Payment aggregator call failed or returned an unusable response.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Email provider call failed.
    #[error("Email delivery failed: {0}")]
    Email(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid or unreadable configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => ServiceError::Validation(v),
            CoreError::PreconditionViolation(message) => ServiceError::Precondition(message),
            other => ServiceError::Domain(other),
        }
    }
}

impl From<PromoRejection> for ServiceError {
    fn from(reason: PromoRejection) -> Self {
        ServiceError::Promo(reason)
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Gateway(err.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for ServiceError {
    fn from(err: toml::de::Error) -> Self {
        ServiceError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ServiceError {
    fn from(err: toml::ser::Error) -> Self {
        ServiceError::Config(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ServiceError {
    /// Returns true if the failure came from an external dependency and the
    /// caller may try again. Services never retry by themselves.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Gateway(_) | ServiceError::Email(_) => true,
            ServiceError::Database(db) => db.is_transient(),
            _ => false,
        }
    }

    /// Returns true if the shopper can fix the problem (cart, form, code).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation(_) | ServiceError::Promo(_) | ServiceError::UnknownProduct(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_are_unwrapped() {
        let err: ServiceError = CoreError::precondition("zero base").into();
        assert!(matches!(err, ServiceError::Precondition(ref m) if m == "zero base"));

        let err: ServiceError = CoreError::Validation(ValidationError::Required {
            field: "cart".into(),
        })
        .into();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_promo_message_is_shopper_facing() {
        let err = ServiceError::from(PromoRejection::Expired);
        assert_eq!(err.to_string(), PromoRejection::Expired.message());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ServiceError::Gateway("timeout".into()).is_retryable());
        assert!(ServiceError::Email("503".into()).is_retryable());
        assert!(!ServiceError::Config("bad".into()).is_retryable());
        assert!(!ServiceError::Database(DbError::not_found("Order", "x")).is_retryable());
    }
}
