//! # Error Types
//!
//! Domain-specific error types for toyshop-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  toyshop-core errors (this file)                                       │
//! │  ├── CoreError            - Domain errors, fatal preconditions         │
//! │  └── ValidationError      - Input validation failures                  │
//! │                                                                         │
//! │  Promo rejections are NOT errors: see promo::PromoRejection            │
//! │                                                                         │
//! │  toyshop-db errors (separate crate)                                    │
//! │  └── DbError              - Database operation failures                │
//! │                                                                         │
//! │  toyshop-services errors                                               │
//! │  └── ServiceError         - What the storefront/back-office sees       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → Frontend           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product ID, amounts, etc.)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A computation was invoked with inputs its callers must have ruled out.
    ///
    /// ## When This Occurs
    /// - Fee absorption on a zero-amount order
    /// - Rescaling line items against a zero base
    /// - A gateway payload over the aggregator's item or amount limit
    ///
    /// These indicate a caller bug, not a shopper mistake.
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// Not enough stock to fulfil a cart line.
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Order status change not allowed by the status table.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for a precondition violation.
    pub fn precondition(message: impl Into<String>) -> Self {
        CoreError::PreconditionViolation(message.into())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any computation; nothing is partially applied.
#[derive(Debug, Error)]
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

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., the same product twice in one cart).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },
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
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "lego-castle".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for lego-castle: available 3, requested 5"
        );

        let err = CoreError::InvalidStatusTransition {
            order_id: "o-1".to_string(),
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        };
        assert_eq!(err.to_string(), "Order o-1 cannot move from delivered to cancelled");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "cart".to_string(),
        };
        assert_eq!(err.to_string(), "cart is required");

        let err = ValidationError::MustNotBeNegative {
            field: "amount".to_string(),
        };
        assert_eq!(err.to_string(), "amount must not be negative");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "cart".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
