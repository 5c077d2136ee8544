//! # Validation Module
//!
//! Input validation for checkout and back-office entry.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Storefront / back-office forms                               │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: toyshop-services                                             │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (stock >= 0, amounts >= 0)                      │
//! │  ├── UNIQUE constraints (promo code)                                   │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use toyshop_core::validation::{validate_quantity, validate_customer_email};
//!
//! validate_quantity(5).unwrap();
//! validate_customer_email("parent@example.com").unwrap();
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::CartLine;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a customer's display name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    validate_text("customer_name", name, 200)
}

/// Validates a shipping address.
pub fn validate_shipping_address(address: &str) -> ValidationResult<()> {
    validate_text("shipping_address", address, 500)
}

/// Validates a customer email.
///
/// Only a shape check: one `@`, non-empty local part, a dot in the domain.
///
/// ## Example
/// ```rust
/// use toyshop_core::validation::validate_customer_email;
///
/// assert!(validate_customer_email("parent@example.com").is_ok());
/// assert!(validate_customer_email("not-an-email").is_err());
/// ```
pub fn validate_customer_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "customer_email".to_string(),
        });
    }

    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "customer_email".to_string(),
            max: 254,
        });
    }

    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !well_formed {
        return Err(ValidationError::InvalidFormat {
            field: "customer_email".to_string(),
            reason: "must look like name@domain.tld".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 200)
}

/// Validates an expense description.
pub fn validate_expense_description(description: &str) -> ValidationResult<()> {
    validate_text("description", description, 500)
}

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Storefront: Add to cart                                                │
/// │                                                                         │
/// │  Shopper picks quantity: 5                                             │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"               │
/// │       │                                                                 │
/// │       ├── qty > 999? → Error: "quantity must be between 1 and 999"     │
/// │       │                                                                 │
/// │       └── OK → line is added                                           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in whole currency units.
///
/// Zero is allowed (giveaways).
pub fn validate_price(units: i64) -> ValidationResult<()> {
    if units < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }

    Ok(())
}

/// Validates a rate in basis points (0% to 100%).
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates a cart before pricing.
///
/// ## Rules
/// - At least one line, at most MAX_CART_ITEMS lines
/// - Every quantity within 1..=MAX_ITEM_QUANTITY
/// - No negative unit prices
/// - Each product appears once
pub fn validate_cart(lines: &[CartLine]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "cart".to_string(),
        });
    }

    if lines.len() > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        validate_quantity(line.quantity)?;
        validate_price(line.unit_price.units())?;

        if !seen.insert(line.id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "product".to_string(),
                value: line.id.clone(),
            });
        }
    }

    Ok(())
}

/// Validates a new expense entry.
pub fn validate_expense(
    description: &str,
    amount: i64,
    quantity: Option<i64>,
) -> ValidationResult<()> {
    validate_expense_description(description)?;

    if amount < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "amount".to_string(),
        });
    }

    // Restock entries record how many units were bought.
    if let Some(qty) = quantity {
        if qty <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use toyshop_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    fn line(id: &str, price: i64, qty: i64) -> CartLine {
        CartLine::new(id, id, Money::from_units(price), qty, "toys")
    }

    #[test]
    fn test_validate_customer_email() {
        assert!(validate_customer_email("parent@example.com").is_ok());
        assert!(validate_customer_email("  a.b@shop.co.uk ").is_ok());

        assert!(validate_customer_email("").is_err());
        assert!(validate_customer_email("no-at-sign").is_err());
        assert!(validate_customer_email("@example.com").is_err());
        assert!(validate_customer_email("a@b@example.com").is_err());
        assert!(validate_customer_email("a@localhost").is_err());
        assert!(validate_customer_email("a b@example.com").is_err());
    }

    #[test]
    fn test_validate_customer_name() {
        assert!(validate_customer_name("Awa Diop").is_ok());
        assert!(validate_customer_name("   ").is_err());
        assert!(validate_customer_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(0).is_ok());
        assert!(validate_price(12_000).is_ok());
        assert!(validate_price(-1).is_err());
    }

    #[test]
    fn test_validate_rate_bps() {
        assert!(validate_rate_bps("fee", 0).is_ok());
        assert!(validate_rate_bps("fee", 200).is_ok());
        assert!(validate_rate_bps("fee", 10_000).is_ok());
        assert!(validate_rate_bps("fee", 10_001).is_err());
    }

    #[test]
    fn test_validate_cart() {
        assert!(validate_cart(&[line("a", 100, 1), line("b", 0, 3)]).is_ok());

        assert!(matches!(
            validate_cart(&[]),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_cart(&[line("a", 100, 0)]),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_cart(&[line("a", -5, 1)]),
            Err(ValidationError::MustNotBeNegative { .. })
        ));
        assert!(matches!(
            validate_cart(&[line("a", 100, 1), line("a", 100, 2)]),
            Err(ValidationError::Duplicate { .. })
        ));

        let too_many: Vec<CartLine> = (0..=MAX_CART_ITEMS)
            .map(|i| line(&format!("p-{}", i), 10, 1))
            .collect();
        assert!(validate_cart(&too_many).is_err());
    }

    #[test]
    fn test_validate_expense() {
        assert!(validate_expense("Flyers", 5_000, None).is_ok());
        assert!(validate_expense("Restock", 20_000, Some(10)).is_ok());
        assert!(validate_expense("Gift wrap", 0, None).is_ok());

        assert!(validate_expense("", 100, None).is_err());
        assert!(validate_expense("Fix", -1, None).is_err());
        assert!(validate_expense("Restock", 20_000, Some(0)).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
    }
}
