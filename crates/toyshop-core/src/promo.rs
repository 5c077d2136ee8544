//! # Promo Module
//!
//! Promo-code validation and discount computation.
//!
//! ## Redemption Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Shopper types "welcome10"                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  store.find_active_by_code("WELCOME10")        (toyshop-db)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_promo_code(code, candidate, order_amount, now)  ← THIS       │
//! │       │                                                                 │
//! │       ├── NotFound      absent, inactive, or different code            │
//! │       ├── NotYetActive  now < starts_at                                │
//! │       ├── Expired       now > expires_at                               │
//! │       ├── BelowMinimum  order_amount < min_order_amount                │
//! │       ├── LimitReached  usage_count ≥ usage_limit                      │
//! │       │                                                                 │
//! │       └── Valid { discount, promo_id }                                 │
//! │               │                                                         │
//! │               ▼                                                         │
//! │  store.try_increment_usage(promo_id)           (atomic, guarded)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `Valid` result is advisory. Only the guarded increment makes the
//! redemption real; two shoppers can both see `Valid` for the last use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{DiscountType, PromoCode};
use crate::validation::ValidationResult;

/// Longest accepted promo code.
pub const MAX_PROMO_CODE_LENGTH: usize = 32;

// =============================================================================
// Validation Outcome
// =============================================================================

/// Why a promo code cannot be applied.
///
/// These are business outcomes the shopper can act on, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PromoRejection {
    NotFound,
    NotYetActive,
    Expired,
    BelowMinimum,
    LimitReached,
}

impl PromoRejection {
    /// Message shown next to the promo input.
    pub fn message(&self) -> &'static str {
        match self {
            PromoRejection::NotFound => "This promo code does not exist",
            PromoRejection::NotYetActive => "This promo code is not active yet",
            PromoRejection::Expired => "This promo code has expired",
            PromoRejection::BelowMinimum => "Your order does not reach the minimum for this code",
            PromoRejection::LimitReached => "This promo code has reached its usage limit",
        }
    }
}

impl fmt::Display for PromoRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of validating a promo code against an order amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export)]
pub enum PromoValidation {
    Valid { discount: Money, promo_id: String },
    Invalid { reason: PromoRejection },
}

impl PromoValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, PromoValidation::Valid { .. })
    }

    /// Discount to apply; zero when invalid.
    pub fn discount(&self) -> Money {
        match self {
            PromoValidation::Valid { discount, .. } => *discount,
            PromoValidation::Invalid { .. } => Money::zero(),
        }
    }

    pub fn promo_id(&self) -> Option<&str> {
        match self {
            PromoValidation::Valid { promo_id, .. } => Some(promo_id),
            PromoValidation::Invalid { .. } => None,
        }
    }

    pub fn rejection(&self) -> Option<PromoRejection> {
        match self {
            PromoValidation::Valid { .. } => None,
            PromoValidation::Invalid { reason } => Some(*reason),
        }
    }

    fn invalid(reason: PromoRejection) -> Self {
        PromoValidation::Invalid { reason }
    }
}

// =============================================================================
// Lookup
// =============================================================================

/// Canonical form of a code: trimmed, upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Finds an active code in memory, ignoring case.
pub fn find_promo_code<'a>(codes: &'a [PromoCode], code: &str) -> Option<&'a PromoCode> {
    let wanted = normalize_code(code);
    codes
        .iter()
        .find(|promo| promo.is_active && normalize_code(&promo.code) == wanted)
}

// =============================================================================
// Validation
// =============================================================================

/// Discount a code grants on `order_amount`, ignoring eligibility.
///
/// `min(raw, max_discount, order_amount)` where `raw` is the percentage of
/// the order amount (rounded once, half up) or the fixed value.
pub fn compute_discount(promo: &PromoCode, order_amount: Money) -> Money {
    let raw = match promo.discount_type {
        DiscountType::Percentage => order_amount.apply_percentage(promo.discount_value),
        DiscountType::Fixed => Money::from_units(promo.discount_value.max(0.0).round() as i64),
    };

    let capped = match promo.max_discount_amount() {
        Some(cap) => raw.min(cap),
        None => raw,
    };

    capped.min(order_amount).non_negative()
}

/// Validates `code` against the stored candidate record.
///
/// `candidate` is whatever the promo store returned for the code (or `None`).
/// Checks run in a fixed order and the first failure wins. Pure: the same
/// inputs always give the same answer.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use toyshop_core::money::Money;
/// use toyshop_core::promo::{validate_promo_code, PromoRejection, PromoValidation};
///
/// let outcome = validate_promo_code("NOPE", None, Money::from_units(1_000), Utc::now());
/// assert_eq!(outcome, PromoValidation::Invalid { reason: PromoRejection::NotFound });
/// ```
pub fn validate_promo_code(
    code: &str,
    candidate: Option<&PromoCode>,
    order_amount: Money,
    now: DateTime<Utc>,
) -> PromoValidation {
    let promo = match candidate {
        Some(promo) if promo.is_active && normalize_code(&promo.code) == normalize_code(code) => {
            promo
        }
        _ => return PromoValidation::invalid(PromoRejection::NotFound),
    };

    if now < promo.starts_at {
        return PromoValidation::invalid(PromoRejection::NotYetActive);
    }

    if promo.expires_at.is_some_and(|expires_at| now > expires_at) {
        return PromoValidation::invalid(PromoRejection::Expired);
    }

    if order_amount < promo.min_order() {
        return PromoValidation::invalid(PromoRejection::BelowMinimum);
    }

    if promo.is_exhausted() {
        return PromoValidation::invalid(PromoRejection::LimitReached);
    }

    PromoValidation::Valid {
        discount: compute_discount(promo, order_amount),
        promo_id: promo.id.clone(),
    }
}

/// Checks the invariants a promo code must satisfy when an administrator
/// creates it.
pub fn validate_new_promo_code(promo: &PromoCode) -> ValidationResult<()> {
    let code = promo.code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() > MAX_PROMO_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_PROMO_CODE_LENGTH,
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    if !promo.discount_value.is_finite() || promo.discount_value < 0.0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "discount_value".to_string(),
        });
    }

    if promo.discount_type == DiscountType::Percentage && promo.discount_value > 100.0 {
        return Err(ValidationError::OutOfRange {
            field: "discount_value".to_string(),
            min: 0,
            max: 100,
        });
    }

    if promo.min_order_amount < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "min_order_amount".to_string(),
        });
    }

    if promo.max_discount.is_some_and(|cap| cap < 0) {
        return Err(ValidationError::MustNotBeNegative {
            field: "max_discount".to_string(),
        });
    }

    if promo.usage_count < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "usage_count".to_string(),
        });
    }

    if let Some(limit) = promo.usage_limit {
        if limit <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "usage_limit".to_string(),
            });
        }
        if promo.usage_count > limit {
            return Err(ValidationError::OutOfRange {
                field: "usage_count".to_string(),
                min: 0,
                max: limit,
            });
        }
    }

    if promo.expires_at.is_some_and(|expires_at| expires_at <= promo.starts_at) {
        return Err(ValidationError::InvalidFormat {
            field: "expires_at".to_string(),
            reason: "must be after starts_at".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
