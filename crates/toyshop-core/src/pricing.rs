//! # Pricing Module
//!
//! Turns a cart into the amount the customer pays, and the amount the
//! payment aggregator is asked for.
//!
//! ## Checkout Pricing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Pricing Flow                                       │
//! │                                                                         │
//! │  CartLine[] ──► compute_subtotal ──► subtotal                          │
//! │                                          │                              │
//! │                  ShippingPolicy ──► compute_shipping ──► shipping      │
//! │                                          │                              │
//! │  promo::validate_promo_code(subtotal + shipping) ──► discount          │
//! │                                          │                              │
//! │                 compute_total = max(0, subtotal + shipping − discount) │
//! │                                          │                              │
//! │  ┌── online payment only ────────────────▼───────────────────────┐    │
//! │  │  absorb_processor_fee(total, 2%) ──► requested                 │    │
//! │  │  rescale_line_items(items, requested, subtotal + shipping)     │    │
//! │  │  aggregator limits: 1..=20 items, Σ ≤ 2,000,000                 │    │
//! │  └────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fee Absorption
//! The aggregator adds its percentage fee on top of what we request. To keep
//! the customer-visible total unchanged we request `total / (1 + fee)`:
//! ```text
//! total = 35,100   fee = 2%   requested = round(35,100 / 1.02) = 34,412
//! customer charged 34,412 × 1.02 = 35,100.24 ≈ 35,100
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CartLine, Rate};
use crate::validation::validate_cart;
use crate::{
    DEFAULT_FLAT_SHIPPING_FEE, DEFAULT_FREE_SHIPPING_THRESHOLD, MAX_GATEWAY_AMOUNT,
    MAX_GATEWAY_LINE_ITEMS,
};

/// Label used for the shipping line sent to the aggregator.
pub const SHIPPING_LINE_NAME: &str = "Shipping";

// =============================================================================
// Shipping Policy
// =============================================================================

/// Free-shipping threshold and flat fee.
///
/// There is a single default; stores override it through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingPolicy {
    /// Subtotals at or above this ship for free.
    pub free_threshold: Money,
    /// Charged below the threshold.
    pub flat_fee: Money,
}

impl ShippingPolicy {
    pub const fn new(free_threshold: Money, flat_fee: Money) -> Self {
        ShippingPolicy {
            free_threshold,
            flat_fee,
        }
    }

    /// Shipping cost for a subtotal under this policy.
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        compute_shipping(subtotal, self.free_threshold, self.flat_fee)
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        ShippingPolicy::new(
            Money::from_units(DEFAULT_FREE_SHIPPING_THRESHOLD),
            Money::from_units(DEFAULT_FLAT_SHIPPING_FEE),
        )
    }
}

// =============================================================================
// Pricing Result
// =============================================================================

/// Breakdown of what the customer pays.
///
/// ## Invariants
/// - `total = max(0, subtotal + shipping_cost − discount)`
/// - `discount ≤ subtotal + shipping_cost`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingResult {
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub discount: Money,
    pub total: Money,
}

impl PricingResult {
    /// The amount promo codes are validated against.
    #[inline]
    pub fn order_amount(&self) -> Money {
        self.subtotal + self.shipping_cost
    }
}

// =============================================================================
// Basic Operations
// =============================================================================

/// Sum of `unit_price × quantity` across the cart.
pub fn compute_subtotal(lines: &[CartLine]) -> Money {
    lines.iter().map(CartLine::line_total).sum()
}

/// `0` when `subtotal ≥ free_threshold`, otherwise `flat_fee`.
///
/// ```rust
/// use toyshop_core::money::Money;
/// use toyshop_core::pricing::compute_shipping;
///
/// let threshold = Money::from_units(10_000);
/// let fee = Money::from_units(1_000);
/// assert_eq!(compute_shipping(Money::from_units(10_000), threshold, fee), Money::zero());
/// assert_eq!(compute_shipping(Money::from_units(9_999), threshold, fee), fee);
/// ```
pub fn compute_shipping(subtotal: Money, free_threshold: Money, flat_fee: Money) -> Money {
    if subtotal >= free_threshold {
        Money::zero()
    } else {
        flat_fee
    }
}

/// `max(0, subtotal + shipping − discount)`.
///
/// The discount applies to merchandise and shipping jointly.
pub fn compute_total(subtotal: Money, shipping: Money, discount: Money) -> Money {
    (subtotal + shipping - discount).non_negative()
}

/// Amount to request from the aggregator so that, once its fee is added,
/// the customer is charged `target`.
///
/// ## Errors
/// `PreconditionViolation` when `target` is not positive. Free orders must
/// never reach the aggregator.
pub fn absorb_processor_fee(target: Money, fee_rate: Rate) -> CoreResult<Money> {
    if !target.is_positive() {
        return Err(CoreError::precondition(format!(
            "fee absorption needs a positive amount, got {}",
            target
        )));
    }
    Ok(target.divide_by_one_plus(fee_rate))
}

/// Prices a cart with an already-validated discount.
///
/// The discount is clamped to `subtotal + shipping`, so the result always
/// satisfies the `PricingResult` invariants.
///
/// ## Errors
/// `Validation` when the cart is empty or malformed.
pub fn price_cart(
    lines: &[CartLine],
    policy: &ShippingPolicy,
    discount: Money,
) -> CoreResult<PricingResult> {
    validate_cart(lines)?;

    let subtotal = compute_subtotal(lines);
    let shipping_cost = policy.shipping_for(subtotal);
    let discount = discount.non_negative().min(subtotal + shipping_cost);
    let total = compute_total(subtotal, shipping_cost, discount);

    Ok(PricingResult {
        subtotal,
        shipping_cost,
        discount,
        total,
    })
}

// =============================================================================
// Gateway Line Items
// =============================================================================

/// A line item as submitted to the payment aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GatewayLineItem {
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl GatewayLineItem {
    pub fn new(name: impl Into<String>, unit_price: Money, quantity: i64) -> Self {
        GatewayLineItem {
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// Sum of all line totals.
pub fn line_items_total(items: &[GatewayLineItem]) -> Money {
    items.iter().map(GatewayLineItem::line_total).sum()
}

/// Rescales unit prices by `requested / base` so that the items sum to
/// exactly `requested`.
///
/// ## Algorithm
/// ```text
/// 1. unit_price' = round_half_up(unit_price × requested / base)
/// 2. residual    = requested − Σ unit_price' × quantity
/// 3. residual goes to the line with the largest total:
///    - quantity divides residual → add residual / quantity to its price
///    - otherwise                 → split one unit into its own line and
///                                  add the whole residual to that unit
/// ```
///
/// ## Errors
/// `PreconditionViolation` when `base` is not positive, when there are no
/// items, or when the correction would push a price below zero.
pub fn rescale_line_items(
    items: &[GatewayLineItem],
    requested: Money,
    base: Money,
) -> CoreResult<Vec<GatewayLineItem>> {
    rescale_within(items, requested, base, usize::MAX)
}

/// [`rescale_line_items`] that never returns more than `max_lines` lines.
///
/// When splitting would overflow the cap, the residual goes to the largest
/// line whose quantity divides it instead (a single-unit line always does).
fn rescale_within(
    items: &[GatewayLineItem],
    requested: Money,
    base: Money,
    max_lines: usize,
) -> CoreResult<Vec<GatewayLineItem>> {
    if items.is_empty() {
        return Err(CoreError::precondition("no line items to rescale"));
    }

    let mut scaled = items
        .iter()
        .map(|item| {
            item.unit_price
                .scale(requested, base)
                .map(|unit_price| GatewayLineItem::new(item.name.clone(), unit_price, item.quantity))
                .ok_or_else(|| {
                    CoreError::precondition(format!("rescale base must be positive, got {}", base))
                })
        })
        .collect::<CoreResult<Vec<_>>>()?;

    let residual = requested - line_items_total(&scaled);
    if residual.is_zero() {
        return Ok(scaled);
    }

    let divides = |item: &GatewayLineItem| {
        item.quantity > 0
            && residual.units() % item.quantity == 0
            && !(item.unit_price + Money::from_units(residual.units() / item.quantity)).is_negative()
    };

    let largest = largest_line(&scaled, |_| true).unwrap_or(0);
    let target = if divides(&scaled[largest]) {
        Some(largest)
    } else if scaled.len() < max_lines {
        None
    } else {
        let fallback = largest_line(&scaled, |item| divides(item)).ok_or_else(|| {
            CoreError::precondition(format!(
                "cannot absorb a residual of {} within {} line items",
                residual, max_lines
            ))
        })?;
        Some(fallback)
    };

    match target {
        Some(idx) => {
            let line = &mut scaled[idx];
            line.unit_price += Money::from_units(residual.units() / line.quantity);
        }
        None => {
            let split_price = scaled[largest].unit_price + residual;
            if split_price.is_negative() {
                return Err(CoreError::precondition(format!(
                    "rescaled price for '{}' would be negative",
                    scaled[largest].name
                )));
            }
            scaled[largest].quantity -= 1;
            let split = GatewayLineItem::new(scaled[largest].name.clone(), split_price, 1);
            scaled.insert(largest + 1, split);
        }
    }

    Ok(scaled)
}

/// Index of the line with the largest total among those matching `keep`.
/// The first line wins ties.
fn largest_line(
    items: &[GatewayLineItem],
    keep: impl Fn(&GatewayLineItem) -> bool,
) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| keep(item))
        .fold(None, |best: Option<usize>, (idx, item)| match best {
            Some(b) if items[b].line_total() >= item.line_total() => Some(b),
            _ => Some(idx),
        })
}

/// Builds the payload for the payment aggregator.
///
/// Cart lines (plus a shipping line when shipping is charged) are rescaled so
/// they sum to the fee-absorbed total. Lines priced at zero are left out.
///
/// ## Errors
/// `PreconditionViolation` when:
/// - the total is zero (free orders skip the aggregator)
/// - more than 20 line items would be sent
/// - the submitted amount exceeds 2,000,000
pub fn build_gateway_line_items(
    lines: &[CartLine],
    pricing: &PricingResult,
    fee_rate: Rate,
) -> CoreResult<Vec<GatewayLineItem>> {
    let requested = absorb_processor_fee(pricing.total, fee_rate)?;

    if requested.units() > MAX_GATEWAY_AMOUNT {
        return Err(CoreError::precondition(format!(
            "gateway amount {} exceeds the limit of {}",
            requested,
            Money::from_units(MAX_GATEWAY_AMOUNT)
        )));
    }

    let mut items: Vec<GatewayLineItem> = lines
        .iter()
        .filter(|line| line.unit_price.is_positive())
        .map(|line| GatewayLineItem::new(line.name.clone(), line.unit_price, line.quantity))
        .collect();

    if pricing.shipping_cost.is_positive() {
        items.push(GatewayLineItem::new(SHIPPING_LINE_NAME, pricing.shipping_cost, 1));
    }

    if items.len() > MAX_GATEWAY_LINE_ITEMS {
        return Err(CoreError::precondition(format!(
            "{} line items exceed the gateway limit of {}",
            items.len(),
            MAX_GATEWAY_LINE_ITEMS
        )));
    }

    rescale_within(&items, requested, pricing.order_amount(), MAX_GATEWAY_LINE_ITEMS)
}

// =============================================================================
// Unit Tests
// =============================================================================
