//! # Domain Types
//!
//! Core domain types shared by the storefront and the back-office.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    CartLine     │   │   PromoCode     │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  unit_price     │   │  code           │   │  items[]        │       │
//! │  │  quantity       │   │  discount_type  │   │  total          │       │
//! │  │  (ephemeral)    │   │  usage_count    │   │  status         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Expense      │   │      Rate       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  price          │   │  category       │   │  bps (u32)      │       │
//! │  │  cost_price     │   │  amount         │   │  200 = 2%       │       │
//! │  │  stock_quantity │   │  expense_date   │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stored records keep amounts as plain `i64` columns and expose `Money`
//! through accessors; engine inputs such as [`CartLine`] carry `Money`
//! directly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Rate
// =============================================================================

/// A rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1000 bps = 10%, 200 bps = 2% (aggregator fee)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// A line in the shopper's cart.
///
/// Ephemeral: created when a shopper adds a product, gone once the order is
/// placed or the line is removed. The unit price is frozen at add time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    /// Product ID this line refers to.
    pub id: String,
    /// Product name at time of adding (frozen).
    pub name: String,
    /// Unit price at time of adding (frozen).
    pub unit_price: Money,
    /// Quantity, at least 1.
    pub quantity: i64,
    /// Catalog category (display only).
    pub category: String,
}

impl CartLine {
    /// Creates a cart line.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: i64,
        category: impl Into<String>,
    ) -> Self {
        CartLine {
            id: id.into(),
            name: name.into(),
            unit_price,
            quantity,
            category: category.into(),
        }
    }

    /// Creates a cart line from a catalog product.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine::new(
            product.id.clone(),
            product.name.clone(),
            product.price(),
            quantity,
            product.category.clone(),
        )
    }

    /// Line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Promo Code
// =============================================================================

/// How a promo code computes its discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` is a percentage of the order amount.
    Percentage,
    /// `discount_value` is a fixed number of currency units.
    Fixed,
}

/// An administrator-defined discount token.
///
/// ## Invariants (checked at creation by `promo::validate_new_promo_code`)
/// - `usage_count <= usage_limit` when a limit is set
/// - `discount_value <= 100` for percentage codes
/// - `usage_count` only ever increases, at most once per completed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PromoCode {
    pub id: String,
    /// Case-insensitive, unique. Stored upper-case.
    pub code: String,
    pub discount_type: DiscountType,
    /// Percentage points or whole units depending on `discount_type`.
    pub discount_value: f64,
    pub min_order_amount: i64,
    pub max_discount: Option<i64>,
    pub usage_limit: Option<i64>,
    pub usage_count: i64,
    #[ts(as = "String")]
    pub starts_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl PromoCode {
    /// Minimum order amount as Money.
    #[inline]
    pub fn min_order(&self) -> Money {
        Money::from_units(self.min_order_amount)
    }

    /// Discount cap as Money, if any.
    #[inline]
    pub fn max_discount_amount(&self) -> Option<Money> {
        self.max_discount.map(Money::from_units)
    }

    /// True once the usage limit (if any) has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .map(|limit| self.usage_count >= limit)
            .unwrap_or(false)
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment status of an order.
///
/// ## Transitions
/// ```text
/// Pending ──► Confirmed ──► Shipped ──► Delivered
///    │            │            │
///    └────────────┴────────────┴──────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether the order may move from `self` to `next`.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Confirmed) | (Confirmed, Shipped) | (Shipped, Delivered) => true,
            (Pending | Confirmed | Shipped, Cancelled) => true,
            _ => false,
        }
    }

    /// Delivered and cancelled orders never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Payment Status / Method
// =============================================================================

/// Settlement status of an order's payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Done,
    Failed,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid in cash to the courier. Never goes through the aggregator.
    CashOnDelivery,
    /// Mobile money wallet via the payment aggregator.
    MobileMoney,
    /// Card via the payment aggregator.
    Card,
}

impl PaymentMethod {
    /// Online methods go through the aggregator and need fee absorption.
    pub fn uses_gateway(self) -> bool {
        match self {
            PaymentMethod::CashOnDelivery => false,
            PaymentMethod::MobileMoney | PaymentMethod::Card => true,
        }
    }

    /// Identifier the payment aggregator expects.
    pub fn gateway_code(self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Card => "card",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" | "cash_on_delivery" | "cod" => Ok(PaymentMethod::CashOnDelivery),
            "mobile_money" | "momo" => Ok(PaymentMethod::MobileMoney),
            "card" => Ok(PaymentMethod::Card),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A line of a placed order. Snapshot of the product at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub product_id: String,
    /// Product name at time of order (frozen).
    pub product_name: String,
    pub quantity: i64,
    /// Unit price at time of order (frozen).
    pub price: i64,
}

impl OrderItem {
    /// Line revenue (quantity × price).
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_units(self.price).multiply_quantity(self.quantity)
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: String,
    pub items: Vec<OrderItem>,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub discount: i64,
    /// Amount the customer pays.
    pub total: i64,
    pub promo_code_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Payment aggregator transaction, once created.
    pub transaction_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Order total as Money.
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_units(self.total)
    }

    /// Counted as revenue once delivered or paid.
    pub fn is_recognized_revenue(&self) -> bool {
        self.status == OrderStatus::Delivered || self.payment_status == PaymentStatus::Done
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Selling price.
    pub price: i64,
    /// Purchase cost (for profitability).
    pub cost_price: i64,
    pub stock_quantity: i64,
    /// Alert once stock falls to this level or below.
    pub min_stock_alert: i64,
    /// Units sold over the product's lifetime.
    pub total_sold: i64,
    /// Whether product is listed (soft delete).
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_units(self.price)
    }

    /// Returns the cost price as Money.
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_units(self.cost_price)
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock_alert
    }

    /// Checks if there is enough stock to sell `quantity` units.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && self.stock_quantity >= quantity
    }
}

// =============================================================================
// Expense
// =============================================================================

/// Expense bucket used by the financial reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Stock,
    Marketing,
    Transport,
    Other,
}

impl ExpenseCategory {
    /// All categories, in report order.
    pub const ALL: [ExpenseCategory; 4] = [
        ExpenseCategory::Stock,
        ExpenseCategory::Marketing,
        ExpenseCategory::Transport,
        ExpenseCategory::Other,
    ];
}

impl FromStr for ExpenseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stock" => Ok(ExpenseCategory::Stock),
            "marketing" => Ok(ExpenseCategory::Marketing),
            "transport" => Ok(ExpenseCategory::Transport),
            "other" => Ok(ExpenseCategory::Other),
            other => Err(format!("unknown expense category: {}", other)),
        }
    }
}

/// A recorded business expense. Deleted outright, never soft-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Expense {
    pub id: String,
    /// Product this expense relates to (e.g. a restock).
    pub product_id: Option<String>,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: i64,
    pub quantity: Option<i64>,
    #[ts(as = "String")]
    pub expense_date: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// Returns the amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_units(self.amount)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
