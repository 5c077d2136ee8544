//! # toyshop-core: Pure Business Logic for the Toyshop
//!
//! This crate is the **heart** of the toyshop. It contains the checkout
//! pricing engine and the back-office financial engine as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Toyshop Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Storefront  /  Back-office (frontend)              │   │
//! │  │    Catalog ──► Cart ──► Checkout ──► Payment    Dashboard       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    toyshop-services                             │   │
//! │  │    CheckoutService, ReportingService, gateway, email            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ toyshop-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  money  │ │ pricing │ │  promo  │ │ finance │ │validate │  │   │
//! │  │   │  Money  │ │ totals  │ │  codes  │ │  stats  │ │  rules  │  │   │
//! │  │   │  Rate   │ │ fees    │ │  reasons│ │  roll-up│ │         │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  toyshop-db (Database Layer)                    │   │
//! │  │       SQLite stores, migrations, guarded atomic counters        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (CartLine, PromoCode, Order, Product, Expense)
//! - [`money`] - Money type over whole currency units
//! - [`pricing`] - Subtotal, shipping, total, fee absorption, gateway items
//! - [`promo`] - Promo-code validation
//! - [`finance`] - Revenue, profit, rankings and breakdowns
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input, same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: amounts are whole units (i64), rates are basis points
//! 4. **Explicit Errors**: typed errors for failures, typed reasons for
//!    promo rejections
//!
//! ## Example Usage
//!
//! ```rust
//! use toyshop_core::money::Money;
//! use toyshop_core::pricing::{price_cart, ShippingPolicy};
//! use toyshop_core::types::CartLine;
//!
//! let cart = vec![
//!     CartLine::new("castle", "Castle", Money::from_units(15_000), 1, "building"),
//!     CartLine::new("robot", "Robot", Money::from_units(12_000), 2, "robots"),
//! ];
//!
//! let pricing = price_cart(&cart, &ShippingPolicy::default(), Money::from_units(3_900)).unwrap();
//! assert_eq!(pricing.total.units(), 35_100);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod finance;
pub mod money;
pub mod pricing;
pub mod promo;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use toyshop_core::Money` instead of
// `use toyshop_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use finance::{FinancialStats, ReportLimits};
pub use money::Money;
pub use pricing::{GatewayLineItem, PricingResult, ShippingPolicy};
pub use promo::{PromoRejection, PromoValidation};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single product in a cart
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Subtotal from which shipping is free, unless configured otherwise
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: i64 = 10_000;

/// Flat shipping fee below the free threshold, unless configured otherwise
pub const DEFAULT_FLAT_SHIPPING_FEE: i64 = 1_000;

/// Payment aggregator fee in basis points (2%)
pub const DEFAULT_PROCESSOR_FEE_BPS: u32 = 200;

/// Payment aggregator: most line items per transaction
pub const MAX_GATEWAY_LINE_ITEMS: usize = 20;

/// Payment aggregator: largest amount per transaction
pub const MAX_GATEWAY_AMOUNT: i64 = 2_000_000;

/// Dashboard list sizes
pub const DEFAULT_TOP_SELLERS_LIMIT: usize = 5;
pub const DEFAULT_LOW_STOCK_LIMIT: usize = 5;
pub const DEFAULT_REVENUE_MONTHS: usize = 6;
