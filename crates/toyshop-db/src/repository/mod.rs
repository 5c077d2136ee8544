//! # Repository Module
//!
//! Database repository implementations for the toyshop.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  CheckoutService / ReportingService                                    │
//! │       │                                                                 │
//! │       │  db.promo_codes().try_increment_usage(id)                      │
//! │       ▼                                                                 │
//! │  PromoCodeRepository                                                   │
//! │  ├── find_active_by_code(&self, code)                                  │
//! │  ├── insert(&self, promo)                                              │
//! │  └── try_increment_usage(&self, id)   ← guarded UPDATE ... RETURNING   │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queries are built at runtime with `sqlx::query`/`query_as` and decoded
//! through `FromRow`, so the crate builds without a live `DATABASE_URL`.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog, stock, sales
//! - [`OrderRepository`](order::OrderRepository) - Orders and their items
//! - [`PromoCodeRepository`](promo::PromoCodeRepository) - Lookup and redemption
//! - [`ExpenseRepository`](expense::ExpenseRepository) - Expense ledger

pub mod expense;
pub mod order;
pub mod product;
pub mod promo;
