//! # toyshop-services: Checkout and Reporting
//!
//! Orchestrates the pure engines of `toyshop-core` over the stores of
//! `toyshop-db` and the external collaborators (payment aggregator, email
//! provider).
//!
//! ## Module Organization
//!
//! - [`checkout`] - Cart to order to payment
//! - [`reporting`] - Financial dashboard snapshot
//! - [`gateway`] - Payment aggregator client
//! - [`email`] - Transactional email
//! - [`config`] - Store configuration (TOML + environment)
//! - [`error`] - Service error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use toyshop_db::Database;
//! use toyshop_services::{CheckoutService, HttpEmailSender, HttpPaymentGateway, StoreConfig};
//!
//! let config = StoreConfig::load(None)?;
//! let db = Database::new(config.db_config()?).await?;
//! let gateway = Arc::new(HttpPaymentGateway::from_config(&config)?);
//! let email = Arc::from(HttpEmailSender::from_config(&config)?);
//!
//! let checkout = CheckoutService::new(db, config, gateway, email);
//! let response = checkout.checkout(request).await?;
//! ```

pub mod checkout;
pub mod config;
pub mod email;
pub mod error;
pub mod gateway;
pub mod reporting;

pub use checkout::{
    CheckoutItem, CheckoutPreview, CheckoutRequest, CheckoutResponse, CheckoutService,
};
pub use config::StoreConfig;
pub use email::{DisabledEmailSender, EmailMessage, EmailSender, HttpEmailSender};
pub use error::{ServiceError, ServiceResult};
pub use gateway::{GatewayTransaction, HttpPaymentGateway, PaymentGateway, TransactionRequest};
pub use reporting::ReportingService;
