//! # Store Configuration
//!
//! Configuration for checkout, payment, email and reporting.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TOYSHOP_PROCESSOR_FEE_BPS=250                                      │
//! │     TOYSHOP_GATEWAY_API_KEY=...                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/toyshop/store.toml (Linux)                               │
//! │     ~/Library/Application Support/com.toyshop.toyshop/store.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     free shipping from 10,000, flat fee 1,000, processor fee 2%       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Secrets (API keys) are never defaulted: they come from the file or the
//! environment.
//!
//! ## Configuration File Format
//! ```toml
//! # store.toml
//! [shipping]
//! free_threshold = 10000
//! flat_fee = 1000
//!
//! [payment]
//! fee_rate_bps = 200
//! base_url = "https://api.aggregator.example"
//! success_url = "https://toyshop.example/checkout/success"
//! error_url = "https://toyshop.example/checkout/error"
//! methods = ["cash_on_delivery", "mobile_money", "card"]
//!
//! [email]
//! enabled = true
//! base_url = "https://mail.example/v1"
//! sender = "orders@toyshop.example"
//!
//! [database]
//! path = "/var/lib/toyshop/toyshop.db"
//!
//! [reporting]
//! top_sellers = 5
//! low_stock = 5
//! months = 6
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use toyshop_core::validation::validate_rate_bps;
use toyshop_core::{
    Money, PaymentMethod, Rate, ReportLimits, ShippingPolicy, DEFAULT_FLAT_SHIPPING_FEE,
    DEFAULT_FREE_SHIPPING_THRESHOLD, DEFAULT_LOW_STOCK_LIMIT, DEFAULT_PROCESSOR_FEE_BPS,
    DEFAULT_REVENUE_MONTHS, DEFAULT_TOP_SELLERS_LIMIT,
};
use toyshop_db::DbConfig;

use crate::error::{ServiceError, ServiceResult};

// =============================================================================
// Shipping
// =============================================================================

/// Shipping policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingSettings {
    /// Subtotals at or above this ship for free.
    #[serde(default = "default_free_threshold")]
    pub free_threshold: i64,

    /// Flat fee below the threshold.
    #[serde(default = "default_flat_fee")]
    pub flat_fee: i64,
}

fn default_free_threshold() -> i64 {
    DEFAULT_FREE_SHIPPING_THRESHOLD
}

fn default_flat_fee() -> i64 {
    DEFAULT_FLAT_SHIPPING_FEE
}

impl Default for ShippingSettings {
    fn default() -> Self {
        ShippingSettings {
            free_threshold: default_free_threshold(),
            flat_fee: default_flat_fee(),
        }
    }
}

// =============================================================================
// Payment
// =============================================================================

/// Payment aggregator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// Aggregator fee absorbed into online payments, in basis points.
    #[serde(default = "default_fee_rate_bps")]
    pub fee_rate_bps: u32,

    /// Aggregator API base URL. Online payments are unavailable without it.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Aggregator API key.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Where the aggregator sends the shopper after paying.
    #[serde(default = "default_success_url")]
    pub success_url: String,

    /// Where the aggregator sends the shopper after a failed payment.
    #[serde(default = "default_error_url")]
    pub error_url: String,

    /// Payment methods offered at checkout.
    #[serde(default = "default_methods")]
    pub methods: Vec<PaymentMethod>,

    /// Aggregator request timeout (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_fee_rate_bps() -> u32 {
    DEFAULT_PROCESSOR_FEE_BPS
}

fn default_success_url() -> String {
    "http://localhost:3000/checkout/success".to_string()
}

fn default_error_url() -> String {
    "http://localhost:3000/checkout/error".to_string()
}

fn default_methods() -> Vec<PaymentMethod> {
    vec![
        PaymentMethod::CashOnDelivery,
        PaymentMethod::MobileMoney,
        PaymentMethod::Card,
    ]
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            fee_rate_bps: default_fee_rate_bps(),
            base_url: None,
            api_key: None,
            success_url: default_success_url(),
            error_url: default_error_url(),
            methods: default_methods(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// =============================================================================
// Email
// =============================================================================

/// Transactional email settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailSettings {
    /// Disabled emails are logged and dropped.
    #[serde(default)]
    pub enabled: bool,

    /// Provider API base URL.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Provider API key.
    #[serde(default)]
    pub api_key: Option<String>,

    /// From address.
    #[serde(default)]
    pub sender: Option<String>,
}

// =============================================================================
// Database
// =============================================================================

/// Database location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Reporting
// =============================================================================

/// Dashboard truncation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingSettings {
    #[serde(default = "default_top_sellers")]
    pub top_sellers: usize,

    #[serde(default = "default_low_stock")]
    pub low_stock: usize,

    #[serde(default = "default_months")]
    pub months: usize,
}

fn default_top_sellers() -> usize {
    DEFAULT_TOP_SELLERS_LIMIT
}
fn default_low_stock() -> usize {
    DEFAULT_LOW_STOCK_LIMIT
}
fn default_months() -> usize {
    DEFAULT_REVENUE_MONTHS
}

impl Default for ReportingSettings {
    fn default() -> Self {
        ReportingSettings {
            top_sellers: default_top_sellers(),
            low_stock: default_low_stock(),
            months: default_months(),
        }
    }
}

// =============================================================================
// Main Store Configuration
// =============================================================================

/// Complete store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub shipping: ShippingSettings,

    #[serde(default)]
    pub payment: PaymentSettings,

    #[serde(default)]
    pub email: EmailSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub reporting: ReportingSettings,
}

impl StoreConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (store.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ServiceResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading store config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load store config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ServiceResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ServiceError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Store config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.shipping.free_threshold < 0 || self.shipping.flat_fee < 0 {
            return Err(ServiceError::Config(
                "shipping threshold and fee must not be negative".into(),
            ));
        }

        validate_rate_bps("payment.fee_rate_bps", self.payment.fee_rate_bps)
            .map_err(|e| ServiceError::Config(e.to_string()))?;

        if self.payment.methods.is_empty() {
            return Err(ServiceError::Config(
                "at least one payment method must be enabled".into(),
            ));
        }

        for url in [&self.payment.base_url, &self.email.base_url]
            .into_iter()
            .flatten()
        {
            check_http_url(url)?;
        }
        check_http_url(&self.payment.success_url)?;
        check_http_url(&self.payment.error_url)?;

        if self.email.enabled && (self.email.base_url.is_none() || self.email.sender.is_none()) {
            return Err(ServiceError::Config(
                "email.enabled needs email.base_url and email.sender".into(),
            ));
        }

        if self.reporting.months == 0 {
            return Err(ServiceError::Config(
                "reporting.months must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `TOYSHOP_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TOYSHOP_FREE_SHIPPING_THRESHOLD") {
            match v.parse() {
                Ok(units) => self.shipping.free_threshold = units,
                Err(_) => warn!(value = %v, "Ignoring invalid TOYSHOP_FREE_SHIPPING_THRESHOLD"),
            }
        }

        if let Some(v) = lookup("TOYSHOP_FLAT_SHIPPING_FEE") {
            match v.parse() {
                Ok(units) => self.shipping.flat_fee = units,
                Err(_) => warn!(value = %v, "Ignoring invalid TOYSHOP_FLAT_SHIPPING_FEE"),
            }
        }

        if let Some(v) = lookup("TOYSHOP_PROCESSOR_FEE_BPS") {
            match v.parse() {
                Ok(bps) => {
                    debug!(bps, "Overriding processor fee from environment");
                    self.payment.fee_rate_bps = bps;
                }
                Err(_) => warn!(value = %v, "Ignoring invalid TOYSHOP_PROCESSOR_FEE_BPS"),
            }
        }

        if let Some(url) = lookup("TOYSHOP_GATEWAY_URL") {
            debug!(url = %url, "Overriding gateway URL from environment");
            self.payment.base_url = Some(url);
        }

        if let Some(key) = lookup("TOYSHOP_GATEWAY_API_KEY") {
            self.payment.api_key = Some(key);
        }

        if let Some(url) = lookup("TOYSHOP_EMAIL_URL") {
            self.email.base_url = Some(url);
        }

        if let Some(key) = lookup("TOYSHOP_EMAIL_API_KEY") {
            self.email.api_key = Some(key);
        }

        if let Some(sender) = lookup("TOYSHOP_EMAIL_FROM") {
            self.email.sender = Some(sender);
        }

        if let Some(v) = lookup("TOYSHOP_EMAIL_ENABLED") {
            self.email.enabled = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Some(path) = lookup("TOYSHOP_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "toyshop", "toyshop")
            .map(|dirs| dirs.config_dir().join("store.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Shipping policy for the pricing engine.
    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy::new(
            Money::from_units(self.shipping.free_threshold),
            Money::from_units(self.shipping.flat_fee),
        )
    }

    /// Aggregator fee rate.
    pub fn fee_rate(&self) -> Rate {
        Rate::from_bps(self.payment.fee_rate_bps)
    }

    /// Report truncation limits.
    pub fn report_limits(&self) -> ReportLimits {
        ReportLimits {
            top_sellers: self.reporting.top_sellers,
            low_stock: self.reporting.low_stock,
            months: self.reporting.months,
        }
    }

    /// Configured database file, or `toyshop.db` in the platform data
    /// directory.
    pub fn database_path(&self) -> ServiceResult<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        directories::ProjectDirs::from("com", "toyshop", "toyshop")
            .map(|dirs| dirs.data_dir().join("toyshop.db"))
            .ok_or_else(|| ServiceError::Config("No data directory available".into()))
    }

    /// Database pool configuration.
    pub fn db_config(&self) -> ServiceResult<DbConfig> {
        Ok(DbConfig::new(self.database_path()?))
    }

    /// True if the method is offered at checkout.
    pub fn accepts(&self, method: PaymentMethod) -> bool {
        self.payment.methods.contains(&method)
    }
}

fn check_http_url(url: &str) -> ServiceResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ServiceError::Config(format!(
            "URL must start with http:// or https://, got: {}",
            url
        )))
    }
}
