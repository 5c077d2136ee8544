//! # Payment Aggregator Client
//!
//! Creates hosted-checkout transactions for online payments.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CheckoutService                                                       │
//! │       │  build_gateway_line_items(lines, pricing, fee_rate)            │
//! │       ▼                                                                 │
//! │  TransactionRequest { items (sum = fee-absorbed total), urls, methods }│
//! │       │                                                                 │
//! │       │  POST {base_url}/transactions   (Bearer api_key)               │
//! │       ▼                                                                 │
//! │  GatewayTransaction { transaction_id, checkout_url }                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Shopper is redirected to checkout_url; the aggregator later calls     │
//! │  back and CheckoutService::confirm_payment settles the order.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use toyshop_core::pricing::line_items_total;
use toyshop_core::{GatewayLineItem, Money};

use crate::config::StoreConfig;
use crate::error::{ServiceError, ServiceResult};

/// What is sent to the aggregator for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Our order ID, echoed back by the aggregator.
    pub reference: String,
    pub items: Vec<GatewayLineItem>,
    /// Sum of the items.
    pub amount: Money,
    pub success_url: String,
    pub error_url: String,
    /// Aggregator method codes the shopper may pay with.
    pub methods: Vec<String>,
}

impl TransactionRequest {
    pub fn new(
        reference: impl Into<String>,
        items: Vec<GatewayLineItem>,
        success_url: impl Into<String>,
        error_url: impl Into<String>,
        methods: Vec<String>,
    ) -> Self {
        let amount = line_items_total(&items);
        TransactionRequest {
            reference: reference.into(),
            items,
            amount,
            success_url: success_url.into(),
            error_url: error_url.into(),
            methods,
        }
    }
}

/// A transaction created by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTransaction {
    pub transaction_id: String,
    pub checkout_url: String,
}

/// Payment aggregator.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a transaction and returns where to send the shopper.
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> ServiceResult<GatewayTransaction>;
}

/// reqwest-backed aggregator client.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPaymentGateway {
    /// Creates a client with a request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> ServiceResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpPaymentGateway {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Creates a client from the `[payment]` section.
    ///
    /// ## Errors
    /// `Config` when no aggregator URL is configured.
    pub fn from_config(config: &StoreConfig) -> ServiceResult<Self> {
        let base_url = config
            .payment
            .base_url
            .clone()
            .ok_or_else(|| ServiceError::Config("payment.base_url is not set".into()))?;

        if config.payment.api_key.is_none() {
            warn!("Payment aggregator configured without an API key");
        }

        Self::new(
            base_url,
            config.payment.api_key.clone(),
            Duration::from_secs(config.payment.timeout_secs),
        )
    }

    fn transactions_url(&self) -> String {
        format!("{}/transactions", self.base_url)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> ServiceResult<GatewayTransaction> {
        debug!(
            reference = %request.reference,
            items = request.items.len(),
            amount = %request.amount,
            "Creating aggregator transaction"
        );

        let mut builder = self.client.post(self.transactions_url()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Gateway(format!(
                "aggregator returned {}: {}",
                status, body
            )));
        }

        let transaction: GatewayTransaction = response.json().await?;
        if transaction.transaction_id.is_empty() || transaction.checkout_url.is_empty() {
            return Err(ServiceError::Gateway(
                "aggregator response is missing the transaction id or checkout url".into(),
            ));
        }

        info!(
            reference = %request.reference,
            transaction_id = %transaction.transaction_id,
            "Aggregator transaction created"
        );
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_amount_is_sum_of_items() {
        let items = vec![
            GatewayLineItem::new("Castle", Money::from_units(14_700), 1),
            GatewayLineItem::new("Robot", Money::from_units(11_765), 2),
        ];
        let request = TransactionRequest::new(
            "order-1",
            items,
            "https://shop/ok",
            "https://shop/ko",
            vec!["card".to_string()],
        );
        assert_eq!(request.amount.units(), 38_230);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["reference"], "order-1");
        assert_eq!(json["amount"], 38_230);
        assert_eq!(json["items"][1]["quantity"], 2);
    }

    #[test]
    fn test_from_config_requires_url() {
        let mut config = StoreConfig::default();
        assert!(matches!(
            HttpPaymentGateway::from_config(&config),
            Err(ServiceError::Config(_))
        ));

        config.payment.base_url = Some("https://aggregator.example/api/".to_string());
        let gateway = HttpPaymentGateway::from_config(&config).unwrap();
        assert_eq!(
            gateway.transactions_url(),
            "https://aggregator.example/api/transactions"
        );
    }

    #[test]
    fn test_transaction_response_decoding() {
        let body = r#"{"transaction_id":"tx-42","checkout_url":"https://pay/tx-42","extra":1}"#;
        let tx: GatewayTransaction = serde_json::from_str(body).unwrap();
        assert_eq!(tx.transaction_id, "tx-42");
        assert_eq!(tx.checkout_url, "https://pay/tx-42");
    }
}
