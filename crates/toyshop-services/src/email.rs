//! # Transactional Email
//!
//! Order confirmations and payment receipts. Delivery is best effort: the
//! checkout logs a failed send and carries on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use toyshop_core::{Money, Order};

use crate::config::StoreConfig;
use crate::error::{ServiceError, ServiceResult};

/// One outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Email provider.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> ServiceResult<()>;
}

/// Sender used when email is switched off: logs and drops.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEmailSender;

#[async_trait]
impl EmailSender for DisabledEmailSender {
    async fn send_email(&self, message: &EmailMessage) -> ServiceResult<()> {
        debug!(to = %message.to, subject = %message.subject, "Email disabled, dropping message");
        Ok(())
    }
}

#[derive(Serialize)]
struct SendPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// reqwest-backed email provider client.
#[derive(Debug, Clone)]
pub struct HttpEmailSender {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    sender: String,
}

impl HttpEmailSender {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        sender: impl Into<String>,
    ) -> ServiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::Email(e.to_string()))?;

        Ok(HttpEmailSender {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            sender: sender.into(),
        })
    }

    /// Builds the sender from the `[email]` section.
    ///
    /// Returns [`DisabledEmailSender`] when email is off.
    pub fn from_config(config: &StoreConfig) -> ServiceResult<Box<dyn EmailSender>> {
        if !config.email.enabled {
            return Ok(Box::new(DisabledEmailSender));
        }

        match (&config.email.base_url, &config.email.sender) {
            (Some(url), Some(sender)) => Ok(Box::new(Self::new(
                url.clone(),
                config.email.api_key.clone(),
                sender.clone(),
            )?)),
            _ => Err(ServiceError::Config(
                "email.enabled needs email.base_url and email.sender".into(),
            )),
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send_email(&self, message: &EmailMessage) -> ServiceResult<()> {
        let payload = SendPayload {
            from: &self.sender,
            to: &message.to,
            subject: &message.subject,
            html: &message.html_body,
            text: &message.text_body,
        };

        let mut builder = self
            .client
            .post(format!("{}/emails", self.base_url))
            .json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ServiceError::Email(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::Email(format!(
                "provider returned {}",
                response.status()
            )));
        }

        info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

// =============================================================================
// Templates
// =============================================================================

fn item_rows(order: &Order) -> (String, String) {
    let mut html = String::new();
    let mut text = String::new();
    for item in &order.items {
        let line = item.line_total();
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&item.product_name),
            item.quantity,
            line
        ));
        text.push_str(&format!(
            "- {} x{}: {}\n",
            item.product_name, item.quantity, line
        ));
    }
    (html, text)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn short_id(order: &Order) -> &str {
    order.id.get(..8).unwrap_or(&order.id)
}

/// Sent when an order is placed.
pub fn order_confirmation(order: &Order) -> EmailMessage {
    let (rows, lines) = item_rows(order);
    let subject = format!("Order {} received", short_id(order));

    let html_body = format!(
        "<p>Hi {name},</p><p>Thanks for your order.</p>\
         <table>{rows}</table>\
         <p>Subtotal: {subtotal}<br>Shipping: {shipping}<br>Discount: -{discount}<br>\
         <strong>Total: {total}</strong></p>\
         <p>Delivering to: {address}</p>",
        name = escape_html(&order.customer_name),
        rows = rows,
        subtotal = Money::from_units(order.subtotal),
        shipping = Money::from_units(order.shipping_cost),
        discount = Money::from_units(order.discount),
        total = order.total_amount(),
        address = escape_html(&order.shipping_address),
    );

    let text_body = format!(
        "Hi {},\n\nThanks for your order.\n\n{}\nSubtotal: {}\nShipping: {}\nDiscount: -{}\nTotal: {}\n\nDelivering to: {}\n",
        order.customer_name,
        lines,
        Money::from_units(order.subtotal),
        Money::from_units(order.shipping_cost),
        Money::from_units(order.discount),
        order.total_amount(),
        order.shipping_address,
    );

    EmailMessage {
        to: order.customer_email.clone(),
        subject,
        html_body,
        text_body,
    }
}

/// Sent when the aggregator confirms payment.
pub fn payment_received(order: &Order) -> EmailMessage {
    let subject = format!("Payment received for order {}", short_id(order));
    EmailMessage {
        to: order.customer_email.clone(),
        subject,
        html_body: format!(
            "<p>Hi {},</p><p>We received your payment of <strong>{}</strong>. \
             Your toys are being prepared.</p>",
            escape_html(&order.customer_name),
            order.total_amount()
        ),
        text_body: format!(
            "Hi {},\n\nWe received your payment of {}. Your toys are being prepared.\n",
            order.customer_name,
            order.total_amount()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use toyshop_core::{OrderItem, OrderStatus, PaymentMethod, PaymentStatus};

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: "0123456789abcdef".to_string(),
            customer_name: "Ada <Admin>".to_string(),
            customer_email: "ada@example.com".to_string(),
            shipping_address: "1 Toy Street".to_string(),
            items: vec![OrderItem {
                product_id: "robot".to_string(),
                product_name: "Robot".to_string(),
                quantity: 2,
                price: 12_000,
            }],
            subtotal: 24_000,
            shipping_cost: 0,
            discount: 2_400,
            total: 21_600,
            promo_code_id: None,
            payment_method: PaymentMethod::CashOnDelivery,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_order_confirmation() {
        let message = order_confirmation(&order());
        assert_eq!(message.to, "ada@example.com");
        assert_eq!(message.subject, "Order 01234567 received");
        assert!(message.text_body.contains("Robot x2: 24,000"));
        assert!(message.text_body.contains("Total: 21,600"));
        assert!(message.html_body.contains("Ada &lt;Admin&gt;"));
        assert!(!message.html_body.contains("<Admin>"));
    }

    #[test]
    fn test_payment_received() {
        let message = payment_received(&order());
        assert!(message.subject.starts_with("Payment received"));
        assert!(message.text_body.contains("21,600"));
    }

    #[tokio::test]
    async fn test_disabled_sender_accepts_everything() {
        let sender = HttpEmailSender::from_config(&StoreConfig::default()).unwrap();
        sender.send_email(&payment_received(&order())).await.unwrap();
    }
}
