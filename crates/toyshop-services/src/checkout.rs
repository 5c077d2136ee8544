//! # Checkout Service
//!
//! Turns a cart into a persisted order and, for online payments, an
//! aggregator transaction.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. validate customer + cart      (ValidationError, nothing written)   │
//! │  2. subtotal + shipping           (configured ShippingPolicy)          │
//! │  3. promo lookup + validation     (Promo(reason), nothing written)     │
//! │  4. price cart, persist order     (pending / pending, one transaction) │
//! │  5. redeem promo atomically       (lost race → order cancelled)        │
//! │  6. record sales                  (guarded stock decrement)            │
//! │  7. settle                                                             │
//! │     ├── cash on delivery  → confirmed, email                           │
//! │     ├── total 0           → paid, confirmed, email (no aggregator)     │
//! │     └── online            → aggregator transaction, checkout URL       │
//! │  8. confirm_payment       → paid + confirmed, or failed + cancelled    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An order abandoned after step 5 (stock ran out, aggregator down, payment
//! declined) is cancelled and hands its promo use and its stock back, so a
//! code's usage count only reflects orders that went through. A payment
//! marked done is final: later failure callbacks are ignored.
//!
//! Gateway line items are built before anything is written, so an order the
//! aggregator would refuse (too many lines, amount over the limit) never
//! reaches the database.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use toyshop_core::pricing::{build_gateway_line_items, compute_subtotal, price_cart};
use toyshop_core::promo::validate_promo_code;
use toyshop_core::validation::{
    validate_cart, validate_customer_email, validate_customer_name, validate_shipping_address,
};
use toyshop_core::{
    CartLine, CoreError, GatewayLineItem, Order, OrderItem, OrderStatus, PaymentMethod,
    PaymentStatus, PricingResult, PromoRejection, PromoValidation, ValidationError,
};
use toyshop_db::repository::order::generate_order_id;
use toyshop_db::{Database, DbError};

use crate::config::StoreConfig;
use crate::email::{order_confirmation, payment_received, EmailMessage, EmailSender};
use crate::error::{ServiceError, ServiceResult};
use crate::gateway::{PaymentGateway, TransactionRequest};

// =============================================================================
// Requests and Responses
// =============================================================================

/// One cart entry as sent by the storefront. Prices come from the catalog,
/// never from the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: String,
    pub quantity: i64,
}

impl CheckoutItem {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        CheckoutItem {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Everything the checkout form submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: String,
    pub items: Vec<CheckoutItem>,
    #[serde(default)]
    pub promo_code: Option<String>,
    pub payment_method: PaymentMethod,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub pricing: PricingResult,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Aggregator page to redirect the shopper to (online payments only).
    pub checkout_url: Option<String>,
    pub transaction_id: Option<String>,
}

/// Cart totals shown before the shopper commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutPreview {
    pub pricing: PricingResult,
    /// Outcome for the entered promo code, if any. An invalid code prices
    /// the cart without a discount.
    pub promo: Option<PromoValidation>,
}

// =============================================================================
// Checkout Service
// =============================================================================

/// Orchestrates checkout over the stores and the external collaborators.
pub struct CheckoutService {
    db: Database,
    config: StoreConfig,
    gateway: Arc<dyn PaymentGateway>,
    email: Arc<dyn EmailSender>,
}

impl CheckoutService {
    pub fn new(
        db: Database,
        config: StoreConfig,
        gateway: Arc<dyn PaymentGateway>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        CheckoutService {
            db,
            config,
            gateway,
            email,
        }
    }

    /// Prices a cart (with an optional promo code) without writing anything.
    pub async fn preview(
        &self,
        items: &[CheckoutItem],
        promo_code: Option<&str>,
    ) -> ServiceResult<CheckoutPreview> {
        let lines = self.load_cart(items).await?;
        validate_cart(&lines)?;

        let promo = match promo_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(self.validate_promo(code, &lines).await?),
            None => None,
        };
        let discount = promo.as_ref().map(PromoValidation::discount).unwrap_or_default();

        let pricing = price_cart(&lines, &self.config.shipping_policy(), discount)?;
        Ok(CheckoutPreview { pricing, promo })
    }

    /// Places an order. See the module docs for the steps.
    ///
    /// ## Errors
    /// * `Validation` - Bad customer data, empty or malformed cart,
    ///   payment method not offered
    /// * `UnknownProduct` - Cart references an unlisted product
    /// * `Promo(reason)` - Code refused, or its last use went to someone else
    /// * `Domain(InsufficientStock)` - Not enough stock
    /// * `Precondition` - Order exceeds the aggregator's limits
    /// * `Gateway` - Aggregator unreachable (order cancelled, payment failed)
    pub async fn checkout(&self, request: CheckoutRequest) -> ServiceResult<CheckoutResponse> {
        // 1. Validate
        validate_customer_name(&request.customer_name)?;
        validate_customer_email(&request.customer_email)?;
        validate_shipping_address(&request.shipping_address)?;
        if !self.config.accepts(request.payment_method) {
            return Err(ValidationError::InvalidFormat {
                field: "payment_method".to_string(),
                reason: format!("{} is not offered", request.payment_method.gateway_code()),
            }
            .into());
        }

        let lines = self.load_cart(&request.items).await?;
        validate_cart(&lines)?;
        self.check_stock(&lines).await?;

        // 2-3. Promo against subtotal + shipping
        let validation = match request
            .promo_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            Some(code) => {
                let validation = self.validate_promo(code, &lines).await?;
                if let Some(reason) = validation.rejection() {
                    info!(code = %code, reason = ?reason, "Promo code rejected at checkout");
                    return Err(ServiceError::Promo(reason));
                }
                Some(validation)
            }
            None => None,
        };
        let discount = validation
            .as_ref()
            .map(PromoValidation::discount)
            .unwrap_or_default();
        let promo_id = validation
            .as_ref()
            .and_then(PromoValidation::promo_id)
            .map(str::to_string);

        // 4. Price and persist
        let pricing = price_cart(&lines, &self.config.shipping_policy(), discount)?;
        let online = request.payment_method.uses_gateway() && pricing.total.is_positive();
        let gateway_items = if online {
            Some(build_gateway_line_items(&lines, &pricing, self.config.fee_rate())?)
        } else {
            None
        };

        let order = build_order(&request, &lines, &pricing, promo_id.clone());
        self.db.orders().insert(&order).await?;
        info!(
            order_id = %order.id,
            total = %pricing.total,
            method = ?request.payment_method,
            "Order placed"
        );

        // 5. Redeem the promo; the validation above was advisory
        if let Some(promo_id) = &promo_id {
            if let Err(err) = self.db.promo_codes().try_increment_usage(promo_id).await {
                self.cancel_quietly(&order.id).await;
                return Err(match err {
                    DbError::PromoLimitReached { .. } => {
                        ServiceError::Promo(PromoRejection::LimitReached)
                    }
                    DbError::NotFound { .. } => ServiceError::Promo(PromoRejection::NotFound),
                    other => other.into(),
                });
            }
        }

        // 6. Stock
        if let Err(err) = self.db.products().record_sales(&sold_quantities(&order)).await {
            self.abandon_quietly(&order, false).await;
            return Err(self.stock_error(err).await);
        }

        // 7. Settle
        let response = match gateway_items {
            None => self.settle_offline(&order, pricing).await?,
            Some(items) => self.settle_online(&order, pricing, items).await?,
        };

        self.notify(order_confirmation(&order)).await;
        Ok(response)
    }

    /// Applies the aggregator's verdict on an order's payment.
    ///
    /// Success marks the payment done and confirms a pending order. Failure
    /// marks the payment failed and, for an order still pending, cancels it
    /// and returns its stock and promo use. Repeated callbacks are no-ops, and
    /// a failure never overrides a payment that is already done. Returns the
    /// updated order.
    ///
    /// ## Errors
    /// * `Precondition` - Success reported for an order already cancelled
    pub async fn confirm_payment(&self, order_id: &str, success: bool) -> ServiceResult<Order> {
        let order = self
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        if success {
            if order.status == OrderStatus::Cancelled {
                warn!(order_id = %order_id, "Payment confirmed for a cancelled order");
                return Err(ServiceError::Precondition(format!(
                    "order {} was cancelled before its payment was confirmed",
                    order_id
                )));
            }
            if order.payment_status != PaymentStatus::Done {
                self.db
                    .orders()
                    .update_payment_status(order_id, PaymentStatus::Done)
                    .await?;
            }
            if order.status == OrderStatus::Pending {
                self.db
                    .orders()
                    .update_status(order_id, OrderStatus::Confirmed)
                    .await?;
            }
            info!(order_id = %order_id, "Payment confirmed");
        } else {
            if order.payment_status == PaymentStatus::Done {
                warn!(order_id = %order_id, "Ignoring failure reported for a paid order");
                return Ok(order);
            }
            if order.payment_status == PaymentStatus::Failed && order.status.is_terminal() {
                debug!(order_id = %order_id, "Payment failure already applied");
                return Ok(order);
            }

            self.db
                .orders()
                .update_payment_status(order_id, PaymentStatus::Failed)
                .await?;
            if order.status == OrderStatus::Pending {
                self.abandon(&order, true).await?;
            }
            warn!(order_id = %order_id, "Payment failed");
        }

        let updated = self
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        if success && order.payment_status != PaymentStatus::Done {
            self.notify(payment_received(&updated)).await;
        }

        Ok(updated)
    }

    /// Same as [`confirm_payment`](Self::confirm_payment), keyed by the
    /// aggregator transaction the callback reports.
    pub async fn confirm_transaction(
        &self,
        transaction_id: &str,
        success: bool,
    ) -> ServiceResult<Order> {
        let order = self
            .db
            .orders()
            .find_by_transaction_id(transaction_id)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", transaction_id))?;

        self.confirm_payment(&order.id, success).await
    }

    // =========================================================================
    // Steps
    // =========================================================================

    /// Resolves cart entries against the catalog.
    async fn load_cart(&self, items: &[CheckoutItem]) -> ServiceResult<Vec<CartLine>> {
        if items.is_empty() {
            return Err(ValidationError::Required {
                field: "cart".to_string(),
            }
            .into());
        }

        let products = self.db.products();
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = products
                .get_by_id(&item.product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| ServiceError::UnknownProduct(item.product_id.clone()))?;
            lines.push(CartLine::from_product(&product, item.quantity));
        }

        debug!(lines = lines.len(), subtotal = %compute_subtotal(&lines), "Cart loaded");
        Ok(lines)
    }

    /// Early stock check so a short cart fails before anything is written.
    ///
    /// `validate_cart` has already refused repeated products, so each line is
    /// the whole demand for its product.
    async fn check_stock(&self, lines: &[CartLine]) -> ServiceResult<()> {
        let products = self.db.products();
        for line in lines {
            if let Some(product) = products.get_by_id(&line.id).await? {
                if !product.can_sell(line.quantity) {
                    return Err(ServiceError::Domain(CoreError::InsufficientStock {
                        product_id: product.id,
                        available: product.stock_quantity,
                        requested: line.quantity,
                    }));
                }
            }
        }
        Ok(())
    }

    async fn validate_promo(&self, code: &str, lines: &[CartLine]) -> ServiceResult<PromoValidation> {
        let subtotal = compute_subtotal(lines);
        let order_amount = subtotal + self.config.shipping_policy().shipping_for(subtotal);
        let candidate = self.db.promo_codes().find_active_by_code(code).await?;

        let validation = validate_promo_code(code, candidate.as_ref(), order_amount, Utc::now());
        debug!(code = %code, valid = validation.is_valid(), "Promo code validated");
        Ok(validation)
    }

    async fn settle_offline(
        &self,
        order: &Order,
        pricing: PricingResult,
    ) -> ServiceResult<CheckoutResponse> {
        let orders = self.db.orders();
        let mut payment_status = PaymentStatus::Pending;

        if pricing.total.is_zero() {
            orders
                .update_payment_status(&order.id, PaymentStatus::Done)
                .await?;
            payment_status = PaymentStatus::Done;
            info!(order_id = %order.id, "Free order, aggregator skipped");
        }
        orders.update_status(&order.id, OrderStatus::Confirmed).await?;

        Ok(CheckoutResponse {
            order_id: order.id.clone(),
            pricing,
            status: OrderStatus::Confirmed,
            payment_status,
            checkout_url: None,
            transaction_id: None,
        })
    }

    async fn settle_online(
        &self,
        order: &Order,
        pricing: PricingResult,
        items: Vec<GatewayLineItem>,
    ) -> ServiceResult<CheckoutResponse> {
        let request = TransactionRequest::new(
            order.id.clone(),
            items,
            self.config.payment.success_url.clone(),
            self.config.payment.error_url.clone(),
            vec![order.payment_method.gateway_code().to_string()],
        );

        let transaction = match self.gateway.create_transaction(&request).await {
            Ok(transaction) => transaction,
            Err(err) => {
                warn!(order_id = %order.id, error = %err, "Aggregator transaction failed");
                if let Err(e) = self
                    .db
                    .orders()
                    .update_payment_status(&order.id, PaymentStatus::Failed)
                    .await
                {
                    warn!(order_id = %order.id, error = %e, "Could not mark payment failed");
                }
                self.abandon_quietly(order, true).await;
                return Err(err);
            }
        };

        self.db
            .orders()
            .set_transaction_id(&order.id, &transaction.transaction_id)
            .await?;

        Ok(CheckoutResponse {
            order_id: order.id.clone(),
            pricing,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            checkout_url: Some(transaction.checkout_url),
            transaction_id: Some(transaction.transaction_id),
        })
    }

    /// Maps a failed stock write to the shopper-facing error.
    async fn stock_error(&self, err: DbError) -> ServiceError {
        match err {
            DbError::InsufficientStock {
                product_id,
                requested,
            } => {
                let available = match self.db.products().get_by_id(&product_id).await {
                    Ok(Some(product)) => product.stock_quantity,
                    _ => 0,
                };
                debug!(product_id = %product_id, available, "Stock ran out during checkout");

                ServiceError::Domain(CoreError::InsufficientStock {
                    product_id,
                    available,
                    requested,
                })
            }
            other => other.into(),
        }
    }

    /// Cancels a pending order and gives back what checkout consumed: the
    /// promo use always, the stock when `stock_recorded`.
    ///
    /// The guarded cancel comes first, so of two callers racing on the same
    /// order only one gets to release anything.
    async fn abandon(&self, order: &Order, stock_recorded: bool) -> ServiceResult<()> {
        self.db
            .orders()
            .update_status(&order.id, OrderStatus::Cancelled)
            .await?;

        if stock_recorded {
            self.db.products().restore_sales(&sold_quantities(order)).await?;
        }
        if let Some(promo_id) = &order.promo_code_id {
            self.db.promo_codes().release_usage(promo_id).await?;
        }

        info!(order_id = %order.id, stock_recorded, "Order abandoned");
        Ok(())
    }

    async fn abandon_quietly(&self, order: &Order, stock_recorded: bool) {
        if let Err(err) = self.abandon(order, stock_recorded).await {
            warn!(order_id = %order.id, error = %err, "Could not unwind abandoned order");
        }
    }

    async fn cancel_quietly(&self, order_id: &str) {
        if let Err(err) = self
            .db
            .orders()
            .update_status(order_id, OrderStatus::Cancelled)
            .await
        {
            warn!(order_id = %order_id, error = %err, "Could not cancel order");
        }
    }

    /// Sends an email; failures are logged and never fail the caller.
    async fn notify(&self, message: EmailMessage) {
        if let Err(err) = self.email.send_email(&message).await {
            warn!(to = %message.to, subject = %message.subject, error = %err, "Email not sent");
        }
    }
}

/// `(product_id, quantity)` per order line, as the stock store takes them.
fn sold_quantities(order: &Order) -> Vec<(String, i64)> {
    order
        .items
        .iter()
        .map(|item| (item.product_id.clone(), item.quantity))
        .collect()
}

fn build_order(
    request: &CheckoutRequest,
    lines: &[CartLine],
    pricing: &PricingResult,
    promo_code_id: Option<String>,
) -> Order {
    let now = Utc::now();
    Order {
        id: generate_order_id(),
        customer_name: request.customer_name.trim().to_string(),
        customer_email: request.customer_email.trim().to_string(),
        shipping_address: request.shipping_address.trim().to_string(),
        items: lines
            .iter()
            .map(|line| OrderItem {
                product_id: line.id.clone(),
                product_name: line.name.clone(),
                quantity: line.quantity,
                price: line.unit_price.units(),
            })
            .collect(),
        subtotal: pricing.subtotal.units(),
        shipping_cost: pricing.shipping_cost.units(),
        discount: pricing.discount.units(),
        total: pricing.total.units(),
        promo_code_id,
        payment_method: request.payment_method,
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        transaction_id: None,
        created_at: now,
        updated_at: now,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayTransaction;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;
    use toyshop_core::pricing::{absorb_processor_fee, line_items_total};
    use toyshop_core::{DiscountType, Money, Product, PromoCode};
    use toyshop_db::repository::product::generate_product_id;
    use toyshop_db::repository::promo::new_promo_code;
    use toyshop_db::DbConfig;

    #[derive(Default)]
    struct FakeGateway {
        requests: Mutex<Vec<TransactionRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_transaction(
            &self,
            request: &TransactionRequest,
        ) -> ServiceResult<GatewayTransaction> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(ServiceError::Gateway("connection refused".into()));
            }
            Ok(GatewayTransaction {
                transaction_id: format!("tx-{}", request.reference),
                checkout_url: format!("https://pay.example/{}", request.reference),
            })
        }
    }

    #[derive(Default)]
    struct FakeEmail {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl EmailSender for FakeEmail {
        async fn send_email(&self, message: &EmailMessage) -> ServiceResult<()> {
            if self.fail {
                return Err(ServiceError::Email("provider down".into()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct Shop {
        service: CheckoutService,
        db: Database,
        gateway: Arc<FakeGateway>,
        email: Arc<FakeEmail>,
        castle: Product,
        robot: Product,
    }

    fn toy(name: &str, price: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: generate_product_id(),
            name: name.to_string(),
            category: "toys".to_string(),
            price,
            cost_price: price / 2,
            stock_quantity: stock,
            min_stock_alert: 1,
            total_sold: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn promo(code: &str, kind: DiscountType, value: f64) -> PromoCode {
        let mut promo = new_promo_code(code, kind, value);
        promo.starts_at = Utc::now() - Duration::days(1);
        promo
    }

    async fn shop_with(gateway: FakeGateway, email: FakeEmail) -> Shop {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let castle = db.products().insert(&toy("Castle", 15_000, 5)).await.unwrap();
        let robot = db.products().insert(&toy("Robot", 12_000, 5)).await.unwrap();

        let gateway = Arc::new(gateway);
        let email = Arc::new(email);
        let service = CheckoutService::new(
            db.clone(),
            StoreConfig::default(),
            gateway.clone(),
            email.clone(),
        );

        Shop {
            service,
            db,
            gateway,
            email,
            castle,
            robot,
        }
    }

    async fn shop() -> Shop {
        shop_with(FakeGateway::default(), FakeEmail::default()).await
    }

    fn request(shop: &Shop, method: PaymentMethod, promo: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            customer_name: "Ada Lovelace".to_string(),
            customer_email: "ada@example.com".to_string(),
            shipping_address: "1 Toy Street".to_string(),
            items: vec![
                CheckoutItem::new(&shop.castle.id, 1),
                CheckoutItem::new(&shop.robot.id, 2),
            ],
            promo_code: promo.map(str::to_string),
            payment_method: method,
        }
    }

    #[tokio::test]
    async fn test_cash_checkout_with_welcome10() {
        let shop = shop().await;
        let welcome = shop
            .db
            .promo_codes()
            .insert(&promo("WELCOME10", DiscountType::Percentage, 10.0))
            .await
            .unwrap();

        let response = shop
            .service
            .checkout(request(&shop, PaymentMethod::CashOnDelivery, Some("welcome10")))
            .await
            .unwrap();

        assert_eq!(response.pricing.subtotal.units(), 39_000);
        assert_eq!(response.pricing.shipping_cost, Money::zero());
        assert_eq!(response.pricing.discount.units(), 3_900);
        assert_eq!(response.pricing.total.units(), 35_100);
        assert_eq!(response.status, OrderStatus::Confirmed);
        assert_eq!(response.payment_status, PaymentStatus::Pending);
        assert!(response.checkout_url.is_none());
        assert!(shop.gateway.requests.lock().unwrap().is_empty());

        let order = shop.db.orders().get_by_id(&response.order_id).await.unwrap().unwrap();
        assert_eq!(order.total, 35_100);
        assert_eq!(order.promo_code_id.as_deref(), Some(welcome.id.as_str()));
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[1].product_name, "Robot");

        let robot = shop.db.products().get_by_id(&shop.robot.id).await.unwrap().unwrap();
        assert_eq!(robot.stock_quantity, 3);
        assert_eq!(robot.total_sold, 2);

        let used = shop.db.promo_codes().get_by_id(&welcome.id).await.unwrap().unwrap();
        assert_eq!(used.usage_count, 1);

        let sent = shop.email.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
    }

    #[tokio::test]
    async fn test_expired_code_aborts_without_writing() {
        let shop = shop().await;
        let mut expired = promo("SUMMER", DiscountType::Percentage, 10.0);
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        shop.db.promo_codes().insert(&expired).await.unwrap();

        let preview = shop
            .service
            .preview(&request(&shop, PaymentMethod::Card, None).items, Some("SUMMER"))
            .await
            .unwrap();
        assert_eq!(preview.pricing.total.units(), 39_000);
        assert_eq!(
            preview.promo.and_then(|p| p.rejection()),
            Some(PromoRejection::Expired)
        );

        let result = shop
            .service
            .checkout(request(&shop, PaymentMethod::CashOnDelivery, Some("SUMMER")))
            .await;
        assert!(matches!(result, Err(ServiceError::Promo(PromoRejection::Expired))));

        assert!(shop.db.orders().list().await.unwrap().is_empty());
        let castle = shop.db.products().get_by_id(&shop.castle.id).await.unwrap().unwrap();
        assert_eq!(castle.stock_quantity, 5);
    }

    #[tokio::test]
    async fn test_online_checkout_absorbs_fee_and_confirms() {
        let shop = shop().await;

        let response = shop
            .service
            .checkout(request(&shop, PaymentMethod::Card, None))
            .await
            .unwrap();

        assert_eq!(response.status, OrderStatus::Pending);
        assert_eq!(
            response.checkout_url.as_deref(),
            Some(format!("https://pay.example/{}", response.order_id).as_str())
        );

        let requests = shop.gateway.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        let expected =
            absorb_processor_fee(Money::from_units(39_000), StoreConfig::default().fee_rate())
                .unwrap();
        assert_eq!(line_items_total(&requests[0].items), expected);
        assert_eq!(requests[0].amount, expected);
        assert_eq!(requests[0].methods, vec!["card".to_string()]);

        let tx = response.transaction_id.unwrap();
        let order = shop.service.confirm_transaction(&tx, true).await.unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Done);
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.is_recognized_revenue());

        // Confirmation at checkout + receipt on payment
        assert_eq!(shop.email.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_declined_payment_returns_stock_and_promo_use() {
        let shop = shop().await;
        let mut once = promo("ONCE", DiscountType::Fixed, 1_000.0);
        once.usage_limit = Some(1);
        let once = shop.db.promo_codes().insert(&once).await.unwrap();

        let response = shop
            .service
            .checkout(request(&shop, PaymentMethod::MobileMoney, Some("ONCE")))
            .await
            .unwrap();
        let held = shop.db.promo_codes().get_by_id(&once.id).await.unwrap().unwrap();
        assert_eq!(held.usage_count, 1);

        let order = shop
            .service
            .confirm_payment(&response.order_id, false)
            .await
            .unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Failed);
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(!order.is_recognized_revenue());

        // A repeated callback changes nothing
        shop.service
            .confirm_payment(&response.order_id, false)
            .await
            .unwrap();

        let robot = shop.db.products().get_by_id(&shop.robot.id).await.unwrap().unwrap();
        assert_eq!(robot.stock_quantity, 5);
        assert_eq!(robot.total_sold, 0);
        let released = shop.db.promo_codes().get_by_id(&once.id).await.unwrap().unwrap();
        assert_eq!(released.usage_count, 0);

        // The single-use code is still good for the retry
        let retry = shop
            .service
            .checkout(request(&shop, PaymentMethod::CashOnDelivery, Some("ONCE")))
            .await
            .unwrap();
        assert_eq!(retry.pricing.discount.units(), 1_000);

        // A success arriving after the cancellation is refused
        assert!(matches!(
            shop.service.confirm_payment(&response.order_id, true).await,
            Err(ServiceError::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn test_late_failure_does_not_undo_payment() {
        let shop = shop().await;
        let response = shop
            .service
            .checkout(request(&shop, PaymentMethod::Card, None))
            .await
            .unwrap();

        shop.service
            .confirm_payment(&response.order_id, true)
            .await
            .unwrap();
        let order = shop
            .service
            .confirm_payment(&response.order_id, false)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Done);
        assert!(order.is_recognized_revenue());

        let stored = shop.db.orders().get_by_id(&response.order_id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Done);
        let robot = shop.db.products().get_by_id(&shop.robot.id).await.unwrap().unwrap();
        assert_eq!(robot.stock_quantity, 3);
    }

    #[tokio::test]
    async fn test_free_order_skips_gateway() {
        let shop = shop().await;
        shop.db
            .promo_codes()
            .insert(&promo("ALLFREE", DiscountType::Fixed, 100_000.0))
            .await
            .unwrap();

        let response = shop
            .service
            .checkout(request(&shop, PaymentMethod::Card, Some("ALLFREE")))
            .await
            .unwrap();

        assert_eq!(response.pricing.total, Money::zero());
        assert_eq!(response.pricing.discount.units(), 39_000);
        assert_eq!(response.payment_status, PaymentStatus::Done);
        assert_eq!(response.status, OrderStatus::Confirmed);
        assert!(shop.gateway.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_marks_payment_failed() {
        let shop = shop_with(
            FakeGateway {
                fail: true,
                ..Default::default()
            },
            FakeEmail::default(),
        )
        .await;

        let result = shop.service.checkout(request(&shop, PaymentMethod::Card, None)).await;
        let err = result.unwrap_err();
        assert!(err.is_retryable());

        let orders = shop.db.orders().list().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].payment_status, PaymentStatus::Failed);
        assert_eq!(orders[0].status, OrderStatus::Cancelled);

        let castle = shop.db.products().get_by_id(&shop.castle.id).await.unwrap().unwrap();
        assert_eq!(castle.stock_quantity, 5);
        assert_eq!(castle.total_sold, 0);
    }

    #[tokio::test]
    async fn test_email_failure_does_not_block_checkout() {
        let shop = shop_with(
            FakeGateway::default(),
            FakeEmail {
                fail: true,
                ..Default::default()
            },
        )
        .await;

        let response = shop
            .service
            .checkout(request(&shop, PaymentMethod::CashOnDelivery, None))
            .await
            .unwrap();
        assert_eq!(response.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_insufficient_stock_and_unknown_products() {
        let shop = shop().await;

        let mut too_many = request(&shop, PaymentMethod::CashOnDelivery, None);
        too_many.items = vec![CheckoutItem::new(&shop.castle.id, 6)];
        let result = shop.service.checkout(too_many).await;
        assert!(matches!(
            result,
            Err(ServiceError::Domain(CoreError::InsufficientStock {
                available: 5,
                requested: 6,
                ..
            }))
        ));

        let mut unknown = request(&shop, PaymentMethod::CashOnDelivery, None);
        unknown.items.push(CheckoutItem::new("missing", 1));
        assert!(matches!(
            shop.service.checkout(unknown).await,
            Err(ServiceError::UnknownProduct(id)) if id == "missing"
        ));

        assert!(shop.db.orders().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_product_lines_are_refused_before_writing() {
        let shop = shop().await;
        let mut welcome = promo("WELCOME10", DiscountType::Percentage, 10.0);
        welcome.usage_limit = Some(1);
        let welcome = shop.db.promo_codes().insert(&welcome).await.unwrap();

        // 3 + 3 castles against a stock of 5
        let mut doubled = request(&shop, PaymentMethod::CashOnDelivery, Some("WELCOME10"));
        doubled.items = vec![
            CheckoutItem::new(&shop.castle.id, 3),
            CheckoutItem::new(&shop.castle.id, 3),
        ];
        let result = shop.service.checkout(doubled).await;
        assert!(matches!(
            result,
            Err(ServiceError::Validation(ValidationError::Duplicate { .. }))
        ));

        assert!(shop.db.orders().list().await.unwrap().is_empty());
        let unused = shop.db.promo_codes().get_by_id(&welcome.id).await.unwrap().unwrap();
        assert_eq!(unused.usage_count, 0);
        let castle = shop.db.products().get_by_id(&shop.castle.id).await.unwrap().unwrap();
        assert_eq!(castle.stock_quantity, 5);
    }

    #[tokio::test]
    async fn test_invalid_customer_data() {
        let shop = shop().await;

        let mut bad_email = request(&shop, PaymentMethod::CashOnDelivery, None);
        bad_email.customer_email = "not-an-email".to_string();
        assert!(matches!(
            shop.service.checkout(bad_email).await,
            Err(ServiceError::Validation(_))
        ));

        let mut empty = request(&shop, PaymentMethod::CashOnDelivery, None);
        empty.items.clear();
        assert!(matches!(
            shop.service.checkout(empty).await,
            Err(ServiceError::Validation(ValidationError::Required { .. }))
        ));
    }

    #[tokio::test]
    async fn test_shipping_charged_below_threshold() {
        let shop = shop().await;
        let kite = shop.db.products().insert(&toy("Kite", 2_500, 10)).await.unwrap();

        let preview = shop
            .service
            .preview(&[CheckoutItem::new(&kite.id, 2)], None)
            .await
            .unwrap();
        assert_eq!(preview.pricing.subtotal.units(), 5_000);
        assert_eq!(preview.pricing.shipping_cost.units(), 1_000);
        assert_eq!(preview.pricing.total.units(), 6_000);
        assert!(preview.promo.is_none());

        // Preview has no side effects
        let kite_after = shop.db.products().get_by_id(&kite.id).await.unwrap().unwrap();
        assert_eq!(kite_after.stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_exhausted_code_is_rejected() {
        let shop = shop().await;
        let mut once = promo("ONCE", DiscountType::Fixed, 1_000.0);
        once.usage_limit = Some(1);
        shop.db.promo_codes().insert(&once).await.unwrap();

        shop.service
            .checkout(request(&shop, PaymentMethod::CashOnDelivery, Some("ONCE")))
            .await
            .unwrap();

        let second = shop
            .service
            .checkout(request(&shop, PaymentMethod::CashOnDelivery, Some("ONCE")))
            .await;
        assert!(matches!(
            second,
            Err(ServiceError::Promo(PromoRejection::LimitReached))
        ));
    }
}
