//! # Order Repository
//!
//! Database operations for orders and their line items.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Order Lifecycle                                  │
//! │                                                                         │
//! │  1. insert(order)           → orders + order_items in ONE transaction  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  2. set_transaction_id()    → online payments only                     │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  3. update_payment_status() → done / failed (done is final)            │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  4. update_status()         → confirmed → shipped → delivered          │
//! │                               (or cancelled, checked against the       │
//! │                                transition table)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use toyshop_core::{CoreError, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};

const ORDER_COLUMNS: &str = r#"
    id, customer_name, customer_email, shipping_address,
    subtotal, shipping_cost, discount, total, promo_code_id,
    payment_method, status, payment_status, transaction_id,
    created_at, updated_at
"#;

/// Order header as stored; items live in `order_items`.
#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    customer_name: String,
    customer_email: String,
    shipping_address: String,
    subtotal: i64,
    shipping_cost: i64,
    discount: i64,
    total: i64,
    promo_code_id: Option<String>,
    payment_method: PaymentMethod,
    status: OrderStatus,
    payment_status: PaymentStatus,
    transaction_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            shipping_address: self.shipping_address,
            items,
            subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            discount: self.discount,
            total: self.total,
            promo_code_id: self.promo_code_id,
            payment_method: self.payment_method,
            status: self.status,
            payment_status: self.payment_status,
            transaction_id: self.transaction_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    order_id: String,
    #[sqlx(flatten)]
    item: OrderItem,
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Lists all orders with their items, newest first.
    pub async fn list(&self) -> DbResult<Vec<Order>> {
        debug!("Listing orders");

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders ORDER BY created_at DESC, id",
            ORDER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let item_rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT order_id, product_id, product_name, quantity, price
            FROM order_items
            ORDER BY order_id, line_no
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items_by_order.entry(row.order_id).or_default().push(row.item);
        }

        let orders: Vec<Order> = rows
            .into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect();

        debug!(count = orders.len(), "Listed orders");
        Ok(orders)
    }

    /// Gets an order (with items) by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = ?1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let items = self.get_items(&row.id).await?;
                Ok(Some(row.into_order(items)))
            }
            None => Ok(None),
        }
    }

    /// Finds the order paid through a given aggregator transaction.
    pub async fn find_by_transaction_id(&self, transaction_id: &str) -> DbResult<Option<Order>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM orders WHERE transaction_id = ?1")
                .bind(transaction_id)
                .fetch_optional(&self.pool)
                .await?;

        match id {
            Some(id) => self.get_by_id(&id).await,
            None => Ok(None),
        }
    }

    /// Line items of one order, in cart order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT product_id, product_name, quantity, price
            FROM order_items
            WHERE order_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Inserts an order and its items in one transaction.
    ///
    /// ## Errors
    /// * `UniqueViolation` - Order ID already exists
    /// * `ForeignKeyViolation` - Unknown promo code ID
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, items = order.items.len(), total = order.total, "Inserting order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, customer_name, customer_email, shipping_address,
                subtotal, shipping_cost, discount, total, promo_code_id,
                payment_method, status, payment_status, transaction_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&order.id)
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.shipping_address)
        .bind(order.subtotal)
        .bind(order.shipping_cost)
        .bind(order.discount)
        .bind(order.total)
        .bind(&order.promo_code_id)
        .bind(order.payment_method)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(&order.transaction_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (line_no, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, line_no, product_id, product_name, quantity, price
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&order.id)
            .bind(line_no as i64)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    /// Moves an order to `next`, enforcing the status transition table.
    ///
    /// The update is guarded on the status we read, so a concurrent change
    /// in between is reported instead of overwritten.
    ///
    /// ## Errors
    /// * `NotFound` - Order doesn't exist
    /// * `Domain(InvalidStatusTransition)` - Transition not allowed
    pub async fn update_status(&self, id: &str, next: OrderStatus) -> DbResult<()> {
        debug!(id = %id, next = %next, "Updating order status");

        let current: OrderStatus = sqlx::query_scalar("SELECT status FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;

        if !current.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                order_id: id.to_string(),
                from: current,
                to: next,
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        )
        .bind(id)
        .bind(next)
        .bind(Utc::now())
        .bind(current)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::QueryFailed(format!(
                "order {} changed status concurrently",
                id
            )));
        }

        Ok(())
    }

    /// Sets the payment status.
    ///
    /// A payment that is done stays done: setting it to done again is a
    /// no-op, anything else is refused.
    ///
    /// ## Errors
    /// * `NotFound` - Order doesn't exist
    /// * `Domain(PreconditionViolation)` - Payment already done
    pub async fn update_payment_status(&self, id: &str, status: PaymentStatus) -> DbResult<()> {
        debug!(id = %id, payment_status = ?status, "Updating payment status");

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET payment_status = ?2, updated_at = ?3
            WHERE id = ?1 AND payment_status != ?4
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .bind(PaymentStatus::Done)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let current: Option<PaymentStatus> =
            sqlx::query_scalar("SELECT payment_status FROM orders WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Err(DbError::not_found("Order", id)),
            Some(_) if status == PaymentStatus::Done => Ok(()),
            Some(_) => Err(CoreError::precondition(format!(
                "payment for order {} is already done",
                id
            ))
            .into()),
        }
    }

    /// Stores the payment aggregator transaction for an order.
    pub async fn set_transaction_id(&self, id: &str, transaction_id: &str) -> DbResult<()> {
        debug!(id = %id, transaction_id = %transaction_id, "Storing transaction id");

        let result =
            sqlx::query("UPDATE orders SET transaction_id = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(transaction_id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        Ok(())
    }
}

/// Helper to generate a new order ID.
pub fn generate_order_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn sample_order() -> Order {
        let now = Utc::now();
        Order {
            id: generate_order_id(),
            customer_name: "Awa Diop".to_string(),
            customer_email: "awa@example.com".to_string(),
            shipping_address: "12 Rue des Jouets".to_string(),
            items: vec![
                OrderItem {
                    product_id: "castle".to_string(),
                    product_name: "Castle".to_string(),
                    quantity: 1,
                    price: 15_000,
                },
                OrderItem {
                    product_id: "robot".to_string(),
                    product_name: "Robot".to_string(),
                    quantity: 2,
                    price: 12_000,
                },
            ],
            subtotal: 39_000,
            shipping_cost: 0,
            discount: 3_900,
            total: 35_100,
            promo_code_id: None,
            payment_method: PaymentMethod::MobileMoney,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn repo() -> OrderRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.orders()
    }

    #[tokio::test]
    async fn test_insert_and_get_with_items() {
        let repo = repo().await;
        let order = sample_order();
        repo.insert(&order).await.unwrap();

        let found = repo.get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(found.total, 35_100);
        assert_eq!(found.items, order.items);
        assert_eq!(found.payment_method, PaymentMethod::MobileMoney);
        assert_eq!(found.status, OrderStatus::Pending);

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].items.len(), 2);
    }

    #[tokio::test]
    async fn test_status_transitions_are_enforced() {
        let repo = repo().await;
        let order = sample_order();
        repo.insert(&order).await.unwrap();

        repo.update_status(&order.id, OrderStatus::Confirmed).await.unwrap();
        repo.update_status(&order.id, OrderStatus::Shipped).await.unwrap();
        repo.update_status(&order.id, OrderStatus::Delivered).await.unwrap();

        let result = repo.update_status(&order.id, OrderStatus::Cancelled).await;
        assert!(matches!(
            result,
            Err(DbError::Domain(CoreError::InvalidStatusTransition { .. }))
        ));

        let result = repo.update_status("missing", OrderStatus::Confirmed).await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_payment_and_transaction_updates() {
        let repo = repo().await;
        let order = sample_order();
        repo.insert(&order).await.unwrap();

        repo.set_transaction_id(&order.id, "tx-42").await.unwrap();
        repo.update_payment_status(&order.id, PaymentStatus::Done).await.unwrap();

        let found = repo.find_by_transaction_id("tx-42").await.unwrap().unwrap();
        assert_eq!(found.id, order.id);
        assert_eq!(found.payment_status, PaymentStatus::Done);
        assert!(found.is_recognized_revenue());

        assert!(matches!(
            repo.update_payment_status("missing", PaymentStatus::Failed).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_done_payment_is_final() {
        let repo = repo().await;
        let order = sample_order();
        repo.insert(&order).await.unwrap();

        repo.update_payment_status(&order.id, PaymentStatus::Failed).await.unwrap();
        repo.update_payment_status(&order.id, PaymentStatus::Done).await.unwrap();
        repo.update_payment_status(&order.id, PaymentStatus::Done).await.unwrap();

        let late_failure = repo.update_payment_status(&order.id, PaymentStatus::Failed).await;
        assert!(matches!(
            late_failure,
            Err(DbError::Domain(CoreError::PreconditionViolation(_)))
        ));

        let found = repo.get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(found.payment_status, PaymentStatus::Done);
    }
}
