//! # Product Repository
//!
//! Database operations for catalog products.
//!
//! ## Key Operations
//! - Catalog listing and lookup
//! - Guarded stock adjustments
//! - Recording sales (stock down, total_sold up, in one statement)
//! - Restoring the sales of a cancelled order
//!
//! ## Guarded Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: read, compute, write back (two checkouts overwrite)         │
//! │     SELECT stock_quantity ...;  UPDATE ... SET stock_quantity = 7      │
//! │                                                                         │
//! │  ✅ CORRECT: delta update guarded in the WHERE clause                  │
//! │     UPDATE products                                                     │
//! │     SET stock_quantity = stock_quantity - 3,                            │
//! │         total_sold     = total_sold + 3                                 │
//! │     WHERE id = ? AND stock_quantity >= 3                                │
//! │                                                                         │
//! │  Checkout A buys 3, checkout B buys 2, stock was 4:                    │
//! │  one of them updates, the other sees 0 rows → InsufficientStock        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use toyshop_core::Product;

const PRODUCT_COLUMNS: &str = r#"
    id, name, category, price, cost_price,
    stock_quantity, min_stock_alert, total_sold,
    is_active, created_at, updated_at
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let catalog = repo.list_active().await?;
/// repo.record_sale("product-uuid", 2).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists every product, listed or not, in catalog order.
    ///
    /// Reports need unlisted products too: their past sales still count.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        debug!("Listing products");

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products ORDER BY created_at, id",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Lists products visible in the storefront, sorted by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE is_active = 1 ORDER BY name",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The inserted product
    /// * `Err(DbError::UniqueViolation)` - ID already exists
    /// * `Err(DbError::CheckViolation)` - Negative price or stock
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category, price, cost_price,
                stock_quantity, min_stock_alert, total_sold,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.cost_price)
        .bind(product.stock_quantity)
        .bind(product.min_stock_alert)
        .bind(product.total_sold)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Adds `delta` units to stock (negative to remove). Restocks and manual
    /// corrections go through here.
    ///
    /// ## Returns
    /// The new stock level.
    ///
    /// ## Errors
    /// * `NotFound` - Product doesn't exist
    /// * `InsufficientStock` - Stock would go below zero
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<i64> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let new_stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET
                stock_quantity = stock_quantity + ?2,
                updated_at = ?3
            WHERE id = ?1 AND stock_quantity + ?2 >= 0
            RETURNING stock_quantity
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match new_stock {
            Some(stock) => Ok(stock),
            None => {
                let mut conn = self.pool.acquire().await?;
                Err(missing_or_short(&mut conn, id, -delta).await)
            }
        }
    }

    /// Records the sale of `quantity` units of one product.
    ///
    /// Stock goes down and `total_sold` goes up in the same guarded statement.
    pub async fn record_sale(&self, id: &str, quantity: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        record_sale_on(&mut conn, id, quantity).await
    }

    /// Records several sales atomically: either every line is applied or none.
    pub async fn record_sales(&self, lines: &[(String, i64)]) -> DbResult<()> {
        debug!(lines = lines.len(), "Recording sales");

        let mut tx = self.pool.begin().await?;
        for (product_id, quantity) in lines {
            record_sale_on(&mut tx, product_id, *quantity).await?;
        }
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    /// Undoes [`record_sales`](Self::record_sales) for a cancelled order:
    /// stock goes back up and `total_sold` back down, all lines or none.
    ///
    /// Unlisted products are restocked too.
    pub async fn restore_sales(&self, lines: &[(String, i64)]) -> DbResult<()> {
        debug!(lines = lines.len(), "Restoring sales");

        let mut tx = self.pool.begin().await?;
        for (product_id, quantity) in lines {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET
                    stock_quantity = stock_quantity + ?2,
                    total_sold = total_sold - ?2,
                    updated_at = ?3
                WHERE id = ?1 AND total_sold >= ?2
                "#,
            )
            .bind(product_id)
            .bind(quantity)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                warn!(id = %product_id, quantity = %quantity, "Sale not restored");
                return Err(DbError::QueryFailed(format!(
                    "cannot return {} units of product {}",
                    quantity, product_id
                )));
            }
        }
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    /// Counts listed products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

async fn record_sale_on(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<()> {
    debug!(id = %id, quantity = %quantity, "Recording sale");

    let result = sqlx::query(
        r#"
        UPDATE products
        SET
            stock_quantity = stock_quantity - ?2,
            total_sold = total_sold + ?2,
            updated_at = ?3
        WHERE id = ?1 AND is_active = 1 AND stock_quantity >= ?2
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let err = missing_or_short(conn, id, quantity).await;
        warn!(id = %id, quantity = %quantity, error = %err, "Sale not recorded");
        return Err(err);
    }

    Ok(())
}

/// Tells a missing (or unlisted) product apart from a short one after a
/// guarded update matched no row.
async fn missing_or_short(conn: &mut SqliteConnection, id: &str, requested: i64) -> DbError {
    let exists: Result<Option<bool>, sqlx::Error> =
        sqlx::query_scalar("SELECT is_active FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await;

    match exists {
        Ok(Some(true)) => DbError::InsufficientStock {
            product_id: id.to_string(),
            requested,
        },
        Ok(_) => DbError::not_found("Product", id),
        Err(e) => e.into(),
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn toy(name: &str, price: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: generate_product_id(),
            name: name.to_string(),
            category: "toys".to_string(),
            price,
            cost_price: price / 2,
            stock_quantity: stock,
            min_stock_alert: 2,
            total_sold: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn repo() -> ProductRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = repo().await;
        let castle = repo.insert(&toy("Castle", 15_000, 4)).await.unwrap();

        let found = repo.get_by_id(&castle.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Castle");
        assert_eq!(found.price, 15_000);
        assert!(found.is_active);

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_sale_updates_stock_and_total_sold() {
        let repo = repo().await;
        let robot = repo.insert(&toy("Robot", 12_000, 5)).await.unwrap();

        repo.record_sale(&robot.id, 2).await.unwrap();

        let after = repo.get_by_id(&robot.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 3);
        assert_eq!(after.total_sold, 2);
    }

    #[tokio::test]
    async fn test_record_sale_refuses_overselling() {
        let repo = repo().await;
        let kite = repo.insert(&toy("Kite", 2_000, 1)).await.unwrap();

        let result = repo.record_sale(&kite.id, 2).await;
        assert!(matches!(result, Err(DbError::InsufficientStock { requested: 2, .. })));

        let result = repo.record_sale("missing", 1).await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));

        let after = repo.get_by_id(&kite.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 1);
        assert_eq!(after.total_sold, 0);
    }

    #[tokio::test]
    async fn test_record_sales_is_all_or_nothing() {
        let repo = repo().await;
        let ball = repo.insert(&toy("Ball", 500, 10)).await.unwrap();
        let yoyo = repo.insert(&toy("Yoyo", 300, 1)).await.unwrap();

        let result = repo
            .record_sales(&[(ball.id.clone(), 3), (yoyo.id.clone(), 2)])
            .await;
        assert!(result.is_err());

        let ball_after = repo.get_by_id(&ball.id).await.unwrap().unwrap();
        assert_eq!(ball_after.stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_restore_sales_reverses_record_sales() {
        let repo = repo().await;
        let ball = repo.insert(&toy("Ball", 500, 10)).await.unwrap();
        let yoyo = repo.insert(&toy("Yoyo", 300, 4)).await.unwrap();
        let lines = vec![(ball.id.clone(), 3), (yoyo.id.clone(), 2)];

        repo.record_sales(&lines).await.unwrap();
        repo.restore_sales(&lines).await.unwrap();

        let ball_after = repo.get_by_id(&ball.id).await.unwrap().unwrap();
        assert_eq!(ball_after.stock_quantity, 10);
        assert_eq!(ball_after.total_sold, 0);

        // Nothing was sold, so nothing can be returned
        let result = repo.restore_sales(&[(yoyo.id.clone(), 1)]).await;
        assert!(matches!(result, Err(DbError::QueryFailed(_))));
        let yoyo_after = repo.get_by_id(&yoyo.id).await.unwrap().unwrap();
        assert_eq!(yoyo_after.stock_quantity, 4);
    }

    #[tokio::test]
    async fn test_adjust_stock() {
        let repo = repo().await;
        let puzzle = repo.insert(&toy("Puzzle", 4_000, 3)).await.unwrap();

        assert_eq!(repo.adjust_stock(&puzzle.id, 7).await.unwrap(), 10);
        assert_eq!(repo.adjust_stock(&puzzle.id, -10).await.unwrap(), 0);
        assert!(matches!(
            repo.adjust_stock(&puzzle.id, -1).await,
            Err(DbError::InsufficientStock { .. })
        ));
        assert!(matches!(
            repo.adjust_stock("missing", 1).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
