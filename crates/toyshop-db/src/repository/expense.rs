//! # Expense Repository
//!
//! Back-office expense ledger. Expenses are deleted outright: a deleted
//! expense simply disappears from every later report.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use toyshop_core::validation::validate_expense;
use toyshop_core::{CoreError, Expense, ExpenseCategory};

const EXPENSE_COLUMNS: &str = r#"
    id, product_id, category, description, amount, quantity,
    expense_date, created_at
"#;

/// Input for recording an expense. ID and creation time are assigned on
/// insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub product_id: Option<String>,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: i64,
    pub quantity: Option<i64>,
    pub expense_date: NaiveDate,
}

/// Repository for expense database operations.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    /// Creates a new ExpenseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    /// Lists all expenses, most recent first.
    pub async fn list(&self) -> DbResult<Vec<Expense>> {
        debug!("Listing expenses");

        let expenses = sqlx::query_as::<_, Expense>(&format!(
            "SELECT {} FROM expenses ORDER BY expense_date DESC, created_at DESC",
            EXPENSE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    /// Records a new expense.
    ///
    /// ## Errors
    /// * `Domain(Validation)` - Empty description, negative amount
    /// * `ForeignKeyViolation` - Unknown product ID
    pub async fn create(&self, new: NewExpense) -> DbResult<Expense> {
        validate_expense(&new.description, new.amount, new.quantity).map_err(CoreError::from)?;

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            product_id: new.product_id,
            category: new.category,
            description: new.description.trim().to_string(),
            amount: new.amount,
            quantity: new.quantity,
            expense_date: new.expense_date,
            created_at: Utc::now(),
        };

        debug!(
            id = %expense.id,
            category = ?expense.category,
            amount = expense.amount,
            "Recording expense"
        );

        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, product_id, category, description, amount, quantity,
                expense_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.product_id)
        .bind(expense.category)
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(expense.quantity)
        .bind(expense.expense_date)
        .bind(expense.created_at)
        .execute(&self.pool)
        .await?;

        Ok(expense)
    }

    /// Deletes an expense.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting expense");

        let result = sqlx::query("DELETE FROM expenses WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Expense", id));
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn new_expense(category: ExpenseCategory, amount: i64, day: u32) -> NewExpense {
        NewExpense {
            product_id: None,
            category,
            description: format!("{:?} spend", category),
            amount,
            quantity: None,
            expense_date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
        }
    }

    async fn repo() -> ExpenseRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.expenses()
    }

    #[tokio::test]
    async fn test_create_list_delete() {
        let repo = repo().await;
        let stock = repo
            .create(new_expense(ExpenseCategory::Stock, 50_000, 1))
            .await
            .unwrap();
        repo.create(new_expense(ExpenseCategory::Marketing, 10_000, 5))
            .await
            .unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
        // Most recent first
        assert_eq!(all[0].category, ExpenseCategory::Marketing);
        assert_eq!(all[1].expense_date, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());

        repo.delete(&stock.id).await.unwrap();
        assert_eq!(repo.list().await.unwrap().len(), 1);

        assert!(matches!(
            repo.delete(&stock.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let repo = repo().await;

        let mut bad = new_expense(ExpenseCategory::Other, -5, 1);
        assert!(matches!(
            repo.create(bad.clone()).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));

        bad.amount = 100;
        bad.description = "   ".to_string();
        assert!(repo.create(bad).await.is_err());

        let mut unknown_product = new_expense(ExpenseCategory::Stock, 1_000, 2);
        unknown_product.product_id = Some("missing".to_string());
        assert!(matches!(
            repo.create(unknown_product).await,
            Err(DbError::ForeignKeyViolation { .. })
        ));
    }
}
