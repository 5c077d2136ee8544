//! # Promo Code Repository
//!
//! Lookup and redemption of promo codes.
//!
//! ## Redemption Race
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  usage_limit = 1, usage_count = 0                                      │
//! │                                                                         │
//! │  Checkout A: validate → Valid        Checkout B: validate → Valid      │
//! │       │                                    │                            │
//! │       ▼                                    ▼                            │
//! │  try_increment_usage ── wins ──►  usage_count = 1                      │
//! │                                    │                                    │
//! │                                    ▼                                    │
//! │                          try_increment_usage → 0 rows                  │
//! │                          → DbError::PromoLimitReached                  │
//! │                                                                         │
//! │  The guard lives in the UPDATE itself:                                 │
//! │    WHERE usage_limit IS NULL OR usage_count < usage_limit              │
//! │                                                                         │
//! │  A cancelled order hands its use back with release_usage              │
//! │    WHERE usage_count > 0                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use toyshop_core::promo::{normalize_code, validate_new_promo_code};
use toyshop_core::{CoreError, PromoCode};

const PROMO_COLUMNS: &str = r#"
    id, code, discount_type, discount_value, min_order_amount,
    max_discount, usage_limit, usage_count, starts_at, expires_at,
    is_active, created_at
"#;

/// Repository for promo code database operations.
#[derive(Debug, Clone)]
pub struct PromoCodeRepository {
    pool: SqlitePool,
}

impl PromoCodeRepository {
    /// Creates a new PromoCodeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PromoCodeRepository { pool }
    }

    /// Finds an active code, ignoring case.
    ///
    /// Activation window, minimum and usage limit are NOT checked here; that
    /// is `promo::validate_promo_code`'s job.
    pub async fn find_active_by_code(&self, code: &str) -> DbResult<Option<PromoCode>> {
        let code = normalize_code(code);
        debug!(code = %code, "Looking up promo code");

        let promo = sqlx::query_as::<_, PromoCode>(&format!(
            "SELECT {} FROM promo_codes WHERE code = ?1 COLLATE NOCASE AND is_active = 1",
            PROMO_COLUMNS
        ))
        .bind(&code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }

    /// Gets a promo code by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>(&format!(
            "SELECT {} FROM promo_codes WHERE id = ?1",
            PROMO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }

    /// Lists all promo codes, newest first.
    pub async fn list(&self) -> DbResult<Vec<PromoCode>> {
        let promos = sqlx::query_as::<_, PromoCode>(&format!(
            "SELECT {} FROM promo_codes ORDER BY created_at DESC, code",
            PROMO_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(promos)
    }

    /// Inserts a new promo code. The code is stored upper-case.
    ///
    /// ## Errors
    /// * `Domain(Validation)` - Creation invariants violated (e.g. 150%)
    /// * `UniqueViolation` - Code already exists (case-insensitive)
    pub async fn insert(&self, promo: &PromoCode) -> DbResult<PromoCode> {
        validate_new_promo_code(promo).map_err(CoreError::from)?;

        let mut stored = promo.clone();
        stored.code = normalize_code(&promo.code);
        debug!(id = %stored.id, code = %stored.code, "Inserting promo code");

        sqlx::query(
            r#"
            INSERT INTO promo_codes (
                id, code, discount_type, discount_value, min_order_amount,
                max_discount, usage_limit, usage_count, starts_at, expires_at,
                is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.code)
        .bind(stored.discount_type)
        .bind(stored.discount_value)
        .bind(stored.min_order_amount)
        .bind(stored.max_discount)
        .bind(stored.usage_limit)
        .bind(stored.usage_count)
        .bind(stored.starts_at)
        .bind(stored.expires_at)
        .bind(stored.is_active)
        .bind(stored.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: stored.code.clone(),
            },
            other => other,
        })?;

        Ok(stored)
    }

    /// Atomically consumes one use of a promo code.
    ///
    /// ## Returns
    /// The new usage count.
    ///
    /// ## Errors
    /// * `PromoLimitReached` - Limit already consumed (lost the race)
    /// * `NotFound` - Code doesn't exist or was deactivated
    pub async fn try_increment_usage(&self, id: &str) -> DbResult<i64> {
        debug!(id = %id, "Incrementing promo usage");

        let new_count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE promo_codes
            SET usage_count = usage_count + 1
            WHERE id = ?1
              AND is_active = 1
              AND (usage_limit IS NULL OR usage_count < usage_limit)
            RETURNING usage_count
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(count) = new_count {
            return Ok(count);
        }

        let active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM promo_codes WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match active {
            Some(true) => {
                warn!(id = %id, "Promo code redemption lost the usage-limit race");
                Err(DbError::PromoLimitReached {
                    promo_id: id.to_string(),
                })
            }
            _ => Err(DbError::not_found("PromoCode", id)),
        }
    }

    /// Gives back one use consumed by an order that was later cancelled.
    ///
    /// Guarded so the count never goes below zero. Works on deactivated
    /// codes too.
    ///
    /// ## Returns
    /// The new usage count.
    ///
    /// ## Errors
    /// * `NotFound` - Code doesn't exist
    /// * `QueryFailed` - No use left to give back
    pub async fn release_usage(&self, id: &str) -> DbResult<i64> {
        debug!(id = %id, "Releasing promo usage");

        let new_count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE promo_codes
            SET usage_count = usage_count - 1
            WHERE id = ?1 AND usage_count > 0
            RETURNING usage_count
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(count) = new_count {
            return Ok(count);
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM promo_codes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => Err(DbError::QueryFailed(format!(
                "promo code {} has no use to release",
                id
            ))),
            None => Err(DbError::not_found("PromoCode", id)),
        }
    }

    /// Deactivates a promo code (it then behaves as not found).
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating promo code");

        let result = sqlx::query("UPDATE promo_codes SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PromoCode", id));
        }

        Ok(())
    }
}

/// Helper to generate a new promo code ID.
pub fn generate_promo_id() -> String {
    Uuid::new_v4().to_string()
}

/// A fresh, active promo code starting now, with no limits.
pub fn new_promo_code(
    code: &str,
    discount_type: toyshop_core::DiscountType,
    discount_value: f64,
) -> PromoCode {
    let now = Utc::now();
    PromoCode {
        id: generate_promo_id(),
        code: normalize_code(code),
        discount_type,
        discount_value,
        min_order_amount: 0,
        max_discount: None,
        usage_limit: None,
        usage_count: 0,
        starts_at: now,
        expires_at: None,
        is_active: true,
        created_at: now,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use toyshop_core::DiscountType;

    async fn repo() -> PromoCodeRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.promo_codes()
    }

    fn welcome10() -> PromoCode {
        let mut promo = new_promo_code("welcome10", DiscountType::Percentage, 10.0);
        promo.starts_at = Utc::now() - Duration::days(1);
        promo
    }

    #[tokio::test]
    async fn test_find_active_by_code_ignores_case() {
        let repo = repo().await;
        let stored = repo.insert(&welcome10()).await.unwrap();
        assert_eq!(stored.code, "WELCOME10");

        let found = repo.find_active_by_code("Welcome10").await.unwrap().unwrap();
        assert_eq!(found.id, stored.id);
        assert_eq!(found.discount_type, DiscountType::Percentage);
        assert!((found.discount_value - 10.0).abs() < f64::EPSILON);

        repo.deactivate(&stored.id).await.unwrap();
        assert!(repo.find_active_by_code("WELCOME10").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates_and_bad_values() {
        let repo = repo().await;
        repo.insert(&welcome10()).await.unwrap();

        let result = repo.insert(&welcome10()).await;
        assert!(matches!(result, Err(DbError::UniqueViolation { .. })));

        let too_generous = new_promo_code("HALFPLUS", DiscountType::Percentage, 150.0);
        let result = repo.insert(&too_generous).await;
        assert!(matches!(result, Err(DbError::Domain(CoreError::Validation(_)))));
    }

    #[tokio::test]
    async fn test_try_increment_usage_respects_limit() {
        let repo = repo().await;
        let mut promo = welcome10();
        promo.usage_limit = Some(2);
        let promo = repo.insert(&promo).await.unwrap();

        assert_eq!(repo.try_increment_usage(&promo.id).await.unwrap(), 1);
        assert_eq!(repo.try_increment_usage(&promo.id).await.unwrap(), 2);
        assert!(matches!(
            repo.try_increment_usage(&promo.id).await,
            Err(DbError::PromoLimitReached { .. })
        ));

        let stored = repo.get_by_id(&promo.id).await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 2);

        assert!(matches!(
            repo.try_increment_usage("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_release_usage_frees_a_use() {
        let repo = repo().await;
        let mut promo = welcome10();
        promo.usage_limit = Some(1);
        let promo = repo.insert(&promo).await.unwrap();

        assert_eq!(repo.try_increment_usage(&promo.id).await.unwrap(), 1);
        assert_eq!(repo.release_usage(&promo.id).await.unwrap(), 0);
        assert_eq!(repo.try_increment_usage(&promo.id).await.unwrap(), 1);

        repo.release_usage(&promo.id).await.unwrap();
        assert!(matches!(
            repo.release_usage(&promo.id).await,
            Err(DbError::QueryFailed(_))
        ));
        assert!(matches!(
            repo.release_usage("missing").await,
            Err(DbError::NotFound { .. })
        ));

        let stored = repo.get_by_id(&promo.id).await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_redemptions_never_overrun_limit() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("race.db")))
            .await
            .unwrap();
        let repo = db.promo_codes();

        let mut promo = welcome10();
        promo.usage_limit = Some(3);
        let promo = repo.insert(&promo).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let repo = repo.clone();
            let id = promo.id.clone();
            handles.push(tokio::spawn(async move { repo.try_increment_usage(&id).await }));
        }

        let mut won = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                won += 1;
            }
        }

        assert_eq!(won, 3);
        let stored = repo.get_by_id(&promo.id).await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 3);
    }
}
