//! # Reporting Service
//!
//! Loads the back-office data and hands it to the financial aggregation
//! engine. All figures are recomputed on every call; nothing is cached.

use tracing::{debug, info};

use toyshop_core::finance::compute_financial_stats;
use toyshop_core::{FinancialStats, ReportLimits};
use toyshop_db::Database;

use crate::error::ServiceResult;

/// Dashboard snapshot provider.
#[derive(Debug, Clone)]
pub struct ReportingService {
    db: Database,
    limits: ReportLimits,
}

impl ReportingService {
    pub fn new(db: Database, limits: ReportLimits) -> Self {
        ReportingService { db, limits }
    }

    /// Computes the financial snapshot over every order, product and
    /// expense currently stored.
    pub async fn financial_stats(&self) -> ServiceResult<FinancialStats> {
        let orders = self.db.orders().list().await?;
        let products = self.db.products().list().await?;
        let expenses = self.db.expenses().list().await?;
        debug!(
            orders = orders.len(),
            products = products.len(),
            expenses = expenses.len(),
            "Loaded reporting inputs"
        );

        let stats = compute_financial_stats(&orders, &products, &expenses, &self.limits);
        info!(
            revenue = %stats.total_revenue,
            expenses = %stats.total_expenses,
            profit = %stats.total_profit,
            recognized_orders = stats.recognized_orders,
            "Financial snapshot computed"
        );

        Ok(stats)
    }
}
