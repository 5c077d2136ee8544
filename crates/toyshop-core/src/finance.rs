//! # Finance Module
//!
//! Financial roll-ups for the back-office dashboard.
//!
//! ## Snapshot Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  orders ──► filter_recognized_revenue_orders ──► orders'               │
//! │                     (delivered OR payment done)      │                  │
//! │                                                      ├─► total_revenue  │
//! │                                                      ├─► top_selling    │
//! │                                                      └─► by_month ◄──┐  │
//! │  expenses ──► total_expenses ──► profit, margin                      │  │
//! │           └─► expenses_by_category                                   │  │
//! │           └──────────────────────────────────────────────────────────┘  │
//! │  products ──► low_stock_alerts                                         │
//! │           └─► per_product_profitability                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything is recomputed from scratch on every call. Percentages are
//! returned unrounded; formatting belongs to the frontend.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Expense, ExpenseCategory, Order, Product};
use crate::{DEFAULT_LOW_STOCK_LIMIT, DEFAULT_REVENUE_MONTHS, DEFAULT_TOP_SELLERS_LIMIT};

// =============================================================================
// Report Types
// =============================================================================

/// A best-selling product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TopSeller {
    pub product_id: String,
    pub name: String,
    pub total_sold: i64,
    pub revenue: Money,
}

/// A product at or below its restock threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LowStockAlert {
    pub product_id: String,
    pub name: String,
    pub stock_quantity: i64,
    pub min_stock_alert: i64,
}

/// Lifetime profitability of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductProfitability {
    pub product_id: String,
    pub name: String,
    pub revenue: Money,
    pub cost: Money,
    pub profit: Money,
    /// Profit as a percentage of revenue, 0 when nothing was sold.
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryExpense {
    pub category: ExpenseCategory,
    pub amount: Money,
    /// Share of total expenses.
    pub percentage: f64,
}

/// One `YYYY-MM` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlyFinancials {
    pub month: String,
    pub revenue: Money,
    pub expenses: Money,
    pub profit: Money,
}

/// Complete dashboard snapshot. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FinancialStats {
    pub total_revenue: Money,
    pub total_expenses: Money,
    pub total_profit: Money,
    pub profit_margin: f64,
    /// Orders counted as revenue.
    pub recognized_orders: usize,
    pub top_selling_products: Vec<TopSeller>,
    pub low_stock_alerts: Vec<LowStockAlert>,
    pub product_profitability: Vec<ProductProfitability>,
    pub expenses_by_category: Vec<CategoryExpense>,
    pub revenue_by_month: Vec<MonthlyFinancials>,
}

/// Truncation limits for the list sections of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLimits {
    pub top_sellers: usize,
    pub low_stock: usize,
    pub months: usize,
}

impl Default for ReportLimits {
    fn default() -> Self {
        ReportLimits {
            top_sellers: DEFAULT_TOP_SELLERS_LIMIT,
            low_stock: DEFAULT_LOW_STOCK_LIMIT,
            months: DEFAULT_REVENUE_MONTHS,
        }
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Orders that count as revenue: delivered, or paid.
pub fn filter_recognized_revenue_orders(orders: &[Order]) -> Vec<&Order> {
    orders
        .iter()
        .filter(|order| order.is_recognized_revenue())
        .collect()
}

pub fn total_revenue(orders: &[&Order]) -> Money {
    orders.iter().map(|order| order.total_amount()).sum()
}

pub fn total_expenses(expenses: &[Expense]) -> Money {
    expenses.iter().map(Expense::amount).sum()
}

/// `revenue − expenses`. May be negative.
pub fn total_profit(revenue: Money, expenses: Money) -> Money {
    revenue - expenses
}

/// `profit / revenue × 100`, or 0 without revenue.
pub fn profit_margin(profit: Money, revenue: Money) -> f64 {
    profit.percentage_of(revenue)
}

// =============================================================================
// Rankings
// =============================================================================

/// Best sellers by units sold.
///
/// Ties are broken by revenue (descending), then product id (ascending), so
/// the ranking never depends on input order.
pub fn top_selling_products(
    orders: &[&Order],
    products: &[Product],
    limit: usize,
) -> Vec<TopSeller> {
    let names: HashMap<&str, &str> = products
        .iter()
        .map(|product| (product.id.as_str(), product.name.as_str()))
        .collect();

    let mut grouped: HashMap<&str, TopSeller> = HashMap::new();
    for item in orders.iter().flat_map(|order| order.items.iter()) {
        let entry = grouped
            .entry(item.product_id.as_str())
            .or_insert_with(|| TopSeller {
                product_id: item.product_id.clone(),
                name: names
                    .get(item.product_id.as_str())
                    .copied()
                    .or_else(|| Some(item.product_name.as_str()).filter(|name| !name.is_empty()))
                    .unwrap_or(item.product_id.as_str())
                    .to_string(),
                total_sold: 0,
                revenue: Money::zero(),
            });
        entry.total_sold += item.quantity;
        entry.revenue += item.line_total();
    }

    let mut ranked: Vec<TopSeller> = grouped.into_values().collect();
    ranked.sort_by(|a, b| {
        b.total_sold
            .cmp(&a.total_sold)
            .then_with(|| b.revenue.cmp(&a.revenue))
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    ranked.truncate(limit);
    ranked
}

/// Products at or below their alert level, in catalog order.
pub fn low_stock_alerts(products: &[Product], limit: usize) -> Vec<LowStockAlert> {
    products
        .iter()
        .filter(|product| product.is_low_stock())
        .take(limit)
        .map(|product| LowStockAlert {
            product_id: product.id.clone(),
            name: product.name.clone(),
            stock_quantity: product.stock_quantity,
            min_stock_alert: product.min_stock_alert,
        })
        .collect()
}

/// Lifetime revenue, cost and profit per product, most profitable first.
pub fn per_product_profitability(products: &[Product]) -> Vec<ProductProfitability> {
    let mut rows: Vec<ProductProfitability> = products
        .iter()
        .map(|product| {
            let revenue = product.price().multiply_quantity(product.total_sold);
            let cost = product.cost_price().multiply_quantity(product.total_sold);
            let profit = revenue - cost;
            ProductProfitability {
                product_id: product.id.clone(),
                name: product.name.clone(),
                revenue,
                cost,
                profit,
                margin: profit.percentage_of(revenue),
            }
        })
        .collect();

    // Stable: equal profits keep catalog order.
    rows.sort_by(|a, b| b.profit.cmp(&a.profit));
    rows
}

// =============================================================================
// Breakdowns
// =============================================================================

/// Expense totals per category with their share of all expenses.
///
/// Categories without spending are left out. Output follows
/// `ExpenseCategory::ALL` order.
pub fn expenses_by_category(expenses: &[Expense]) -> Vec<CategoryExpense> {
    let total = total_expenses(expenses);

    ExpenseCategory::ALL
        .iter()
        .map(|&category| {
            let amount: Money = expenses
                .iter()
                .filter(|expense| expense.category == category)
                .map(Expense::amount)
                .sum();
            CategoryExpense {
                category,
                amount,
                percentage: amount.percentage_of(total),
            }
        })
        .filter(|row| row.amount.is_positive())
        .collect()
}

/// Revenue, expenses and profit per calendar month.
///
/// Only months with at least one order or expense appear. The last `window`
/// months are kept, oldest first.
pub fn revenue_by_month(
    orders: &[&Order],
    expenses: &[Expense],
    window: usize,
) -> Vec<MonthlyFinancials> {
    let mut buckets: BTreeMap<String, (Money, Money)> = BTreeMap::new();

    for order in orders {
        let key = order.created_at.format("%Y-%m").to_string();
        buckets.entry(key).or_default().0 += order.total_amount();
    }

    for expense in expenses {
        let key = expense.expense_date.format("%Y-%m").to_string();
        buckets.entry(key).or_default().1 += expense.amount();
    }

    let skip = buckets.len().saturating_sub(window);
    buckets
        .into_iter()
        .skip(skip)
        .map(|(month, (revenue, expenses))| MonthlyFinancials {
            month,
            revenue,
            expenses,
            profit: revenue - expenses,
        })
        .collect()
}

// =============================================================================
// Snapshot
// =============================================================================

/// Computes the full dashboard snapshot in one pass over the inputs.
pub fn compute_financial_stats(
    orders: &[Order],
    products: &[Product],
    expenses: &[Expense],
    limits: &ReportLimits,
) -> FinancialStats {
    let recognized = filter_recognized_revenue_orders(orders);
    let revenue = total_revenue(&recognized);
    let spent = total_expenses(expenses);
    let profit = total_profit(revenue, spent);

    FinancialStats {
        total_revenue: revenue,
        total_expenses: spent,
        total_profit: profit,
        profit_margin: profit_margin(profit, revenue),
        recognized_orders: recognized.len(),
        top_selling_products: top_selling_products(&recognized, products, limits.top_sellers),
        low_stock_alerts: low_stock_alerts(products, limits.low_stock),
        product_profitability: per_product_profitability(products),
        expenses_by_category: expenses_by_category(expenses),
        revenue_by_month: revenue_by_month(&recognized, expenses, limits.months),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderItem, OrderStatus, PaymentMethod, PaymentStatus};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn order(
        id: &str,
        month: u32,
        total: i64,
        status: OrderStatus,
        payment_status: PaymentStatus,
        items: Vec<(&str, i64, i64)>,
    ) -> Order {
        let created_at = Utc.with_ymd_and_hms(2026, month, 15, 10, 0, 0).unwrap();
        Order {
            id: id.to_string(),
            customer_name: "Awa Diop".to_string(),
            customer_email: "awa@example.com".to_string(),
            shipping_address: "12 Rue des Jouets".to_string(),
            items: items
                .into_iter()
                .map(|(product_id, quantity, price)| OrderItem {
                    product_id: product_id.to_string(),
                    product_name: String::new(),
                    quantity,
                    price,
                })
                .collect(),
            subtotal: total,
            shipping_cost: 0,
            discount: 0,
            total,
            promo_code_id: None,
            payment_method: PaymentMethod::MobileMoney,
            status,
            payment_status,
            transaction_id: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn product(id: &str, price: i64, cost: i64, stock: i64, min_alert: i64, sold: i64) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            name: format!("Toy {}", id),
            category: "toys".to_string(),
            price,
            cost_price: cost,
            stock_quantity: stock,
            min_stock_alert: min_alert,
            total_sold: sold,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn expense(category: ExpenseCategory, amount: i64, month: u32) -> Expense {
        Expense {
            id: format!("exp-{:?}-{}", category, month),
            product_id: None,
            category,
            description: "test".to_string(),
            amount,
            quantity: None,
            expense_date: NaiveDate::from_ymd_opt(2026, month, 3).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_recognized_revenue_filter() {
        let orders = vec![
            order("a", 1, 100, OrderStatus::Delivered, PaymentStatus::Pending, vec![]),
            order("b", 1, 200, OrderStatus::Confirmed, PaymentStatus::Done, vec![]),
            order("c", 1, 400, OrderStatus::Pending, PaymentStatus::Pending, vec![]),
            order("d", 1, 800, OrderStatus::Cancelled, PaymentStatus::Failed, vec![]),
        ];
        let recognized = filter_recognized_revenue_orders(&orders);

        assert_eq!(recognized.len(), 2);
        assert_eq!(total_revenue(&recognized).units(), 300);
    }

    #[test]
    fn test_dashboard_scenario() {
        let orders = vec![
            order("a", 3, 60_000, OrderStatus::Delivered, PaymentStatus::Done, vec![]),
            order("b", 3, 40_000, OrderStatus::Shipped, PaymentStatus::Done, vec![]),
        ];
        let expenses = vec![
            expense(ExpenseCategory::Stock, 50_000, 3),
            expense(ExpenseCategory::Marketing, 10_000, 3),
        ];

        let stats = compute_financial_stats(&orders, &[], &expenses, &ReportLimits::default());

        assert_eq!(stats.total_revenue.units(), 100_000);
        assert_eq!(stats.total_expenses.units(), 60_000);
        assert_eq!(stats.total_profit.units(), 40_000);
        assert!((stats.profit_margin - 40.0).abs() < 1e-9);

        let categories = &stats.expenses_by_category;
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].category, ExpenseCategory::Stock);
        assert_eq!(categories[0].amount.units(), 50_000);
        assert!((categories[0].percentage - 83.333).abs() < 0.01);
        assert_eq!(categories[1].category, ExpenseCategory::Marketing);
        assert!((categories[1].percentage - 16.667).abs() < 0.01);
    }

    #[test]
    fn test_empty_inputs() {
        let stats = compute_financial_stats(&[], &[], &[], &ReportLimits::default());

        assert_eq!(stats.total_revenue, Money::zero());
        assert_eq!(stats.total_profit, Money::zero());
        assert_eq!(stats.profit_margin, 0.0);
        assert!(stats.top_selling_products.is_empty());
        assert!(stats.expenses_by_category.is_empty());
        assert!(stats.revenue_by_month.is_empty());
    }

    #[test]
    fn test_negative_profit() {
        let orders = vec![order("a", 1, 1_000, OrderStatus::Delivered, PaymentStatus::Done, vec![])];
        let expenses = vec![expense(ExpenseCategory::Transport, 3_000, 1)];
        let stats = compute_financial_stats(&orders, &[], &expenses, &ReportLimits::default());

        assert_eq!(stats.total_profit.units(), -2_000);
        assert!((stats.profit_margin + 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_selling_products_ranking() {
        let orders = vec![
            order(
                "a",
                1,
                0,
                OrderStatus::Delivered,
                PaymentStatus::Done,
                vec![("kite", 3, 1_000), ("robot", 2, 12_000), ("ball", 3, 500)],
            ),
            order(
                "b",
                1,
                0,
                OrderStatus::Delivered,
                PaymentStatus::Done,
                vec![("robot", 1, 12_000), ("yoyo", 1, 300)],
            ),
        ];
        let orders: Vec<&Order> = orders.iter().collect();
        let products = vec![product("robot", 12_000, 7_000, 10, 2, 3)];

        let top = top_selling_products(&orders, &products, 3);
        let ids: Vec<&str> = top.iter().map(|row| row.product_id.as_str()).collect();

        // robot and kite tie on units; robot earns more. ball ties kite on
        // units but earns less.
        assert_eq!(ids, vec!["robot", "kite", "ball"]);
        assert_eq!(top[0].name, "Toy robot");
        assert_eq!(top[0].revenue.units(), 36_000);
        // Unknown products fall back to their id
        assert_eq!(top[1].name, "kite");
        assert!(top.windows(2).all(|w| w[0].total_sold >= w[1].total_sold));
    }

    #[test]
    fn test_low_stock_alerts_keep_catalog_order() {
        let products = vec![
            product("a", 100, 50, 1, 5, 0),
            product("b", 100, 50, 10, 5, 0),
            product("c", 100, 50, 5, 5, 0),
            product("d", 100, 50, 0, 0, 0),
        ];

        let alerts = low_stock_alerts(&products, 5);
        let ids: Vec<&str> = alerts.iter().map(|a| a.product_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "d"]);

        assert_eq!(low_stock_alerts(&products, 2).len(), 2);
    }

    #[test]
    fn test_per_product_profitability() {
        let products = vec![
            product("slow", 1_000, 600, 10, 2, 1),
            product("hit", 12_000, 7_000, 10, 2, 10),
            product("unsold", 5_000, 4_000, 10, 2, 0),
        ];

        let rows = per_product_profitability(&products);

        assert_eq!(rows[0].product_id, "hit");
        assert_eq!(rows[0].revenue.units(), 120_000);
        assert_eq!(rows[0].cost.units(), 70_000);
        assert_eq!(rows[0].profit.units(), 50_000);
        assert!((rows[0].margin - 41.666).abs() < 0.01);
        assert_eq!(rows[2].product_id, "unsold");
        assert_eq!(rows[2].margin, 0.0);
    }

    #[test]
    fn test_revenue_by_month_window() {
        let orders: Vec<Order> = (1..=8)
            .map(|month| {
                order(
                    &format!("o{}", month),
                    month,
                    1_000 * month as i64,
                    OrderStatus::Delivered,
                    PaymentStatus::Done,
                    vec![],
                )
            })
            .collect();
        let recognized = filter_recognized_revenue_orders(&orders);
        let expenses = vec![expense(ExpenseCategory::Other, 500, 8)];

        let months = revenue_by_month(&recognized, &expenses, 6);

        assert_eq!(months.len(), 6);
        assert_eq!(months[0].month, "2026-03");
        assert_eq!(months[5].month, "2026-08");
        assert_eq!(months[5].revenue.units(), 8_000);
        assert_eq!(months[5].expenses.units(), 500);
        assert_eq!(months[5].profit.units(), 7_500);
    }
}
