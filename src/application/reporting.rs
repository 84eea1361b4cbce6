use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Expense, Invoice, Product, ReturnRecord};

/// Products with fewer units than this (but more than zero) count as low
/// stock in the inventory report.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesReport {
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub transaction_count: usize,
    pub units_sold: i64,
    /// Sum of invoice net totals (after discounts).
    pub net_revenue: f64,
    pub total_refunds: f64,
    /// Cost of goods actually kept by customers: sold cost minus returned
    /// cost, both valued at the cost snapshots taken at sale time.
    pub cost_of_goods: f64,
    pub total_expenses: f64,
    pub net_profit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReport {
    pub product_count: usize,
    pub total_pieces: i64,
    pub stock_value_at_cost: f64,
    pub stock_value_at_retail: f64,
    pub out_of_stock: usize,
    pub low_stock: usize,
}

fn in_range(ts: DateTime<Utc>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    from.is_none_or(|f| ts >= f) && to.is_none_or(|t| ts <= t)
}

/// Aggregate profit figures over active invoices and returns. Cost figures use
/// the `wholesale_price_at_sale` snapshots, never the live catalog, so the
/// report stays correct after costing updates.
pub fn build_sales_report(
    invoices: &[Invoice],
    returns: &[ReturnRecord],
    expenses: &[Expense],
    from_date: Option<DateTime<Utc>>,
    to_date: Option<DateTime<Utc>>,
) -> SalesReport {
    let invoices: Vec<&Invoice> = invoices
        .iter()
        .filter(|i| !i.is_deleted() && in_range(i.timestamp, from_date, to_date))
        .collect();
    let returns: Vec<&ReturnRecord> = returns
        .iter()
        .filter(|r| !r.is_deleted() && in_range(r.timestamp, from_date, to_date))
        .collect();

    let net_revenue: f64 = invoices.iter().map(|i| i.net_total).sum();
    let units_sold: i64 = invoices
        .iter()
        .flat_map(|i| &i.items)
        .map(|item| item.quantity)
        .sum();
    let sold_cost: f64 = invoices
        .iter()
        .flat_map(|i| &i.items)
        .map(|item| item.quantity as f64 * item.wholesale_price_at_sale)
        .sum();
    let returned_cost: f64 = returns
        .iter()
        .flat_map(|r| &r.items)
        .map(|item| item.quantity as f64 * item.wholesale_price_at_sale)
        .sum();
    let total_refunds: f64 = returns.iter().map(|r| r.total_refund).sum();
    let total_expenses: f64 = expenses
        .iter()
        .filter(|e| in_range(e.timestamp, from_date, to_date))
        .map(|e| e.amount)
        .sum();

    let cost_of_goods = sold_cost - returned_cost;
    SalesReport {
        from_date,
        to_date,
        transaction_count: invoices.len(),
        units_sold,
        net_revenue,
        total_refunds,
        cost_of_goods,
        total_expenses,
        net_profit: net_revenue - total_refunds - cost_of_goods - total_expenses,
    }
}

/// Valuation of the active catalog at current stock levels.
pub fn build_inventory_report(products: &[Product]) -> InventoryReport {
    let active: Vec<&Product> = products.iter().filter(|p| !p.is_deleted()).collect();
    InventoryReport {
        product_count: active.len(),
        total_pieces: active.iter().map(|p| p.stock).sum(),
        stock_value_at_cost: active.iter().map(|p| p.stock as f64 * p.wholesale_price).sum(),
        stock_value_at_retail: active.iter().map(|p| p.stock as f64 * p.retail_price).sum(),
        out_of_stock: active.iter().filter(|p| p.stock == 0).count(),
        low_stock: active
            .iter()
            .filter(|p| p.stock > 0 && p.stock < LOW_STOCK_THRESHOLD)
            .count(),
    }
}
