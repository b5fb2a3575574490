//! # Profitability Calculator
//!
//! Per-sale profit, date-range reports, product and category rollups, and
//! the dashboard summary.
//!
//! ## Profit Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  profit(sale) = (unitPrice − unitCost) × quantity                       │
//! │                                                                         │
//! │  unitCost comes from the CostBasis:                                     │
//! │    Snapshot → cost price captured when the sale was recorded,           │
//! │               falling back to the product's current cost price          │
//! │    Current  → the product's cost price today                            │
//! │                                                                         │
//! │  A sale whose product is gone and carries no snapshot costs 0.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Date Ranges
//! Ranges are inclusive calendar days in UTC: `2024-05-01..=2024-05-31`
//! covers 2024-05-01T00:00:00Z up to 2024-05-31T23:59:59.999Z.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::balance::{debtors, total_payables, total_receivables, PartyBalance};
use crate::error::ValidationResult;
use crate::money::Money;
use crate::stock::low_stock;
use crate::types::{LedgerSnapshot, Product, ProductCategory, Purchase, Sale};
use crate::validation::validate_date_range;

// =============================================================================
// Cost Basis
// =============================================================================

/// Which cost price a sale's profit is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum CostBasis {
    /// Cost captured on the sale when it was recorded.
    #[default]
    Snapshot,
    /// The product's current cost price.
    Current,
}

impl std::fmt::Display for CostBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostBasis::Snapshot => write!(f, "snapshot"),
            CostBasis::Current => write!(f, "current"),
        }
    }
}

impl std::str::FromStr for CostBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "snapshot" | "recorded" => Ok(CostBasis::Snapshot),
            "current" | "live" => Ok(CostBasis::Current),
            other => Err(format!(
                "Unknown cost basis: '{}'. Valid options: snapshot, current",
                other
            )),
        }
    }
}

// =============================================================================
// Date Range
// =============================================================================

/// An inclusive range of UTC calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "String")]
    pub start: NaiveDate,
    #[ts(as = "String")]
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> ValidationResult<Self> {
        validate_date_range(start, end)?;
        Ok(DateRange { start, end })
    }

    /// A single day.
    pub fn day(day: NaiveDate) -> Self {
        DateRange {
            start: day,
            end: day,
        }
    }

    /// Whether an instant falls on one of the range's days.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let day = instant.date_naive();
        self.start <= day && day <= self.end
    }
}

// =============================================================================
// Profit Calculator
// =============================================================================

/// Profit arithmetic over one product catalogue and cost basis.
pub struct ProfitCalculator<'a> {
    products: HashMap<&'a str, &'a Product>,
    basis: CostBasis,
}

impl<'a> ProfitCalculator<'a> {
    pub fn new(products: &'a [Product], basis: CostBasis) -> Self {
        ProfitCalculator {
            products: products.iter().map(|p| (p.id.as_str(), p)).collect(),
            basis,
        }
    }

    pub fn product(&self, product_id: &str) -> Option<&'a Product> {
        self.products.get(product_id).copied()
    }

    /// Cost of one unit of the sale under the configured basis.
    pub fn unit_cost(&self, sale: &Sale) -> Money {
        let current = self.product(&sale.product_id).map(|p| p.cost_price);
        let cost = match self.basis {
            CostBasis::Snapshot => sale.unit_cost.or(current),
            CostBasis::Current => current.or(sale.unit_cost),
        };
        cost.unwrap_or_default()
    }

    pub fn cost_of_goods(&self, sale: &Sale) -> Money {
        self.unit_cost(sale).multiply_quantity(sale.quantity)
    }

    /// `(unitPrice − unitCost) × quantity`
    pub fn profit(&self, sale: &Sale) -> Money {
        (sale.unit_price - self.unit_cost(sale)).multiply_quantity(sale.quantity)
    }

    /// Σ profit over the given sales.
    pub fn total_profit<'s>(&self, sales: impl IntoIterator<Item = &'s Sale>) -> Money {
        sales.into_iter().map(|s| self.profit(s)).sum()
    }
}

// =============================================================================
// Rollups
// =============================================================================

/// Sales and profit for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DailyTotals {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub sales: Money,
    pub profit: Money,
}

/// How one product performed over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductPerformance {
    pub product_id: String,
    /// None when the product no longer exists.
    pub product_name: Option<String>,
    pub quantity_sold: i64,
    pub revenue: Money,
    pub cost: Money,
    pub profit: Money,
}

/// Units sold in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategorySales {
    pub category: ProductCategory,
    pub quantity: i64,
}

/// Groups sales by product, in order of first appearance.
pub fn product_performance<'s>(
    calculator: &ProfitCalculator<'_>,
    sales: impl IntoIterator<Item = &'s Sale>,
) -> Vec<ProductPerformance> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut rows: Vec<ProductPerformance> = Vec::new();

    for sale in sales {
        let slot = *index.entry(sale.product_id.as_str()).or_insert_with(|| {
            rows.push(ProductPerformance {
                product_id: sale.product_id.clone(),
                product_name: calculator.product(&sale.product_id).map(|p| p.name.clone()),
                quantity_sold: 0,
                revenue: Money::zero(),
                cost: Money::zero(),
                profit: Money::zero(),
            });
            rows.len() - 1
        });

        let row = &mut rows[slot];
        let cost = calculator.cost_of_goods(sale);
        row.quantity_sold = row.quantity_sold.saturating_add(sale.quantity);
        row.revenue += sale.total_amount;
        row.cost += cost;
        row.profit += sale.total_amount - cost;
    }

    rows
}

/// Units sold per category, largest first (ties in display order).
///
/// Every category is listed, including those with nothing sold. Sales of
/// products that no longer exist are left out.
pub fn category_sales(sales: &[Sale], products: &[Product]) -> Vec<CategorySales> {
    let categories: HashMap<&str, ProductCategory> = products
        .iter()
        .map(|p| (p.id.as_str(), p.category))
        .collect();

    let mut counts: HashMap<ProductCategory, i64> = HashMap::new();
    for sale in sales {
        if let Some(category) = categories.get(sale.product_id.as_str()) {
            let count = counts.entry(*category).or_default();
            *count = count.saturating_add(sale.quantity);
        }
    }

    let mut rows: Vec<CategorySales> = ProductCategory::ALL
        .iter()
        .map(|c| CategorySales {
            category: *c,
            quantity: counts.get(c).copied().unwrap_or(0),
        })
        .collect();
    rows.sort_by(|a, b| b.quantity.cmp(&a.quantity));
    rows
}

/// The category with the most units sold, if anything was sold.
pub fn best_selling_category(sales: &[Sale], products: &[Product]) -> Option<ProductCategory> {
    category_sales(sales, products)
        .into_iter()
        .find(|c| c.quantity > 0)
        .map(|c| c.category)
}

// =============================================================================
// Profit Report
// =============================================================================

/// Everything the reports screen shows for a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfitReport {
    pub range: DateRange,
    pub total_sales: Money,
    pub total_purchases: Money,
    pub total_profit: Money,
    pub number_of_sales: usize,
    /// One row per day with sales, ascending.
    pub daily: Vec<DailyTotals>,
    /// Top products by revenue.
    pub top_products: Vec<ProductPerformance>,
    /// Every product sold, by profit descending.
    pub profitability: Vec<ProductPerformance>,
}

/// Builds the profit report for `range`.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use duka_core::profit::{profit_report, CostBasis, DateRange};
///
/// let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
/// let report = profit_report(DateRange::day(day), &[], &[], &[], CostBasis::Snapshot, 5);
/// assert_eq!(report.number_of_sales, 0);
/// ```
pub fn profit_report(
    range: DateRange,
    sales: &[Sale],
    purchases: &[Purchase],
    products: &[Product],
    basis: CostBasis,
    top_n: usize,
) -> ProfitReport {
    let calculator = ProfitCalculator::new(products, basis);
    let in_range: Vec<&Sale> = sales.iter().filter(|s| range.contains(s.date)).collect();

    let total_sales: Money = in_range.iter().map(|s| s.total_amount).sum();
    let total_purchases: Money = purchases
        .iter()
        .filter(|p| range.contains(p.date))
        .map(|p| p.total_amount)
        .sum();
    let total_profit = calculator.total_profit(in_range.iter().copied());

    let mut by_day: BTreeMap<NaiveDate, (Money, Money)> = BTreeMap::new();
    for sale in &in_range {
        let entry = by_day.entry(sale.date.date_naive()).or_default();
        entry.0 += sale.total_amount;
        entry.1 += calculator.profit(sale);
    }
    let daily = by_day
        .into_iter()
        .map(|(date, (sales, profit))| DailyTotals {
            date,
            sales,
            profit,
        })
        .collect();

    let performance = product_performance(&calculator, in_range.iter().copied());

    let mut top_products = performance.clone();
    top_products.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    top_products.truncate(top_n);

    let mut profitability = performance;
    profitability.sort_by(|a, b| b.profit.cmp(&a.profit));

    ProfitReport {
        range,
        total_sales,
        total_purchases,
        total_profit,
        number_of_sales: in_range.len(),
        daily,
        top_products,
        profitability,
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// Knobs for [`dashboard_summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardSettings {
    pub cost_basis: CostBasis,
    pub low_stock_threshold: i64,
    /// Length of the recent-sales and top-debtor lists.
    pub top_n: usize,
    /// Days in the sales trend, ending today.
    pub trend_days: u32,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        DashboardSettings {
            cost_basis: CostBasis::default(),
            low_stock_threshold: crate::DEFAULT_LOW_STOCK_THRESHOLD,
            top_n: crate::DEFAULT_TOP_N,
            trend_days: 7,
        }
    }
}

/// Sales total for one trend day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TrendPoint {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub sales: Money,
}

/// The figures on the home screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardSummary {
    /// All-time sales.
    pub total_sales: Money,
    /// Owed by Credit customers.
    pub total_receivables: Money,
    /// Owed to suppliers on Credit purchases.
    pub total_payables: Money,
    /// All-time profit.
    pub total_profit: Money,
    pub best_selling_category: Option<ProductCategory>,
    /// Categories with units sold, largest first.
    pub sales_by_category: Vec<CategorySales>,
    /// One point per day, oldest first, ending today.
    pub sales_trend: Vec<TrendPoint>,
    pub recent_sales: Vec<Sale>,
    pub top_debtors: Vec<PartyBalance>,
    pub low_stock: Vec<Product>,
}

/// Builds the dashboard from a full snapshot.
pub fn dashboard_summary(
    snapshot: &LedgerSnapshot,
    today: NaiveDate,
    settings: DashboardSettings,
) -> DashboardSummary {
    let calculator = ProfitCalculator::new(&snapshot.products, settings.cost_basis);
    let categories = category_sales(&snapshot.sales, &snapshot.products);

    DashboardSummary {
        total_sales: snapshot.sales.iter().map(|s| s.total_amount).sum(),
        total_receivables: total_receivables(&snapshot.customers, &snapshot.sales),
        total_payables: total_payables(&snapshot.purchases),
        total_profit: calculator.total_profit(&snapshot.sales),
        best_selling_category: categories
            .iter()
            .find(|c| c.quantity > 0)
            .map(|c| c.category),
        sales_by_category: categories.into_iter().filter(|c| c.quantity > 0).collect(),
        sales_trend: sales_trend(&snapshot.sales, today, settings.trend_days),
        recent_sales: recent_sales(&snapshot.sales, settings.top_n),
        top_debtors: debtors(&snapshot.customers, &snapshot.sales)
            .into_iter()
            .take(settings.top_n)
            .collect(),
        low_stock: low_stock(&snapshot.products, settings.low_stock_threshold),
    }
}

/// Daily sales for the `days` days ending at `today`, oldest first.
pub fn sales_trend(sales: &[Sale], today: NaiveDate, days: u32) -> Vec<TrendPoint> {
    let mut totals: BTreeMap<NaiveDate, Money> = (0..days)
        .map(|back| (today - Duration::days(i64::from(back)), Money::zero()))
        .collect();

    for sale in sales {
        if let Some(total) = totals.get_mut(&sale.date.date_naive()) {
            *total += sale.total_amount;
        }
    }

    totals
        .into_iter()
        .map(|(date, sales)| TrendPoint { date, sales })
        .collect()
}

/// The `n` most recent sales, newest first.
pub fn recent_sales(sales: &[Sale], n: usize) -> Vec<Sale> {
    let mut recent: Vec<&Sale> = sales.iter().collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    recent.into_iter().take(n).cloned().collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
