//! # Stock Ledger
//!
//! Pure stock arithmetic for sale and purchase events.
//!
//! ## How Stock Moves
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Stock Effects                                   │
//! │                                                                         │
//! │  Event              Same product            Product changed             │
//! │  ────────────────   ─────────────────────   ─────────────────────────  │
//! │  record purchase    +qty                                                │
//! │  record sale        −qty (fails below 0)                                │
//! │  edit purchase      +(new − old)            old: −old   new: +new       │
//! │  edit sale          +(old − new)            old: +old   new: −new       │
//! │  delete sale        +qty                                                │
//! │  delete purchase    −qty, floored at 0                                  │
//! │                                                                         │
//! │  Invariant (absent clamps):                                             │
//! │    stock = Σ purchase.quantity − Σ sale.quantity                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The database layer reads the current stock of every affected product
//! inside its transaction, then calls [`StockAdjustment::apply`] for each.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{Product, Purchase, Sale};

// =============================================================================
// Stock Adjustment
// =============================================================================

/// One signed change to a product's stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: String,

    /// Signed change to apply.
    pub delta: i64,

    /// Units the edited record hands back on this same product before
    /// taking its new quantity. Counted as available when reporting a
    /// shortfall.
    pub reclaimed: i64,
}

impl StockAdjustment {
    /// Stock effect of recording a sale.
    pub fn sale(product_id: impl Into<String>, quantity: i64) -> Self {
        StockAdjustment {
            product_id: product_id.into(),
            delta: -quantity,
            reclaimed: 0,
        }
    }

    /// Stock effect of recording a purchase.
    pub fn purchase(product_id: impl Into<String>, quantity: i64) -> Self {
        StockAdjustment {
            product_id: product_id.into(),
            delta: quantity,
            reclaimed: 0,
        }
    }

    /// Stock effect of deleting a sale.
    pub fn reverse_sale(product_id: impl Into<String>, quantity: i64) -> Self {
        StockAdjustment::purchase(product_id, quantity)
    }

    /// Applies the adjustment to `current`, refusing to go below zero.
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::stock::StockAdjustment;
    ///
    /// assert_eq!(StockAdjustment::sale("p1", 2).apply(10).unwrap(), 8);
    /// assert!(StockAdjustment::sale("p1", 4).apply(3).is_err());
    /// ```
    pub fn apply(&self, current: i64) -> CoreResult<i64> {
        let next = current.saturating_add(self.delta);

        if next < 0 {
            return Err(CoreError::InsufficientStock {
                product_id: self.product_id.clone(),
                available: current.saturating_add(self.reclaimed),
                requested: self.reclaimed.saturating_sub(self.delta),
            });
        }

        Ok(next)
    }

    /// Returns true when applying this adjustment changes nothing.
    pub fn is_noop(&self) -> bool {
        self.delta == 0
    }
}

/// Adjustments for editing a sale from `(old_product, old_qty)` to
/// `(new_product, new_qty)`.
///
/// ## Example
/// ```rust
/// use duka_core::stock::plan_sale_edit;
///
/// // Stock 8 after selling 2; editing the sale to 5 leaves 5.
/// let plan = plan_sale_edit("p1", 2, "p1", 5);
/// assert_eq!(plan.len(), 1);
/// assert_eq!(plan[0].apply(8).unwrap(), 5);
/// ```
pub fn plan_sale_edit(
    old_product: &str,
    old_quantity: i64,
    new_product: &str,
    new_quantity: i64,
) -> Vec<StockAdjustment> {
    if old_product == new_product {
        return vec![StockAdjustment {
            product_id: old_product.to_string(),
            delta: old_quantity - new_quantity,
            reclaimed: old_quantity,
        }];
    }

    vec![
        StockAdjustment::reverse_sale(old_product, old_quantity),
        StockAdjustment::sale(new_product, new_quantity),
    ]
}

/// Adjustments for editing a purchase from `(old_product, old_qty)` to
/// `(new_product, new_qty)`.
///
/// Unlike deletion, an edit that would leave the old product negative
/// (its units were already sold) is refused by [`StockAdjustment::apply`].
pub fn plan_purchase_edit(
    old_product: &str,
    old_quantity: i64,
    new_product: &str,
    new_quantity: i64,
) -> Vec<StockAdjustment> {
    if old_product == new_product {
        return vec![StockAdjustment {
            product_id: old_product.to_string(),
            delta: new_quantity - old_quantity,
            reclaimed: 0,
        }];
    }

    vec![
        StockAdjustment {
            product_id: old_product.to_string(),
            delta: -old_quantity,
            reclaimed: 0,
        },
        StockAdjustment::purchase(new_product, new_quantity),
    ]
}

// =============================================================================
// Purchase Deletion
// =============================================================================

/// Result of taking a deleted purchase's units back out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClampedReversal {
    /// Stock after the reversal, never negative.
    pub stock: i64,

    /// Units that could not be removed because they were already sold.
    pub shortfall: i64,
}

impl ClampedReversal {
    pub fn is_clamped(&self) -> bool {
        self.shortfall > 0
    }
}

/// Removes a deleted purchase's quantity from stock, flooring at zero.
///
/// ## Example
/// ```rust
/// use duka_core::stock::reverse_purchase_clamped;
///
/// assert_eq!(reverse_purchase_clamped(25, 20).stock, 5);
///
/// let clamped = reverse_purchase_clamped(3, 10);
/// assert_eq!(clamped.stock, 0);
/// assert_eq!(clamped.shortfall, 7);
/// ```
pub fn reverse_purchase_clamped(current: i64, quantity: i64) -> ClampedReversal {
    let next = current.saturating_sub(quantity);
    ClampedReversal {
        stock: next.max(0),
        shortfall: next.saturating_neg().max(0),
    }
}

// =============================================================================
// Stock Audit
// =============================================================================

/// A product whose recorded stock disagrees with its event history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockDiscrepancy {
    pub product_id: String,
    pub product_name: String,
    /// Stock stored on the product.
    pub recorded: i64,
    /// Σ purchases − Σ sales for the product.
    pub expected: i64,
}

/// Recomputes every product's stock from live events and lists mismatches.
///
/// Mismatches come from clamped purchase deletions and from restored
/// backups whose stock was edited by hand.
pub fn audit_stock(
    products: &[Product],
    sales: &[Sale],
    purchases: &[Purchase],
) -> Vec<StockDiscrepancy> {
    let mut expected: HashMap<&str, i64> = HashMap::new();

    for purchase in purchases {
        let units = expected.entry(purchase.product_id.as_str()).or_default();
        *units = units.saturating_add(purchase.quantity);
    }
    for sale in sales {
        let units = expected.entry(sale.product_id.as_str()).or_default();
        *units = units.saturating_sub(sale.quantity);
    }

    products
        .iter()
        .filter_map(|product| {
            let expected = expected.get(product.id.as_str()).copied().unwrap_or(0);
            (expected != product.stock).then(|| StockDiscrepancy {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                recorded: product.stock,
                expected,
            })
        })
        .collect()
}

/// Products running low: `0 < stock ≤ threshold`, lowest first.
///
/// Out-of-stock products are excluded; the shop already knows about those.
pub fn low_stock(products: &[Product], threshold: i64) -> Vec<Product> {
    let mut low: Vec<Product> = products
        .iter()
        .filter(|p| p.stock > 0 && p.stock <= threshold)
        .cloned()
        .collect();
    low.sort_by_key(|p| p.stock);
    low
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::{PaymentType, ProductCategory};
    use chrono::Utc;

    fn product(id: &str, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            category: ProductCategory::Other,
            cost_price: Money::from_minor(100),
            selling_price: Money::from_minor(150),
            stock,
        }
    }

    fn sale(product_id: &str, quantity: i64) -> Sale {
        Sale {
            id: format!("sale-{}-{}", product_id, quantity),
            customer_id: "c1".to_string(),
            product_id: product_id.to_string(),
            quantity,
            unit_price: Money::from_minor(150),
            total_amount: Money::from_minor(150 * quantity),
            date: Utc::now(),
            payments: vec![],
            payment_type: PaymentType::Credit,
            unit_cost: None,
        }
    }

    fn purchase(product_id: &str, quantity: i64) -> Purchase {
        Purchase {
            id: format!("pur-{}-{}", product_id, quantity),
            product_id: product_id.to_string(),
            supplier_id: None,
            quantity,
            cost_price: Money::from_minor(100),
            total_amount: Money::from_minor(100 * quantity),
            date: Utc::now(),
            purchase_type: PaymentType::Cash,
            payments: vec![],
        }
    }

    #[test]
    fn test_sale_rejects_negative_stock() {
        let err = StockAdjustment::sale("p1", 4).apply(3).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientStock {
                product_id: "p1".to_string(),
                available: 3,
                requested: 4,
            }
        );
        assert_eq!(StockAdjustment::sale("p1", 3).apply(3).unwrap(), 0);
    }

    #[test]
    fn test_sale_edit_same_product_counts_original_quantity() {
        // Stock 0 after selling all 5; editing to 5 is fine, to 6 is not.
        let plan = plan_sale_edit("p1", 5, "p1", 5);
        assert_eq!(plan[0].apply(0).unwrap(), 0);
        assert!(plan[0].is_noop());

        let plan = plan_sale_edit("p1", 5, "p1", 6);
        match plan[0].apply(0) {
            Err(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }
    }

    #[test]
    fn test_sale_edit_product_change() {
        let plan = plan_sale_edit("p1", 2, "p2", 3);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].apply(8).unwrap(), 10);
        assert_eq!(plan[1].apply(3).unwrap(), 0);
        assert!(plan[1].apply(2).is_err());
    }

    #[test]
    fn test_purchase_edit_refuses_sold_units() {
        // Bought 10, sold 8 (stock 2). Editing the purchase down to 5 would
        // leave -3.
        let plan = plan_purchase_edit("p1", 10, "p1", 5);
        match plan[0].apply(2) {
            Err(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 2);
                assert_eq!(requested, 5);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }

        let plan = plan_purchase_edit("p1", 10, "p1", 15);
        assert_eq!(plan[0].apply(2).unwrap(), 7);
    }

    #[test]
    fn test_purchase_edit_product_change() {
        let plan = plan_purchase_edit("p1", 10, "p2", 4);
        assert_eq!(plan[0].apply(10).unwrap(), 0);
        assert_eq!(plan[1].apply(0).unwrap(), 4);
    }

    #[test]
    fn test_reverse_purchase_clamped() {
        let r = reverse_purchase_clamped(25, 20);
        assert_eq!(r.stock, 5);
        assert!(!r.is_clamped());

        let r = reverse_purchase_clamped(2, 5);
        assert_eq!(r.stock, 0);
        assert_eq!(r.shortfall, 3);
        assert!(r.is_clamped());
    }

    #[test]
    fn test_audit_stock() {
        let products = vec![product("p1", 7), product("p2", 0), product("p3", 4)];
        let purchases = vec![purchase("p1", 10), purchase("p3", 4)];
        let sales = vec![sale("p1", 3), sale("p3", 1)];

        let report = audit_stock(&products, &sales, &purchases);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].product_id, "p3");
        assert_eq!(report[0].recorded, 4);
        assert_eq!(report[0].expected, 3);
    }

    #[test]
    fn test_low_stock() {
        let products = vec![
            product("p1", 5),
            product("p2", 0),
            product("p3", 2),
            product("p4", 6),
        ];

        let low = low_stock(&products, 5);
        let ids: Vec<&str> = low.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p1"]);
    }
}
