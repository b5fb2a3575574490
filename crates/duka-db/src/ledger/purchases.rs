//! # Purchases
//!
//! Recording, editing and deleting purchases together with their stock
//! effect.
//!
//! Deleting a purchase whose units were already sold cannot take them back
//! out of stock. The reversal floors at zero, logs the shortfall, and the
//! mismatch shows up in [`LedgerService::audit_stock`].

use duka_core::payments::{ensure_total_covers_payments, initial_payments, resolve_purchase_type};
use duka_core::stock::{
    plan_purchase_edit, reverse_purchase_clamped, ClampedReversal, StockAdjustment,
};
use duka_core::validation::{line_total, validate_id, validate_price, validate_quantity};
use duka_core::{CoreError, Money, NewPurchase, PaymentType, Purchase, PurchaseUpdate};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use super::LedgerService;
use crate::changes::Collection;
use crate::error::DbResult;
use crate::repository::generate_id;
use crate::repository::product::ProductRepository;
use crate::repository::purchase::PurchaseRepository;
use crate::repository::supplier::SupplierRepository;

const PURCHASE_CHANGES: &[Collection] = &[Collection::Purchases, Collection::Products];

/// Outcome of [`LedgerService::delete_purchase`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDeletion {
    /// The removed purchase.
    pub purchase: Purchase,

    /// Units that stayed counted because they were already sold.
    /// Zero unless the reversal was clamped.
    pub stock_shortfall: i64,
}

impl LedgerService {
    /// Records a purchase and adds its quantity to stock.
    ///
    /// A Credit purchase may carry down payments; once it does, its type
    /// follows its balance. A Cash purchase is settled on the spot and
    /// takes no payments.
    ///
    /// ## Errors
    /// - `Validation` for bad quantities, prices or payment amounts
    /// - `NotFound` when the product or the named supplier does not exist
    /// - `CashPurchaseSettled` when a Cash purchase comes with payments
    /// - `Overpayment` when the down payments exceed the total
    pub async fn record_purchase(&self, input: NewPurchase) -> DbResult<Purchase> {
        validate_id("productId", &input.product_id)?;
        if let Some(supplier_id) = &input.supplier_id {
            validate_id("supplierId", supplier_id)?;
        }
        validate_quantity(input.quantity)?;
        validate_price("costPrice", input.cost_price)?;
        let total = line_total(input.cost_price, input.quantity)?;

        let id = generate_id();
        if input.purchase_type == PaymentType::Cash && !input.payments.is_empty() {
            return Err(CoreError::CashPurchaseSettled { purchase_id: id }.into());
        }

        let (id, input) = (id.as_str(), &input);
        let purchase = self
            .run_optimistic("record_purchase", move || {
                self.try_record_purchase(id, input, total)
            })
            .await?;

        info!(
            purchase_id = %purchase.id,
            product_id = %purchase.product_id,
            quantity = purchase.quantity,
            total = %purchase.total_amount,
            purchase_type = %purchase.purchase_type,
            "Purchase recorded"
        );
        self.publish(PURCHASE_CHANGES).await;
        Ok(purchase)
    }

    async fn try_record_purchase(
        &self,
        id: &str,
        input: &NewPurchase,
        total: Money,
    ) -> DbResult<Purchase> {
        let mut tx = self.db.pool().begin().await?;

        let product = ProductRepository::fetch_required(&mut tx, &input.product_id).await?;
        if let Some(supplier_id) = &input.supplier_id {
            require_supplier(&mut tx, supplier_id).await?;
        }

        let stock = StockAdjustment::purchase(&product.value.id, input.quantity)
            .apply(product.value.stock)?;

        let payments = initial_payments(id, total, input.payments.clone())?;
        let purchase = Purchase {
            id: id.to_string(),
            product_id: input.product_id.clone(),
            supplier_id: input.supplier_id.clone(),
            quantity: input.quantity,
            cost_price: input.cost_price,
            total_amount: total,
            date: input.date,
            purchase_type: resolve_purchase_type(input.purchase_type, total, &payments),
            payments,
        };

        PurchaseRepository::insert(&mut tx, &purchase).await?;
        ProductRepository::set_stock(&mut tx, &product.value.id, stock, product.version).await?;

        tx.commit().await?;
        Ok(purchase)
    }

    /// Changes a purchase's product, supplier, quantity, cost, date or type.
    ///
    /// The old stock effect is reversed and the new one applied. Unlike
    /// deletion, an edit that would leave stock negative is refused with
    /// `InsufficientStock`. Payments are kept; the total may not drop below
    /// them, and a purchase with payments keeps a derived type.
    pub async fn edit_purchase(
        &self,
        purchase_id: &str,
        update: PurchaseUpdate,
    ) -> DbResult<Purchase> {
        validate_id("productId", &update.product_id)?;
        if let Some(supplier_id) = &update.supplier_id {
            validate_id("supplierId", supplier_id)?;
        }
        validate_quantity(update.quantity)?;
        validate_price("costPrice", update.cost_price)?;
        let total = line_total(update.cost_price, update.quantity)?;

        let update = &update;
        let purchase = self
            .run_optimistic("edit_purchase", move || {
                self.try_edit_purchase(purchase_id, update, total)
            })
            .await?;

        info!(
            purchase_id = %purchase.id,
            product_id = %purchase.product_id,
            quantity = purchase.quantity,
            total = %purchase.total_amount,
            "Purchase edited"
        );
        self.publish(PURCHASE_CHANGES).await;
        Ok(purchase)
    }

    async fn try_edit_purchase(
        &self,
        purchase_id: &str,
        update: &PurchaseUpdate,
        total: Money,
    ) -> DbResult<Purchase> {
        let mut tx = self.db.pool().begin().await?;

        let existing = PurchaseRepository::fetch_required(&mut tx, purchase_id).await?;
        let old = &existing.value;

        ProductRepository::fetch_required(&mut tx, &update.product_id).await?;
        if let Some(supplier_id) = &update.supplier_id {
            require_supplier(&mut tx, supplier_id).await?;
        }
        ensure_total_covers_payments(old, total)?;

        let plan = plan_purchase_edit(
            &old.product_id,
            old.quantity,
            &update.product_id,
            update.quantity,
        );
        for adjustment in plan {
            if adjustment.is_noop() {
                continue;
            }
            match ProductRepository::fetch(&mut tx, &adjustment.product_id).await? {
                Some(product) => {
                    let stock = adjustment.apply(product.value.stock)?;
                    ProductRepository::set_stock(&mut tx, &product.value.id, stock, product.version)
                        .await?;
                }
                None => warn!(
                    purchase_id = %old.id,
                    product_id = %adjustment.product_id,
                    "Skipping stock reversal for missing product"
                ),
            }
        }

        let purchase = Purchase {
            id: old.id.clone(),
            product_id: update.product_id.clone(),
            supplier_id: update.supplier_id.clone(),
            quantity: update.quantity,
            cost_price: update.cost_price,
            total_amount: total,
            date: update.date,
            purchase_type: resolve_purchase_type(update.purchase_type, total, &old.payments),
            payments: old.payments.clone(),
        };

        PurchaseRepository::update(&mut tx, &purchase, existing.version).await?;

        tx.commit().await?;
        Ok(purchase)
    }

    /// Deletes a purchase and takes its quantity back out of stock,
    /// flooring at zero.
    pub async fn delete_purchase(&self, purchase_id: &str) -> DbResult<PurchaseDeletion> {
        let deletion = self
            .run_optimistic("delete_purchase", move || {
                self.try_delete_purchase(purchase_id)
            })
            .await?;

        info!(
            purchase_id = %deletion.purchase.id,
            product_id = %deletion.purchase.product_id,
            quantity = deletion.purchase.quantity,
            shortfall = deletion.stock_shortfall,
            "Purchase deleted"
        );
        self.publish(PURCHASE_CHANGES).await;
        Ok(deletion)
    }

    async fn try_delete_purchase(&self, purchase_id: &str) -> DbResult<PurchaseDeletion> {
        let mut tx = self.db.pool().begin().await?;

        let existing = PurchaseRepository::fetch_required(&mut tx, purchase_id).await?;
        let reversal = remove_purchase(&mut tx, &existing.value, existing.version).await?;

        tx.commit().await?;
        Ok(PurchaseDeletion {
            purchase: existing.value,
            stock_shortfall: reversal.map_or(0, |r| r.shortfall),
        })
    }
}

// =============================================================================
// Shared Transaction Steps
// =============================================================================

/// Fails with `NotFound` unless the supplier exists.
async fn require_supplier(conn: &mut SqliteConnection, supplier_id: &str) -> DbResult<()> {
    if SupplierRepository::fetch(conn, supplier_id).await?.is_none() {
        return Err(CoreError::not_found("Supplier", supplier_id).into());
    }
    Ok(())
}

/// Takes the purchase's quantity out of its product (clamped) and deletes
/// the row. `None` when the product no longer exists.
///
/// Shared by `delete_purchase` and the supplier cascade.
pub(crate) async fn remove_purchase(
    conn: &mut SqliteConnection,
    purchase: &Purchase,
    version: i64,
) -> DbResult<Option<ClampedReversal>> {
    let reversal = match ProductRepository::fetch(conn, &purchase.product_id).await? {
        Some(product) => {
            let reversal = reverse_purchase_clamped(product.value.stock, purchase.quantity);
            if reversal.is_clamped() {
                warn!(
                    purchase_id = %purchase.id,
                    product_id = %purchase.product_id,
                    stock = product.value.stock,
                    quantity = purchase.quantity,
                    shortfall = reversal.shortfall,
                    "Purchase reversal clamped at zero stock"
                );
            }
            ProductRepository::set_stock(conn, &product.value.id, reversal.stock, product.version)
                .await?;
            Some(reversal)
        }
        None => {
            warn!(
                purchase_id = %purchase.id,
                product_id = %purchase.product_id,
                "Skipping stock reversal for missing product"
            );
            None
        }
    };

    PurchaseRepository::delete(conn, &purchase.id, version).await?;
    Ok(reversal)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use duka_core::{CoreError, NewPayment, PaymentType, PurchaseUpdate, SaleUpdate};

    #[tokio::test]
    async fn test_record_purchase_adds_stock() {
        let ledger = ledger().await;
        let product_id = product(&ledger, "Body Lotion", 1_000, 1_500).await;
        let supplier_id = supplier(&ledger, "Kariakoo Wholesale").await;

        let purchase = ledger
            .record_purchase(purchase_input(
                &product_id,
                Some(&supplier_id),
                12,
                900,
                PaymentType::Credit,
            ))
            .await
            .unwrap();

        assert_eq!(purchase.total_amount, tzs(10_800));
        assert_eq!(purchase.purchase_type, PaymentType::Credit);
        let product = ledger.database().products().get(&product_id).await.unwrap();
        assert_eq!(product.stock, 12);
        // Buying at a new price does not touch the list cost
        assert_eq!(product.cost_price, tzs(1_000));
    }

    #[tokio::test]
    async fn test_cash_purchase_with_payments_is_refused() {
        let ledger = ledger().await;
        let product_id = product(&ledger, "Soap", 500, 800).await;

        let mut input = purchase_input(&product_id, None, 10, 500, PaymentType::Cash);
        input.payments = vec![NewPayment::new(tzs(1_000), at(1, 8))];

        let err = ledger.record_purchase(input).await.unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::CashPurchaseSettled { .. })
        ));
        assert_eq!(ledger.database().purchases().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fully_paid_credit_purchase_becomes_cash() {
        let ledger = ledger().await;
        let product_id = product(&ledger, "Soap", 500, 800).await;
        let supplier_id = supplier(&ledger, "Mchele Traders").await;

        let mut input =
            purchase_input(&product_id, Some(&supplier_id), 4, 500, PaymentType::Credit);
        input.payments = vec![NewPayment::new(tzs(2_000), at(1, 8))];

        let purchase = ledger.record_purchase(input).await.unwrap();
        assert_eq!(purchase.purchase_type, PaymentType::Cash);
        assert!(purchase.is_on_account());
    }

    #[tokio::test]
    async fn test_unknown_supplier_is_not_found() {
        let ledger = ledger().await;
        let product_id = product(&ledger, "Soap", 500, 800).await;

        let err = ledger
            .record_purchase(purchase_input(
                &product_id,
                Some("missing"),
                1,
                500,
                PaymentType::Credit,
            ))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_purchase_reverses_stock() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Perfume", 5).await;

        let purchase = ledger
            .record_purchase(purchase_input(&product_id, None, 20, 1_000, PaymentType::Cash))
            .await
            .unwrap();
        assert_eq!(
            ledger.database().products().get(&product_id).await.unwrap().stock,
            25
        );

        let deletion = ledger.delete_purchase(&purchase.id).await.unwrap();
        assert_eq!(deletion.stock_shortfall, 0);
        assert_eq!(
            ledger.database().products().get(&product_id).await.unwrap().stock,
            5
        );
    }

    #[tokio::test]
    async fn test_delete_sold_purchase_clamps_at_zero() {
        let ledger = ledger().await;
        let product_id = product(&ledger, "Sandals", 2_000, 3_500).await;
        let customer_id = customer(&ledger, "Amina Juma").await;

        let purchase = ledger
            .record_purchase(purchase_input(&product_id, None, 10, 2_000, PaymentType::Cash))
            .await
            .unwrap();
        ledger
            .record_sale(sale_input(&customer_id, &product_id, 7, 3_500))
            .await
            .unwrap();

        let deletion = ledger.delete_purchase(&purchase.id).await.unwrap();
        assert_eq!(deletion.stock_shortfall, 7);
        assert_eq!(
            ledger.database().products().get(&product_id).await.unwrap().stock,
            0
        );

        let discrepancies = ledger.audit_stock().await.unwrap();
        assert_eq!(discrepancies.len(), 1);
        assert_eq!(discrepancies[0].expected, -7);
    }

    #[tokio::test]
    async fn test_edit_below_sold_units_is_refused() {
        let ledger = ledger().await;
        let product_id = product(&ledger, "Sandals", 2_000, 3_500).await;
        let customer_id = customer(&ledger, "Amina Juma").await;

        let purchase = ledger
            .record_purchase(purchase_input(&product_id, None, 10, 2_000, PaymentType::Cash))
            .await
            .unwrap();
        ledger
            .record_sale(sale_input(&customer_id, &product_id, 7, 3_500))
            .await
            .unwrap();

        let update = PurchaseUpdate {
            product_id: product_id.clone(),
            supplier_id: None,
            quantity: 5,
            cost_price: tzs(2_000),
            date: purchase.date,
            purchase_type: PaymentType::Cash,
        };
        let err = ledger.edit_purchase(&purchase.id, update.clone()).await.unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::InsufficientStock { .. })
        ));

        let edited = ledger
            .edit_purchase(
                &purchase.id,
                PurchaseUpdate {
                    quantity: 8,
                    ..update
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.total_amount, tzs(16_000));
        assert_eq!(
            ledger.database().products().get(&product_id).await.unwrap().stock,
            1
        );
    }

    #[tokio::test]
    async fn test_mixed_history_matches_stock_audit() {
        let ledger = ledger().await;
        let lotion = product(&ledger, "Body Lotion", 1_000, 1_500).await;
        let sandals = product(&ledger, "Sandals", 2_000, 3_500).await;
        let customer_id = customer(&ledger, "Amina Juma").await;

        let p1 = ledger
            .record_purchase(purchase_input(&lotion, None, 10, 1_000, PaymentType::Cash))
            .await
            .unwrap();
        let p2 = ledger
            .record_purchase(purchase_input(&sandals, None, 5, 2_000, PaymentType::Cash))
            .await
            .unwrap();
        let p3 = ledger
            .record_purchase(purchase_input(&sandals, None, 8, 2_000, PaymentType::Cash))
            .await
            .unwrap();
        let s1 = ledger
            .record_sale(sale_input(&customer_id, &lotion, 3, 1_500))
            .await
            .unwrap();
        let s2 = ledger
            .record_sale(sale_input(&customer_id, &sandals, 2, 3_500))
            .await
            .unwrap();
        assert_eq!(stock_of(&ledger, &lotion).await, 7);
        assert_eq!(stock_of(&ledger, &sandals).await, 11);

        // Same product, more units
        ledger
            .edit_purchase(
                &p1.id,
                PurchaseUpdate {
                    product_id: lotion.clone(),
                    supplier_id: None,
                    quantity: 12,
                    cost_price: tzs(1_000),
                    date: p1.date,
                    purchase_type: PaymentType::Cash,
                },
            )
            .await
            .unwrap();
        assert_eq!(stock_of(&ledger, &lotion).await, 9);

        // Moved to another product
        ledger
            .edit_purchase(
                &p2.id,
                PurchaseUpdate {
                    product_id: lotion.clone(),
                    supplier_id: None,
                    quantity: 4,
                    cost_price: tzs(1_000),
                    date: p2.date,
                    purchase_type: PaymentType::Cash,
                },
            )
            .await
            .unwrap();
        assert_eq!(stock_of(&ledger, &lotion).await, 13);
        assert_eq!(stock_of(&ledger, &sandals).await, 6);

        ledger
            .edit_sale(
                &s1.id,
                SaleUpdate {
                    customer_id: customer_id.clone(),
                    product_id: lotion.clone(),
                    quantity: 5,
                    unit_price: tzs(1_500),
                    date: s1.date,
                },
            )
            .await
            .unwrap();
        ledger
            .edit_sale(
                &s2.id,
                SaleUpdate {
                    customer_id: customer_id.clone(),
                    product_id: lotion.clone(),
                    quantity: 1,
                    unit_price: tzs(1_500),
                    date: s2.date,
                },
            )
            .await
            .unwrap();
        assert_eq!(stock_of(&ledger, &lotion).await, 10);
        assert_eq!(stock_of(&ledger, &sandals).await, 8);

        ledger.delete_sale(&s1.id).await.unwrap();
        let deletion = ledger.delete_purchase(&p3.id).await.unwrap();
        assert_eq!(deletion.stock_shortfall, 0);

        // Lotion: bought 12 + 4, sold 1. Sandals: nothing left on either side.
        assert_eq!(stock_of(&ledger, &lotion).await, 15);
        assert_eq!(stock_of(&ledger, &sandals).await, 0);
        assert!(ledger.audit_stock().await.unwrap().is_empty());
    }
}
