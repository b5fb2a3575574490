//! # Sales
//!
//! Recording, editing and deleting sales together with their stock effect.
//!
//! ```text
//! record_sale   stock −= qty                     (refused below zero)
//! edit_sale     same product:  stock += old − new (old qty counts as available)
//!               new product:   old += old qty, new −= new qty
//! delete_sale   stock += qty
//! ```

use duka_core::payments::{ensure_total_covers_payments, initial_payments, settlement_type};
use duka_core::stock::{plan_sale_edit, StockAdjustment};
use duka_core::validation::{line_total, validate_id, validate_price, validate_quantity};
use duka_core::{CoreError, Money, NewSale, Sale, SaleUpdate, Settlement};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use super::LedgerService;
use crate::changes::Collection;
use crate::error::DbResult;
use crate::repository::customer::CustomerRepository;
use crate::repository::generate_id;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;

const SALE_CHANGES: &[Collection] = &[Collection::Sales, Collection::Products];

impl LedgerService {
    /// Records a sale and takes its quantity out of stock.
    ///
    /// Down payments on `input.payments` are stored with the sale; their
    /// sum may not exceed the total. The product's current cost price is
    /// captured on the sale for profit reporting.
    ///
    /// ## Errors
    /// - `Validation` for bad quantities, prices or payment amounts
    /// - `NotFound` when the customer or product does not exist
    /// - `InsufficientStock` when `quantity` exceeds the product's stock
    /// - `Overpayment` when the down payments exceed the total
    pub async fn record_sale(&self, input: NewSale) -> DbResult<Sale> {
        validate_id("customerId", &input.customer_id)?;
        validate_id("productId", &input.product_id)?;
        validate_quantity(input.quantity)?;
        validate_price("unitPrice", input.unit_price)?;
        let total = line_total(input.unit_price, input.quantity)?;

        let input = &input;
        let sale = self
            .run_optimistic("record_sale", move || self.try_record_sale(input, total))
            .await?;

        info!(
            sale_id = %sale.id,
            product_id = %sale.product_id,
            quantity = sale.quantity,
            total = %sale.total_amount,
            "Sale recorded"
        );
        self.publish(SALE_CHANGES).await;
        Ok(sale)
    }

    async fn try_record_sale(&self, input: &NewSale, total: Money) -> DbResult<Sale> {
        let mut tx = self.db.pool().begin().await?;

        require_customer(&mut tx, &input.customer_id).await?;
        let product = ProductRepository::fetch_required(&mut tx, &input.product_id).await?;

        let stock =
            StockAdjustment::sale(&product.value.id, input.quantity).apply(product.value.stock)?;

        let id = generate_id();
        let payments = initial_payments(&id, total, input.payments.clone())?;
        let paid: Money = payments.iter().map(|p| p.amount).sum();

        let sale = Sale {
            id,
            customer_id: input.customer_id.clone(),
            product_id: input.product_id.clone(),
            quantity: input.quantity,
            unit_price: input.unit_price,
            total_amount: total,
            date: input.date,
            payments,
            payment_type: settlement_type(total, paid),
            unit_cost: Some(product.value.cost_price),
        };

        SaleRepository::insert(&mut tx, &sale).await?;
        ProductRepository::set_stock(&mut tx, &product.value.id, stock, product.version).await?;

        tx.commit().await?;
        Ok(sale)
    }

    /// Changes a sale's customer, product, quantity, price or date.
    ///
    /// The old stock effect is reversed and the new one applied in the same
    /// transaction. Payments are kept; the total may not drop below them.
    pub async fn edit_sale(&self, sale_id: &str, update: SaleUpdate) -> DbResult<Sale> {
        validate_id("customerId", &update.customer_id)?;
        validate_id("productId", &update.product_id)?;
        validate_quantity(update.quantity)?;
        validate_price("unitPrice", update.unit_price)?;
        let total = line_total(update.unit_price, update.quantity)?;

        let update = &update;
        let sale = self
            .run_optimistic("edit_sale", move || self.try_edit_sale(sale_id, update, total))
            .await?;

        info!(
            sale_id = %sale.id,
            product_id = %sale.product_id,
            quantity = sale.quantity,
            total = %sale.total_amount,
            "Sale edited"
        );
        self.publish(SALE_CHANGES).await;
        Ok(sale)
    }

    async fn try_edit_sale(
        &self,
        sale_id: &str,
        update: &SaleUpdate,
        total: Money,
    ) -> DbResult<Sale> {
        let mut tx = self.db.pool().begin().await?;

        let existing = SaleRepository::fetch_required(&mut tx, sale_id).await?;
        let old = &existing.value;

        require_customer(&mut tx, &update.customer_id).await?;
        let new_product = ProductRepository::fetch_required(&mut tx, &update.product_id).await?;
        ensure_total_covers_payments(old, total)?;

        let plan = plan_sale_edit(
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
                // Old product vanished (restored backup); nothing to hand back
                None => warn!(
                    sale_id = %old.id,
                    product_id = %adjustment.product_id,
                    "Skipping stock reversal for missing product"
                ),
            }
        }

        let unit_cost = if old.product_id == update.product_id {
            old.unit_cost.or(Some(new_product.value.cost_price))
        } else {
            Some(new_product.value.cost_price)
        };

        let mut sale = Sale {
            id: old.id.clone(),
            customer_id: update.customer_id.clone(),
            product_id: update.product_id.clone(),
            quantity: update.quantity,
            unit_price: update.unit_price,
            total_amount: total,
            date: update.date,
            payments: old.payments.clone(),
            payment_type: old.payment_type,
            unit_cost,
        };
        sale.refresh_settlement();

        SaleRepository::update(&mut tx, &sale, existing.version).await?;

        tx.commit().await?;
        Ok(sale)
    }

    /// Deletes a sale and puts its quantity back into stock.
    ///
    /// Returns the removed sale.
    pub async fn delete_sale(&self, sale_id: &str) -> DbResult<Sale> {
        let sale = self
            .run_optimistic("delete_sale", move || self.try_delete_sale(sale_id))
            .await?;

        info!(
            sale_id = %sale.id,
            product_id = %sale.product_id,
            quantity = sale.quantity,
            "Sale deleted"
        );
        self.publish(SALE_CHANGES).await;
        Ok(sale)
    }

    async fn try_delete_sale(&self, sale_id: &str) -> DbResult<Sale> {
        let mut tx = self.db.pool().begin().await?;

        let existing = SaleRepository::fetch_required(&mut tx, sale_id).await?;
        remove_sale(&mut tx, &existing.value, existing.version).await?;

        tx.commit().await?;
        Ok(existing.value)
    }
}

// =============================================================================
// Shared Transaction Steps
// =============================================================================

/// Fails with `NotFound` unless the customer exists.
async fn require_customer(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<()> {
    if CustomerRepository::fetch(conn, customer_id).await?.is_none() {
        return Err(CoreError::not_found("Customer", customer_id).into());
    }
    Ok(())
}

/// Restores the sale's quantity to its product and deletes the row.
///
/// Shared by `delete_sale` and the customer cascade.
pub(crate) async fn remove_sale(
    conn: &mut SqliteConnection,
    sale: &Sale,
    version: i64,
) -> DbResult<()> {
    match ProductRepository::fetch(conn, &sale.product_id).await? {
        Some(product) => {
            let stock = StockAdjustment::reverse_sale(&sale.product_id, sale.quantity)
                .apply(product.value.stock)?;
            ProductRepository::set_stock(conn, &product.value.id, stock, product.version).await?;
        }
        None => warn!(
            sale_id = %sale.id,
            product_id = %sale.product_id,
            "Skipping stock reversal for missing product"
        ),
    }

    SaleRepository::delete(conn, &sale.id, version).await
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use duka_core::{CoreError, NewPayment, PaymentType, SaleUpdate};

    #[tokio::test]
    async fn test_record_sale_takes_stock() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Body Lotion", 10).await;
        let customer_id = customer(&ledger, "Amina Juma").await;

        let sale = ledger
            .record_sale(sale_input(&customer_id, &product_id, 2, 1_500))
            .await
            .unwrap();

        assert_eq!(sale.total_amount, tzs(3_000));
        assert_eq!(sale.payment_type, PaymentType::Credit);
        assert_eq!(sale.unit_cost, Some(tzs(1_000)));

        let product = ledger.database().products().get(&product_id).await.unwrap();
        assert_eq!(product.stock, 8);
    }

    #[tokio::test]
    async fn test_sale_beyond_stock_is_rejected() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Phone Charger", 3).await;
        let customer_id = customer(&ledger, "Baraka Mushi").await;

        let err = ledger
            .record_sale(sale_input(&customer_id, &product_id, 4, 1_500))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_core(),
            Some(CoreError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            })
        ));
        let product = ledger.database().products().get(&product_id).await.unwrap();
        assert_eq!(product.stock, 3);
        assert_eq!(ledger.database().sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_down_payment_settles_sale() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Kanga", 5).await;
        let customer_id = customer(&ledger, "Neema Said").await;

        let mut input = sale_input(&customer_id, &product_id, 1, 1_500);
        input.payments = vec![NewPayment::new(tzs(1_500), at(2, 10))];
        let sale = ledger.record_sale(input).await.unwrap();
        assert_eq!(sale.payment_type, PaymentType::Cash);

        let mut input = sale_input(&customer_id, &product_id, 1, 1_500);
        input.payments = vec![NewPayment::new(tzs(2_000), at(2, 10))];
        let err = ledger.record_sale(input).await.unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::Overpayment { .. })));

        let product = ledger.database().products().get(&product_id).await.unwrap();
        assert_eq!(product.stock, 4);
    }

    #[tokio::test]
    async fn test_down_payments_beyond_i64_are_overpayment() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Kanga", 5).await;
        let customer_id = customer(&ledger, "Neema Said").await;

        let mut input = sale_input(&customer_id, &product_id, 1, 100);
        input.payments = vec![
            NewPayment::new(tzs(i64::MAX), at(2, 10)),
            NewPayment::new(tzs(i64::MAX), at(2, 11)),
        ];
        let err = ledger.record_sale(input).await.unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::Overpayment { outstanding, .. }) if *outstanding == tzs(100)
        ));

        assert_eq!(ledger.database().sales().count().await.unwrap(), 0);
        assert_eq!(stock_of(&ledger, &product_id).await, 5);
    }

    #[tokio::test]
    async fn test_unknown_customer_is_not_found() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Kanga", 5).await;

        let err = ledger
            .record_sale(sale_input("missing", &product_id, 1, 1_500))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_edit_applies_only_the_delta() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Hair Oil", 10).await;
        let customer_id = customer(&ledger, "Amina Juma").await;

        let sale = ledger
            .record_sale(sale_input(&customer_id, &product_id, 2, 1_500))
            .await
            .unwrap();

        let edited = ledger
            .edit_sale(
                &sale.id,
                SaleUpdate {
                    customer_id: customer_id.clone(),
                    product_id: product_id.clone(),
                    quantity: 5,
                    unit_price: tzs(1_500),
                    date: sale.date,
                },
            )
            .await
            .unwrap();

        assert_eq!(edited.total_amount, tzs(7_500));
        let product = ledger.database().products().get(&product_id).await.unwrap();
        assert_eq!(product.stock, 5);

        // Editing to more than stock + old quantity fails and changes nothing
        let err = ledger
            .edit_sale(
                &sale.id,
                SaleUpdate {
                    customer_id,
                    product_id: product_id.clone(),
                    quantity: 11,
                    unit_price: tzs(1_500),
                    date: sale.date,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::InsufficientStock {
                available: 10,
                requested: 11,
                ..
            })
        ));
        let product = ledger.database().products().get(&product_id).await.unwrap();
        assert_eq!(product.stock, 5);
    }

    #[tokio::test]
    async fn test_edit_moves_stock_between_products() {
        let ledger = ledger().await;
        let lotion = stocked_product(&ledger, "Body Lotion", 10).await;
        let soap = stocked_product(&ledger, "Soap", 4).await;
        let customer_id = customer(&ledger, "Amina Juma").await;

        let sale = ledger
            .record_sale(sale_input(&customer_id, &lotion, 3, 1_500))
            .await
            .unwrap();

        ledger
            .edit_sale(
                &sale.id,
                SaleUpdate {
                    customer_id,
                    product_id: soap.clone(),
                    quantity: 4,
                    unit_price: tzs(900),
                    date: sale.date,
                },
            )
            .await
            .unwrap();

        let products = ledger.database().products();
        assert_eq!(products.get(&lotion).await.unwrap().stock, 10);
        assert_eq!(products.get(&soap).await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_edit_cannot_drop_total_below_payments() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Kitenge", 10).await;
        let customer_id = customer(&ledger, "Neema Said").await;

        let mut input = sale_input(&customer_id, &product_id, 4, 1_000);
        input.payments = vec![NewPayment::new(tzs(3_000), at(2, 10))];
        let sale = ledger.record_sale(input).await.unwrap();

        let err = ledger
            .edit_sale(
                &sale.id,
                SaleUpdate {
                    customer_id,
                    product_id: product_id.clone(),
                    quantity: 2,
                    unit_price: tzs(1_000),
                    date: sale.date,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err.as_core(), Some(CoreError::Overpayment { .. })));
        let product = ledger.database().products().get(&product_id).await.unwrap();
        assert_eq!(product.stock, 6);
    }

    #[tokio::test]
    async fn test_delete_sale_restores_stock() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Earphones", 6).await;
        let customer_id = customer(&ledger, "Baraka Mushi").await;

        let sale = ledger
            .record_sale(sale_input(&customer_id, &product_id, 4, 1_500))
            .await
            .unwrap();
        ledger.delete_sale(&sale.id).await.unwrap();

        let product = ledger.database().products().get(&product_id).await.unwrap();
        assert_eq!(product.stock, 6);
        assert!(ledger.delete_sale(&sale.id).await.unwrap_err().is_not_found());
    }
}
