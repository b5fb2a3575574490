//! # Payments
//!
//! Payments recorded against a sale (customer paying down a debt) or a
//! purchase (the shop paying a supplier). Stock is never touched here.

use duka_core::payments::{delete_payment, record_payment, record_purchase_payment};
use duka_core::{NewPayment, Payment, Settlement};
use tracing::info;

use super::LedgerService;
use crate::changes::Collection;
use crate::error::{DbError, DbResult};
use crate::repository::purchase::PurchaseRepository;
use crate::repository::sale::SaleRepository;

impl LedgerService {
    /// Records a payment against a sale.
    ///
    /// ## Errors
    /// - `NotFound` when the sale does not exist
    /// - `Validation` when the amount is not positive
    /// - `Overpayment` when the amount exceeds the sale's balance
    pub async fn record_sale_payment(
        &self,
        sale_id: &str,
        payment: NewPayment,
    ) -> DbResult<Payment> {
        let payment = &payment;
        let (recorded, balance) = self
            .run_optimistic("record_sale_payment", move || async move {
                let mut tx = self.db.pool().begin().await?;

                let mut sale = SaleRepository::fetch_required(&mut tx, sale_id).await?;
                let recorded = record_payment(&mut sale.value, payment.clone())?;
                SaleRepository::update(&mut tx, &sale.value, sale.version).await?;

                tx.commit().await?;
                Ok::<_, DbError>((recorded, sale.value.balance()))
            })
            .await?;

        info!(
            sale_id = %sale_id,
            payment_id = %recorded.id,
            amount = %recorded.amount,
            balance = %balance,
            "Sale payment recorded"
        );
        self.publish(&[Collection::Sales]).await;
        Ok(recorded)
    }

    /// Removes one payment from a sale. Returns the removed payment.
    pub async fn delete_sale_payment(&self, sale_id: &str, payment_id: &str) -> DbResult<Payment> {
        let removed = self
            .run_optimistic("delete_sale_payment", move || async move {
                let mut tx = self.db.pool().begin().await?;

                let mut sale = SaleRepository::fetch_required(&mut tx, sale_id).await?;
                let removed = delete_payment(&mut sale.value, payment_id)?;
                SaleRepository::update(&mut tx, &sale.value, sale.version).await?;

                tx.commit().await?;
                Ok::<_, DbError>(removed)
            })
            .await?;

        info!(
            sale_id = %sale_id,
            payment_id = %removed.id,
            amount = %removed.amount,
            "Sale payment deleted"
        );
        self.publish(&[Collection::Sales]).await;
        Ok(removed)
    }

    /// Records a payment to a supplier against a purchase.
    ///
    /// ## Errors
    /// - `NotFound` when the purchase does not exist
    /// - `CashPurchaseSettled` when the purchase was paid in cash
    /// - `Validation` / `Overpayment` as for sales
    pub async fn record_purchase_payment(
        &self,
        purchase_id: &str,
        payment: NewPayment,
    ) -> DbResult<Payment> {
        let payment = &payment;
        let (recorded, balance) = self
            .run_optimistic("record_purchase_payment", move || async move {
                let mut tx = self.db.pool().begin().await?;

                let mut purchase = PurchaseRepository::fetch_required(&mut tx, purchase_id).await?;
                let recorded = record_purchase_payment(&mut purchase.value, payment.clone())?;
                PurchaseRepository::update(&mut tx, &purchase.value, purchase.version).await?;

                tx.commit().await?;
                Ok::<_, DbError>((recorded, purchase.value.balance()))
            })
            .await?;

        info!(
            purchase_id = %purchase_id,
            payment_id = %recorded.id,
            amount = %recorded.amount,
            balance = %balance,
            "Supplier payment recorded"
        );
        self.publish(&[Collection::Purchases]).await;
        Ok(recorded)
    }

    /// Removes one payment from a purchase. Returns the removed payment.
    pub async fn delete_purchase_payment(
        &self,
        purchase_id: &str,
        payment_id: &str,
    ) -> DbResult<Payment> {
        let removed = self
            .run_optimistic("delete_purchase_payment", move || async move {
                let mut tx = self.db.pool().begin().await?;

                let mut purchase = PurchaseRepository::fetch_required(&mut tx, purchase_id).await?;
                let removed = delete_payment(&mut purchase.value, payment_id)?;
                PurchaseRepository::update(&mut tx, &purchase.value, purchase.version).await?;

                tx.commit().await?;
                Ok::<_, DbError>(removed)
            })
            .await?;

        info!(
            purchase_id = %purchase_id,
            payment_id = %removed.id,
            amount = %removed.amount,
            "Supplier payment deleted"
        );
        self.publish(&[Collection::Purchases]).await;
        Ok(removed)
    }
}
