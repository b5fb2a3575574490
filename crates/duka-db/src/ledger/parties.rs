//! # Parties and Products
//!
//! Adding, updating and deleting customers, suppliers and products.
//!
//! ## Cascading Deletes
//! ```text
//! delete_customer ──► every sale of the customer is deleted
//!                     (stock restored per sale), then the customer
//!
//! delete_supplier ──► every purchase from the supplier is deleted
//!                     (stock reduced per purchase, floored at zero),
//!                     then the supplier
//!
//! delete_product  ──► refused with ProductInUse while any sale or
//!                     purchase references it
//! ```
//!
//! Each cascade runs in one transaction.

use duka_core::validation::{validate_customer, validate_product, validate_supplier};
use duka_core::{
    CoreError, Customer, CustomerDetails, NewProduct, Product, ProductUpdate, Supplier,
    SupplierDetails,
};
use serde::Serialize;
use tracing::info;

use super::purchases::remove_purchase;
use super::sales::remove_sale;
use super::LedgerService;
use crate::changes::Collection;
use crate::error::{DbError, DbResult};
use crate::repository::customer::CustomerRepository;
use crate::repository::generate_id;
use crate::repository::product::ProductRepository;
use crate::repository::purchase::PurchaseRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::supplier::SupplierRepository;

/// What a cascading party deletion removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeSummary {
    /// Sales or purchases deleted along with the party.
    pub records_removed: usize,

    /// Purchased units that could not be taken out of stock because they
    /// were already sold. Always zero for customers.
    pub stock_shortfall: i64,
}

impl LedgerService {
    // =========================================================================
    // Customers
    // =========================================================================

    /// Adds a customer.
    pub async fn add_customer(&self, details: CustomerDetails) -> DbResult<Customer> {
        validate_customer(&details)?;
        let customer = Customer::from_details(generate_id(), details);

        let customer_ref = &customer;
        self.run_optimistic("add_customer", move || async move {
            let mut conn = self.db.pool().acquire().await?;
            CustomerRepository::insert(&mut conn, customer_ref).await
        })
        .await?;

        info!(customer_id = %customer.id, name = %customer.name, "Customer added");
        self.publish(&[Collection::Customers]).await;
        Ok(customer)
    }

    /// Replaces a customer's details.
    pub async fn update_customer(
        &self,
        customer_id: &str,
        details: CustomerDetails,
    ) -> DbResult<Customer> {
        validate_customer(&details)?;
        let customer = Customer::from_details(customer_id, details);

        let customer_ref = &customer;
        self.run_optimistic("update_customer", move || async move {
            let mut tx = self.db.pool().begin().await?;
            let existing = CustomerRepository::fetch(&mut tx, &customer_ref.id)
                .await?
                .ok_or_else(|| DbError::not_found("Customer", &customer_ref.id))?;
            CustomerRepository::update(&mut tx, customer_ref, existing.version).await?;
            tx.commit().await?;
            Ok::<_, DbError>(())
        })
        .await?;

        info!(customer_id = %customer.id, "Customer updated");
        self.publish(&[Collection::Customers]).await;
        Ok(customer)
    }

    /// Deletes a customer and every sale made to them, restoring stock.
    pub async fn delete_customer(&self, customer_id: &str) -> DbResult<CascadeSummary> {
        let summary = self
            .run_optimistic("delete_customer", move || async move {
                let mut tx = self.db.pool().begin().await?;

                let customer = CustomerRepository::fetch(&mut tx, customer_id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Customer", customer_id))?;

                let sales =
                    SaleRepository::fetch_versioned_by_customer(&mut tx, customer_id).await?;
                for sale in &sales {
                    remove_sale(&mut tx, &sale.value, sale.version).await?;
                }
                CustomerRepository::delete(&mut tx, customer_id, customer.version).await?;

                tx.commit().await?;
                Ok::<_, DbError>(CascadeSummary {
                    records_removed: sales.len(),
                    stock_shortfall: 0,
                })
            })
            .await?;

        info!(
            customer_id = %customer_id,
            sales_removed = summary.records_removed,
            "Customer deleted"
        );
        self.publish(&[Collection::Customers, Collection::Sales, Collection::Products])
            .await;
        Ok(summary)
    }

    // =========================================================================
    // Suppliers
    // =========================================================================

    /// Adds a supplier.
    pub async fn add_supplier(&self, details: SupplierDetails) -> DbResult<Supplier> {
        validate_supplier(&details)?;
        let supplier = Supplier::from_details(generate_id(), details);

        let supplier_ref = &supplier;
        self.run_optimistic("add_supplier", move || async move {
            let mut conn = self.db.pool().acquire().await?;
            SupplierRepository::insert(&mut conn, supplier_ref).await
        })
        .await?;

        info!(supplier_id = %supplier.id, name = %supplier.name, "Supplier added");
        self.publish(&[Collection::Suppliers]).await;
        Ok(supplier)
    }

    /// Replaces a supplier's details.
    pub async fn update_supplier(
        &self,
        supplier_id: &str,
        details: SupplierDetails,
    ) -> DbResult<Supplier> {
        validate_supplier(&details)?;
        let supplier = Supplier::from_details(supplier_id, details);

        let supplier_ref = &supplier;
        self.run_optimistic("update_supplier", move || async move {
            let mut tx = self.db.pool().begin().await?;
            let existing = SupplierRepository::fetch(&mut tx, &supplier_ref.id)
                .await?
                .ok_or_else(|| DbError::not_found("Supplier", &supplier_ref.id))?;
            SupplierRepository::update(&mut tx, supplier_ref, existing.version).await?;
            tx.commit().await?;
            Ok::<_, DbError>(())
        })
        .await?;

        info!(supplier_id = %supplier.id, "Supplier updated");
        self.publish(&[Collection::Suppliers]).await;
        Ok(supplier)
    }

    /// Deletes a supplier and every purchase from them, taking the bought
    /// units back out of stock (floored at zero).
    pub async fn delete_supplier(&self, supplier_id: &str) -> DbResult<CascadeSummary> {
        let summary = self
            .run_optimistic("delete_supplier", move || async move {
                let mut tx = self.db.pool().begin().await?;

                let supplier = SupplierRepository::fetch(&mut tx, supplier_id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Supplier", supplier_id))?;

                let purchases =
                    PurchaseRepository::fetch_versioned_by_supplier(&mut tx, supplier_id).await?;
                let mut shortfall = 0;
                for purchase in &purchases {
                    if let Some(reversal) =
                        remove_purchase(&mut tx, &purchase.value, purchase.version).await?
                    {
                        shortfall += reversal.shortfall;
                    }
                }
                SupplierRepository::delete(&mut tx, supplier_id, supplier.version).await?;

                tx.commit().await?;
                Ok::<_, DbError>(CascadeSummary {
                    records_removed: purchases.len(),
                    stock_shortfall: shortfall,
                })
            })
            .await?;

        info!(
            supplier_id = %supplier_id,
            purchases_removed = summary.records_removed,
            shortfall = summary.stock_shortfall,
            "Supplier deleted"
        );
        self.publish(&[
            Collection::Suppliers,
            Collection::Purchases,
            Collection::Products,
        ])
        .await;
        Ok(summary)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Adds a product with zero stock.
    pub async fn add_product(&self, input: NewProduct) -> DbResult<Product> {
        validate_product(&input)?;
        let product = Product {
            id: generate_id(),
            name: input.name,
            category: input.category,
            cost_price: input.cost_price,
            selling_price: input.selling_price,
            stock: 0,
        };

        let product_ref = &product;
        self.run_optimistic("add_product", move || async move {
            let mut conn = self.db.pool().acquire().await?;
            ProductRepository::insert(&mut conn, product_ref).await
        })
        .await?;

        info!(product_id = %product.id, name = %product.name, "Product added");
        self.publish(&[Collection::Products]).await;
        Ok(product)
    }

    /// Edits a product's name, category and prices. Stock is kept.
    pub async fn update_product(
        &self,
        product_id: &str,
        update: ProductUpdate,
    ) -> DbResult<Product> {
        validate_product(&update)?;

        let update = &update;
        let product = self
            .run_optimistic("update_product", move || async move {
                let mut tx = self.db.pool().begin().await?;

                let existing = ProductRepository::fetch_required(&mut tx, product_id).await?;
                let product = Product {
                    id: existing.value.id,
                    name: update.name.clone(),
                    category: update.category,
                    cost_price: update.cost_price,
                    selling_price: update.selling_price,
                    stock: existing.value.stock,
                };
                ProductRepository::update(&mut tx, &product, existing.version).await?;

                tx.commit().await?;
                Ok::<_, DbError>(product)
            })
            .await?;

        info!(product_id = %product.id, "Product updated");
        self.publish(&[Collection::Products]).await;
        Ok(product)
    }

    /// Deletes a product nothing references.
    ///
    /// ## Errors
    /// - `NotFound` when the product does not exist
    /// - `ProductInUse` while sales or purchases reference it
    pub async fn delete_product(&self, product_id: &str) -> DbResult<()> {
        self.run_optimistic("delete_product", move || async move {
            let mut tx = self.db.pool().begin().await?;

            let existing = ProductRepository::fetch_required(&mut tx, product_id).await?;
            let sales = SaleRepository::count_for_product(&mut tx, product_id).await?;
            let purchases = PurchaseRepository::count_for_product(&mut tx, product_id).await?;
            if sales > 0 || purchases > 0 {
                return Err(CoreError::ProductInUse {
                    product_id: product_id.to_string(),
                    sales: sales as usize,
                    purchases: purchases as usize,
                }
                .into());
            }
            ProductRepository::delete(&mut tx, product_id, existing.version).await?;

            tx.commit().await?;
            Ok::<_, DbError>(())
        })
        .await?;

        info!(product_id = %product_id, "Product deleted");
        self.publish(&[Collection::Products]).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use duka_core::{
        CoreError, CustomerDetails, NewPayment, NewProduct, PaymentType, ProductCategory,
        SupplierDetails,
    };

    #[tokio::test]
    async fn test_customer_crud() {
        let ledger = ledger().await;
        let id = customer(&ledger, "Amina Juma").await;

        let updated = ledger
            .update_customer(
                &id,
                CustomerDetails {
                    name: "Amina J. Mwinyi".into(),
                    payment_type: PaymentType::Cash,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, id);

        let stored = ledger.database().customers().get(&id).await.unwrap();
        assert_eq!(stored.name, "Amina J. Mwinyi");
        assert_eq!(stored.payment_type, PaymentType::Cash);

        let found = ledger.database().customers().search("mwinyi").await.unwrap();
        assert_eq!(found.len(), 1);

        customer(&ledger, "baraka Mushi").await;
        let sorted = ledger.database().customers().list_by_name().await.unwrap();
        assert_eq!(sorted[0].name, "Amina J. Mwinyi");
        assert_eq!(sorted[1].name, "baraka Mushi");

        let nobody = CustomerDetails {
            name: "Nobody".into(),
            ..Default::default()
        };
        let err = ledger.update_customer("missing", nobody).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let ledger = ledger().await;
        let err = ledger
            .add_supplier(SupplierDetails {
                name: "   ".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::Validation(_))));
        assert_eq!(ledger.database().suppliers().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_price_beyond_cap_is_rejected() {
        let ledger = ledger().await;
        let err = ledger
            .add_product(NewProduct {
                name: "Generator".into(),
                category: ProductCategory::Devices,
                cost_price: tzs(i64::MAX / 2 + 10),
                selling_price: tzs(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::Validation(_))));
        assert_eq!(ledger.database().products().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_customer_cascades_to_sales() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Shoes", 10).await;
        let customer_id = customer(&ledger, "Baraka Mushi").await;
        let other = customer(&ledger, "Neema Said").await;

        ledger
            .record_sale(sale_input(&customer_id, &product_id, 2, 1_500))
            .await
            .unwrap();
        ledger
            .record_sale(sale_input(&customer_id, &product_id, 3, 1_500))
            .await
            .unwrap();
        ledger
            .record_sale(sale_input(&other, &product_id, 1, 1_500))
            .await
            .unwrap();

        let summary = ledger.delete_customer(&customer_id).await.unwrap();
        assert_eq!(summary.records_removed, 2);

        let db = ledger.database();
        assert_eq!(db.sales().count().await.unwrap(), 1);
        assert_eq!(db.products().get(&product_id).await.unwrap().stock, 9);
        assert!(ledger
            .customer_balance(&customer_id)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_delete_supplier_cascades_to_purchases() {
        let ledger = ledger().await;
        let product_id = product(&ledger, "Kanga", 3_000, 4_500).await;
        let supplier_id = supplier(&ledger, "Kariakoo Wholesale").await;
        let customer_id = customer(&ledger, "Amina Juma").await;

        ledger
            .record_purchase(purchase_input(
                &product_id,
                Some(&supplier_id),
                6,
                3_000,
                PaymentType::Credit,
            ))
            .await
            .unwrap();
        ledger
            .record_sale(sale_input(&customer_id, &product_id, 4, 4_500))
            .await
            .unwrap();

        let summary = ledger.delete_supplier(&supplier_id).await.unwrap();
        assert_eq!(summary.records_removed, 1);
        assert_eq!(summary.stock_shortfall, 4);

        let db = ledger.database();
        assert_eq!(db.purchases().count().await.unwrap(), 0);
        assert_eq!(db.products().get(&product_id).await.unwrap().stock, 0);
        assert!(db.suppliers().find(&supplier_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_product_update_keeps_stock() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Blender", 7).await;

        let updated = ledger
            .update_product(
                &product_id,
                NewProduct {
                    name: "Blender 2L".into(),
                    category: ProductCategory::HomeItems,
                    cost_price: tzs(40_000),
                    selling_price: tzs(55_000),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.stock, 7);
        let stored = ledger.database().products().get(&product_id).await.unwrap();
        assert_eq!(stored.category, ProductCategory::HomeItems);
        assert_eq!(stored.stock, 7);
    }

    #[tokio::test]
    async fn test_product_in_use_cannot_be_deleted() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Blender", 7).await;
        let unused = product(&ledger, "Toaster", 20_000, 30_000).await;

        let err = ledger.delete_product(&product_id).await.unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::ProductInUse {
                sales: 0,
                purchases: 1,
                ..
            })
        ));

        ledger.delete_product(&unused).await.unwrap();
        assert_eq!(ledger.database().products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cascade_keeps_paid_history_consistent() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Radio", 3).await;
        let customer_id = customer(&ledger, "Neema Said").await;

        let mut input = sale_input(&customer_id, &product_id, 3, 10_000);
        input.payments = vec![NewPayment::new(tzs(5_000), at(2, 10))];
        ledger.record_sale(input).await.unwrap();

        ledger.delete_customer(&customer_id).await.unwrap();
        assert_eq!(
            ledger.database().products().get(&product_id).await.unwrap().stock,
            3
        );
        assert!(ledger.audit_stock().await.unwrap().is_empty());
    }
}
