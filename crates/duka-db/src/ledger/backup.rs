//! # Backup & Restore
//!
//! Whole-ledger snapshots in the web app's backup format.
//!
//! ## Flow
//! ```text
//! export_snapshot ──► LedgerSnapshot ──► write_backup(path)   (pretty JSON)
//!
//! read_backup(path) ──► LedgerSnapshot ──► restore_snapshot
//!                                            │
//!                                            ├── delete all five collections
//!                                            ├── insert every entity, payment
//!                                            │   flags recomputed
//!                                            └── one transaction, then publish
//! ```
//!
//! Stock and payments are written exactly as they appear in the snapshot.
//! The Cash/Credit flags are derived from the payments, as they are after
//! every payment change. Call [`LedgerService::audit_stock`] afterwards to
//! check a hand-edited file.

use std::path::Path;

use duka_core::payments::resolve_purchase_type;
use duka_core::{LedgerSnapshot, Purchase, Sale, Settlement};
use tracing::info;

use super::LedgerService;
use crate::changes::Collection;
use crate::error::{DbError, DbResult};
use crate::repository::customer::CustomerRepository;
use crate::repository::product::ProductRepository;
use crate::repository::purchase::PurchaseRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::supplier::SupplierRepository;

const ALL_COLLECTIONS: [Collection; 5] = [
    Collection::Customers,
    Collection::Suppliers,
    Collection::Products,
    Collection::Sales,
    Collection::Purchases,
];

impl LedgerService {
    /// Reads all five collections in one read transaction.
    pub async fn export_snapshot(&self) -> DbResult<LedgerSnapshot> {
        let mut tx = self.db.pool().begin().await?;

        let snapshot = LedgerSnapshot {
            customers: CustomerRepository::fetch_all(&mut tx).await?,
            sales: SaleRepository::fetch_all(&mut tx).await?,
            products: ProductRepository::fetch_all(&mut tx).await?,
            suppliers: SupplierRepository::fetch_all(&mut tx).await?,
            purchases: PurchaseRepository::fetch_all(&mut tx).await?,
        };

        tx.commit().await?;
        Ok(snapshot)
    }

    /// Replaces the whole ledger with `snapshot`.
    ///
    /// Either every entity is written or the ledger is left as it was
    /// (duplicate ids abort the restore).
    pub async fn restore_snapshot(&self, snapshot: &LedgerSnapshot) -> DbResult<()> {
        let sales: Vec<Sale> = snapshot
            .sales
            .iter()
            .cloned()
            .map(|mut sale| {
                sale.refresh_settlement();
                sale
            })
            .collect();
        let purchases: Vec<Purchase> = snapshot
            .purchases
            .iter()
            .cloned()
            .map(|mut purchase| {
                purchase.purchase_type = resolve_purchase_type(
                    purchase.purchase_type,
                    purchase.total_amount,
                    &purchase.payments,
                );
                purchase
            })
            .collect();
        let (sales, purchases) = (&sales, &purchases);

        self.run_optimistic("restore_snapshot", move || async move {
            let mut tx = self.db.pool().begin().await?;

            clear_all(&mut tx).await?;

            for customer in &snapshot.customers {
                CustomerRepository::insert(&mut tx, customer).await?;
            }
            for supplier in &snapshot.suppliers {
                SupplierRepository::insert(&mut tx, supplier).await?;
            }
            for product in &snapshot.products {
                ProductRepository::insert(&mut tx, product).await?;
            }
            for sale in sales {
                SaleRepository::insert(&mut tx, sale).await?;
            }
            for purchase in purchases {
                PurchaseRepository::insert(&mut tx, purchase).await?;
            }

            tx.commit().await?;
            Ok::<_, DbError>(())
        })
        .await?;

        info!(
            customers = snapshot.customers.len(),
            suppliers = snapshot.suppliers.len(),
            products = snapshot.products.len(),
            sales = snapshot.sales.len(),
            purchases = snapshot.purchases.len(),
            "Ledger restored from snapshot"
        );
        self.publish(&ALL_COLLECTIONS).await;
        Ok(())
    }

    /// Writes the current ledger to `path` as pretty-printed JSON.
    ///
    /// Returns the number of entities written.
    pub async fn write_backup(&self, path: &Path) -> DbResult<usize> {
        let snapshot = self.export_snapshot().await?;
        let json = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, json)?;

        info!(path = %path.display(), entities = snapshot.len(), "Backup written");
        Ok(snapshot.len())
    }

    /// Parses a backup file without touching the ledger.
    pub fn read_backup(path: &Path) -> DbResult<LedgerSnapshot> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Reads a backup file and restores it.
    pub async fn restore_backup(&self, path: &Path) -> DbResult<LedgerSnapshot> {
        let snapshot = Self::read_backup(path)?;
        self.restore_snapshot(&snapshot).await?;
        Ok(snapshot)
    }

    /// Deletes every entity in all five collections.
    pub async fn reset(&self) -> DbResult<()> {
        let removed = self
            .run_optimistic("reset", move || async move {
                let mut tx = self.db.pool().begin().await?;
                let removed = clear_all(&mut tx).await?;
                tx.commit().await?;
                Ok::<_, DbError>(removed)
            })
            .await?;

        info!(removed, "Ledger reset");
        self.publish(&ALL_COLLECTIONS).await;
        Ok(())
    }
}

async fn clear_all(conn: &mut sqlx::SqliteConnection) -> DbResult<u64> {
    let mut removed = SaleRepository::delete_all(conn).await?;
    removed += PurchaseRepository::delete_all(conn).await?;
    removed += ProductRepository::delete_all(conn).await?;
    removed += CustomerRepository::delete_all(conn).await?;
    removed += SupplierRepository::delete_all(conn).await?;
    Ok(removed)
}
