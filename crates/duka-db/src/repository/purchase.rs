//! # Purchase Repository
//!
//! Database operations for purchases and their embedded payments.

use chrono::{DateTime, Utc};
use duka_core::{Money, PaymentType, Purchase};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{decode_payments, encode_payments, expect_one_row, Versioned};
use crate::error::{DbError, DbResult};

const ENTITY: &str = "Purchase";

const COLUMNS: &str = "id, product_id, supplier_id, quantity, cost_price, total_amount, \
                       date, purchase_type, payments, version";

#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: String,
    product_id: String,
    supplier_id: Option<String>,
    quantity: i64,
    cost_price: i64,
    total_amount: i64,
    date: DateTime<Utc>,
    purchase_type: PaymentType,
    payments: String,
    version: i64,
}

impl PurchaseRow {
    fn into_versioned(self) -> DbResult<Versioned<Purchase>> {
        Ok(Versioned::new(
            Purchase {
                payments: decode_payments(&self.payments)?,
                id: self.id,
                product_id: self.product_id,
                supplier_id: self.supplier_id,
                quantity: self.quantity,
                cost_price: Money::from_minor(self.cost_price),
                total_amount: Money::from_minor(self.total_amount),
                date: self.date,
                purchase_type: self.purchase_type,
            },
            self.version,
        ))
    }
}

fn into_purchases(rows: Vec<PurchaseRow>) -> DbResult<Vec<Purchase>> {
    rows.into_iter()
        .map(|r| r.into_versioned().map(Versioned::into_inner))
        .collect()
}

/// Repository for purchase database operations.
///
/// ## Usage
/// ```rust,ignore
/// let owed_to = db.purchases().list_for_supplier("sup-1").await?;
/// ```
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Lists all purchases in insertion order.
    pub async fn list(&self) -> DbResult<Vec<Purchase>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_all(&mut conn).await
    }

    /// The `limit` most recent purchases, newest first.
    pub async fn list_recent(&self, limit: usize) -> DbResult<Vec<Purchase>> {
        let mut purchases = self.list().await?;
        purchases.sort_by(|a, b| b.date.cmp(&a.date));
        purchases.truncate(limit);
        Ok(purchases)
    }

    /// All purchases from one supplier in insertion order.
    pub async fn list_for_supplier(&self, supplier_id: &str) -> DbResult<Vec<Purchase>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::fetch_versioned_by_supplier(&mut conn, supplier_id)
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect())
    }

    pub async fn get(&self, id: &str) -> DbResult<Purchase> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))
    }

    pub async fn find(&self, id: &str) -> DbResult<Option<Purchase>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::fetch(&mut conn, id).await?.map(Versioned::into_inner))
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchases")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Connection-level operations (used inside ledger transactions)
    // =========================================================================

    pub(crate) async fn fetch(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Versioned<Purchase>>> {
        let row = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {COLUMNS} FROM purchases WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(PurchaseRow::into_versioned).transpose()
    }

    pub(crate) async fn fetch_required(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Versioned<Purchase>> {
        Self::fetch(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))
    }

    pub(crate) async fn fetch_all(conn: &mut SqliteConnection) -> DbResult<Vec<Purchase>> {
        let rows = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {COLUMNS} FROM purchases ORDER BY rowid"
        ))
        .fetch_all(&mut *conn)
        .await?;

        into_purchases(rows)
    }

    pub(crate) async fn fetch_versioned_by_supplier(
        conn: &mut SqliteConnection,
        supplier_id: &str,
    ) -> DbResult<Vec<Versioned<Purchase>>> {
        let rows = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {COLUMNS} FROM purchases WHERE supplier_id = ?1 ORDER BY rowid"
        ))
        .bind(supplier_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(PurchaseRow::into_versioned).collect()
    }

    /// Number of purchases referencing a product.
    pub(crate) async fn count_for_product(
        conn: &mut SqliteConnection,
        product_id: &str,
    ) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM purchases WHERE product_id = ?1")
                .bind(product_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(count)
    }

    pub(crate) async fn insert(conn: &mut SqliteConnection, purchase: &Purchase) -> DbResult<()> {
        debug!(
            id = %purchase.id,
            product_id = %purchase.product_id,
            quantity = purchase.quantity,
            "Inserting purchase"
        );

        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, product_id, supplier_id, quantity, cost_price, total_amount,
                date, purchase_type, payments, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.product_id)
        .bind(&purchase.supplier_id)
        .bind(purchase.quantity)
        .bind(purchase.cost_price.minor())
        .bind(purchase.total_amount.minor())
        .bind(purchase.date)
        .bind(purchase.purchase_type)
        .bind(encode_payments(&purchase.payments)?)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Rewrites every column of the purchase, payments included.
    pub(crate) async fn update(
        conn: &mut SqliteConnection,
        purchase: &Purchase,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(id = %purchase.id, expected_version, "Updating purchase");

        let result = sqlx::query(
            r#"
            UPDATE purchases SET
                product_id = ?3,
                supplier_id = ?4,
                quantity = ?5,
                cost_price = ?6,
                total_amount = ?7,
                date = ?8,
                purchase_type = ?9,
                payments = ?10,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&purchase.id)
        .bind(expected_version)
        .bind(&purchase.product_id)
        .bind(&purchase.supplier_id)
        .bind(purchase.quantity)
        .bind(purchase.cost_price.minor())
        .bind(purchase.total_amount.minor())
        .bind(purchase.date)
        .bind(purchase.purchase_type)
        .bind(encode_payments(&purchase.payments)?)
        .execute(&mut *conn)
        .await?;

        expect_one_row(result.rows_affected(), ENTITY, &purchase.id)
    }

    pub(crate) async fn delete(
        conn: &mut SqliteConnection,
        id: &str,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(id = %id, "Deleting purchase");

        let result = sqlx::query("DELETE FROM purchases WHERE id = ?1 AND version = ?2")
            .bind(id)
            .bind(expected_version)
            .execute(&mut *conn)
            .await?;

        expect_one_row(result.rows_affected(), ENTITY, id)
    }

    pub(crate) async fn delete_all(conn: &mut SqliteConnection) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM purchases")
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
