//! # Sale Repository
//!
//! Database operations for sales and their embedded payments.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. RECORD                                                             │
//! │     └── insert() → row with payments = '[...]', version 1              │
//! │     └── (product stock written in the same transaction)                │
//! │                                                                         │
//! │  2. PAY / EDIT                                                         │
//! │     └── update(sale, version) → whole row rewritten, version + 1       │
//! │                                                                         │
//! │  3. DELETE                                                             │
//! │     └── delete(id, version) → row gone, stock restored alongside       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use duka_core::{Money, PaymentType, Sale};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{decode_payments, encode_payments, expect_one_row, Versioned};
use crate::error::{DbError, DbResult};

const ENTITY: &str = "Sale";

const COLUMNS: &str = "id, customer_id, product_id, quantity, unit_price, total_amount, \
                       date, payments, payment_type, unit_cost, version";

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    customer_id: String,
    product_id: String,
    quantity: i64,
    unit_price: i64,
    total_amount: i64,
    date: DateTime<Utc>,
    payments: String,
    payment_type: PaymentType,
    unit_cost: Option<i64>,
    version: i64,
}

impl SaleRow {
    fn into_versioned(self) -> DbResult<Versioned<Sale>> {
        Ok(Versioned::new(
            Sale {
                payments: decode_payments(&self.payments)?,
                id: self.id,
                customer_id: self.customer_id,
                product_id: self.product_id,
                quantity: self.quantity,
                unit_price: Money::from_minor(self.unit_price),
                total_amount: Money::from_minor(self.total_amount),
                date: self.date,
                payment_type: self.payment_type,
                unit_cost: self.unit_cost.map(Money::from_minor),
            },
            self.version,
        ))
    }
}

fn into_sales(rows: Vec<SaleRow>) -> DbResult<Vec<Sale>> {
    rows.into_iter()
        .map(|r| r.into_versioned().map(Versioned::into_inner))
        .collect()
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Lists all sales in insertion order.
    pub async fn list(&self) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_all(&mut conn).await
    }

    /// The `limit` most recent sales, newest first.
    pub async fn list_recent(&self, limit: usize) -> DbResult<Vec<Sale>> {
        let mut sales = self.list().await?;
        sales.sort_by(|a, b| b.date.cmp(&a.date));
        sales.truncate(limit);
        Ok(sales)
    }

    /// All sales to one customer in insertion order.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_by_customer(&mut conn, customer_id).await
    }

    /// Gets a sale by ID or fails with `NotFound`.
    pub async fn get(&self, id: &str) -> DbResult<Sale> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))
    }

    pub async fn find(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::fetch(&mut conn, id).await?.map(Versioned::into_inner))
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
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
    ) -> DbResult<Option<Versioned<Sale>>> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(SaleRow::into_versioned).transpose()
    }

    pub(crate) async fn fetch_required(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Versioned<Sale>> {
        Self::fetch(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))
    }

    pub(crate) async fn fetch_all(conn: &mut SqliteConnection) -> DbResult<Vec<Sale>> {
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {COLUMNS} FROM sales ORDER BY rowid"
        ))
        .fetch_all(&mut *conn)
        .await?;

        into_sales(rows)
    }

    /// A customer's sales with their row versions.
    pub(crate) async fn fetch_versioned_by_customer(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<Vec<Versioned<Sale>>> {
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {COLUMNS} FROM sales WHERE customer_id = ?1 ORDER BY rowid"
        ))
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(SaleRow::into_versioned).collect()
    }

    pub(crate) async fn fetch_by_customer(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<Vec<Sale>> {
        Ok(Self::fetch_versioned_by_customer(conn, customer_id)
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect())
    }

    /// Number of sales referencing a product.
    pub(crate) async fn count_for_product(
        conn: &mut SqliteConnection,
        product_id: &str,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE product_id = ?1")
            .bind(product_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    pub(crate) async fn insert(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(
            id = %sale.id,
            product_id = %sale.product_id,
            quantity = sale.quantity,
            "Inserting sale"
        );

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, customer_id, product_id, quantity, unit_price, total_amount,
                date, payments, payment_type, unit_cost, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.customer_id)
        .bind(&sale.product_id)
        .bind(sale.quantity)
        .bind(sale.unit_price.minor())
        .bind(sale.total_amount.minor())
        .bind(sale.date)
        .bind(encode_payments(&sale.payments)?)
        .bind(sale.payment_type)
        .bind(sale.unit_cost.map(|c| c.minor()))
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Rewrites every column of the sale, payments included.
    pub(crate) async fn update(
        conn: &mut SqliteConnection,
        sale: &Sale,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(id = %sale.id, expected_version, "Updating sale");

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                customer_id = ?3,
                product_id = ?4,
                quantity = ?5,
                unit_price = ?6,
                total_amount = ?7,
                date = ?8,
                payments = ?9,
                payment_type = ?10,
                unit_cost = ?11,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&sale.id)
        .bind(expected_version)
        .bind(&sale.customer_id)
        .bind(&sale.product_id)
        .bind(sale.quantity)
        .bind(sale.unit_price.minor())
        .bind(sale.total_amount.minor())
        .bind(sale.date)
        .bind(encode_payments(&sale.payments)?)
        .bind(sale.payment_type)
        .bind(sale.unit_cost.map(|c| c.minor()))
        .execute(&mut *conn)
        .await?;

        expect_one_row(result.rows_affected(), ENTITY, &sale.id)
    }

    pub(crate) async fn delete(
        conn: &mut SqliteConnection,
        id: &str,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(id = %id, "Deleting sale");

        let result = sqlx::query("DELETE FROM sales WHERE id = ?1 AND version = ?2")
            .bind(id)
            .bind(expected_version)
            .execute(&mut *conn)
            .await?;

        expect_one_row(result.rows_affected(), ENTITY, id)
    }

    pub(crate) async fn delete_all(conn: &mut SqliteConnection) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM sales").execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }
}
