//! # Supplier Repository
//!
//! Database operations for suppliers. Mirrors the customer repository minus
//! the payment preference.

use duka_core::Supplier;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{expect_one_row, Versioned};
use crate::error::{DbError, DbResult};

const ENTITY: &str = "Supplier";

#[derive(Debug, sqlx::FromRow)]
struct SupplierRow {
    id: String,
    name: String,
    phone: String,
    address: String,
    notes: String,
    version: i64,
}

impl SupplierRow {
    fn into_versioned(self) -> Versioned<Supplier> {
        Versioned::new(
            Supplier {
                id: self.id,
                name: self.name,
                phone: self.phone,
                address: self.address,
                notes: self.notes,
            },
            self.version,
        )
    }
}

/// Repository for supplier database operations.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    /// Lists all suppliers in insertion order.
    pub async fn list(&self) -> DbResult<Vec<Supplier>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_all(&mut conn).await
    }

    /// Lists all suppliers sorted by name.
    pub async fn list_by_name(&self) -> DbResult<Vec<Supplier>> {
        let rows = sqlx::query_as::<_, SupplierRow>(
            r#"
            SELECT id, name, phone, address, notes, version
            FROM suppliers
            ORDER BY name COLLATE NOCASE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_versioned().value).collect())
    }

    /// Gets a supplier by ID or fails with `NotFound`.
    pub async fn get(&self, id: &str) -> DbResult<Supplier> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))
    }

    pub async fn find(&self, id: &str) -> DbResult<Option<Supplier>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::fetch(&mut conn, id).await?.map(Versioned::into_inner))
    }

    /// Case-insensitive substring match on name or phone.
    pub async fn search(&self, query: &str) -> DbResult<Vec<Supplier>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list().await;
        }

        debug!(query = %query, "Searching suppliers");

        let rows = sqlx::query_as::<_, SupplierRow>(
            r#"
            SELECT id, name, phone, address, notes, version
            FROM suppliers
            WHERE name LIKE ?1 OR phone LIKE ?1
            ORDER BY name
            "#,
        )
        .bind(format!("%{}%", query))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_versioned().value).collect())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM suppliers")
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
    ) -> DbResult<Option<Versioned<Supplier>>> {
        let row = sqlx::query_as::<_, SupplierRow>(
            "SELECT id, name, phone, address, notes, version FROM suppliers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(SupplierRow::into_versioned))
    }

    pub(crate) async fn fetch_all(conn: &mut SqliteConnection) -> DbResult<Vec<Supplier>> {
        let rows = sqlx::query_as::<_, SupplierRow>(
            "SELECT id, name, phone, address, notes, version FROM suppliers ORDER BY rowid",
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_versioned().value).collect())
    }

    pub(crate) async fn insert(conn: &mut SqliteConnection, supplier: &Supplier) -> DbResult<()> {
        debug!(id = %supplier.id, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, phone, address, notes, version)
            VALUES (?1, ?2, ?3, ?4, ?5, 1)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(&supplier.notes)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub(crate) async fn update(
        conn: &mut SqliteConnection,
        supplier: &Supplier,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(id = %supplier.id, expected_version, "Updating supplier");

        let result = sqlx::query(
            r#"
            UPDATE suppliers SET
                name = ?3,
                phone = ?4,
                address = ?5,
                notes = ?6,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&supplier.id)
        .bind(expected_version)
        .bind(&supplier.name)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(&supplier.notes)
        .execute(&mut *conn)
        .await?;

        expect_one_row(result.rows_affected(), ENTITY, &supplier.id)
    }

    pub(crate) async fn delete(
        conn: &mut SqliteConnection,
        id: &str,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(id = %id, "Deleting supplier");

        let result = sqlx::query("DELETE FROM suppliers WHERE id = ?1 AND version = ?2")
            .bind(id)
            .bind(expected_version)
            .execute(&mut *conn)
            .await?;

        expect_one_row(result.rows_affected(), ENTITY, id)
    }

    pub(crate) async fn delete_all(conn: &mut SqliteConnection) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM suppliers")
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
