//! # Customer Repository
//!
//! Database operations for customers.

use duka_core::{Customer, PaymentType};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{expect_one_row, Versioned};
use crate::error::{DbError, DbResult};

const ENTITY: &str = "Customer";

/// Row shape of the `customers` table.
#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    name: String,
    phone: String,
    address: String,
    payment_type: PaymentType,
    notes: String,
    version: i64,
}

impl CustomerRow {
    fn into_versioned(self) -> Versioned<Customer> {
        Versioned::new(
            Customer {
                id: self.id,
                name: self.name,
                phone: self.phone,
                address: self.address,
                payment_type: self.payment_type,
                notes: self.notes,
            },
            self.version,
        )
    }
}

/// Repository for customer database operations.
///
/// ## Usage
/// ```rust,ignore
/// let customers = db.customers().list().await?;
/// let matches = db.customers().search("amina").await?;
/// ```
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Lists all customers in insertion order.
    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_all(&mut conn).await
    }

    /// Lists all customers sorted by name.
    pub async fn list_by_name(&self) -> DbResult<Vec<Customer>> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, name, phone, address, payment_type, notes, version
            FROM customers
            ORDER BY name COLLATE NOCASE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_versioned().value).collect())
    }

    /// Gets a customer by ID.
    ///
    /// ## Returns
    /// * `Ok(Customer)` - Customer found
    /// * `Err(DbError::NotFound)` - No such customer
    pub async fn get(&self, id: &str) -> DbResult<Customer> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))
    }

    /// Gets a customer by ID, `None` if missing.
    pub async fn find(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::fetch(&mut conn, id).await?.map(Versioned::into_inner))
    }

    /// Case-insensitive substring match on name or phone.
    pub async fn search(&self, query: &str) -> DbResult<Vec<Customer>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list().await;
        }

        debug!(query = %query, "Searching customers");

        let pattern = format!("%{}%", query);
        let rows = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, name, phone, address, payment_type, notes, version
            FROM customers
            WHERE name LIKE ?1 OR phone LIKE ?1
            ORDER BY name
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_versioned().value).collect())
    }

    /// Counts customers.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
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
    ) -> DbResult<Option<Versioned<Customer>>> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, name, phone, address, payment_type, notes, version
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(CustomerRow::into_versioned))
    }

    pub(crate) async fn fetch_all(conn: &mut SqliteConnection) -> DbResult<Vec<Customer>> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, name, phone, address, payment_type, notes, version
            FROM customers
            ORDER BY rowid
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_versioned().value).collect())
    }

    pub(crate) async fn insert(conn: &mut SqliteConnection, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, address, payment_type, notes, version)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.payment_type)
        .bind(&customer.notes)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub(crate) async fn update(
        conn: &mut SqliteConnection,
        customer: &Customer,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(id = %customer.id, expected_version, "Updating customer");

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = ?3,
                phone = ?4,
                address = ?5,
                payment_type = ?6,
                notes = ?7,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&customer.id)
        .bind(expected_version)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.payment_type)
        .bind(&customer.notes)
        .execute(&mut *conn)
        .await?;

        expect_one_row(result.rows_affected(), ENTITY, &customer.id)
    }

    pub(crate) async fn delete(
        conn: &mut SqliteConnection,
        id: &str,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(id = %id, "Deleting customer");

        let result = sqlx::query("DELETE FROM customers WHERE id = ?1 AND version = ?2")
            .bind(id)
            .bind(expected_version)
            .execute(&mut *conn)
            .await?;

        expect_one_row(result.rows_affected(), ENTITY, id)
    }

    pub(crate) async fn delete_all(conn: &mut SqliteConnection) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM customers")
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
