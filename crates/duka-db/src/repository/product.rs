//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - CRUD operations
//! - Stock writes (ledger transactions only)
//!
//! ## Stock Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  Stock is written as an absolute value, guarded by the row version:     │
//! │                                                                         │
//! │     UPDATE products SET stock = 7, version = version + 1                │
//! │     WHERE id = ? AND version = 4                                        │
//! │                                                                         │
//! │  The new value was checked against the floor (stock ≥ 0) before the     │
//! │  write. If another writer got there first, the version no longer        │
//! │  matches, zero rows change, and the whole transaction is retried with   │
//! │  a fresh read.                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use duka_core::{Money, Product, ProductCategory};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{expect_one_row, Versioned};
use crate::error::{DbError, DbResult};

const ENTITY: &str = "Product";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    category: ProductCategory,
    cost_price: i64,
    selling_price: i64,
    stock: i64,
    version: i64,
}

impl ProductRow {
    fn into_versioned(self) -> Versioned<Product> {
        Versioned::new(
            Product {
                id: self.id,
                name: self.name,
                category: self.category,
                cost_price: Money::from_minor(self.cost_price),
                selling_price: Money::from_minor(self.selling_price),
                stock: self.stock,
            },
            self.version,
        )
    }
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// // Alphabetical list for the product picker
/// let products = repo.list_by_name().await?;
///
/// // Get by ID
/// let product = repo.get("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists all products in insertion order.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_all(&mut conn).await
    }

    /// Lists all products sorted by name.
    pub async fn list_by_name(&self) -> DbResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, category, cost_price, selling_price, stock, version
            FROM products
            ORDER BY name COLLATE NOCASE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_versioned().value).collect())
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Product found
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn get(&self, id: &str) -> DbResult<Product> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))
    }

    /// Gets a product by its ID, `None` if missing.
    pub async fn find(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::fetch(&mut conn, id).await?.map(Versioned::into_inner))
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
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
    ) -> DbResult<Option<Versioned<Product>>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, category, cost_price, selling_price, stock, version
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(ProductRow::into_versioned))
    }

    /// Like [`Self::fetch`] but a missing product is `NotFound`.
    pub(crate) async fn fetch_required(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Versioned<Product>> {
        Self::fetch(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))
    }

    pub(crate) async fn fetch_all(conn: &mut SqliteConnection) -> DbResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, category, cost_price, selling_price, stock, version
            FROM products
            ORDER BY rowid
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_versioned().value).collect())
    }

    /// Inserts a product with the stock it carries.
    pub(crate) async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, name, category, cost_price, selling_price, stock, version)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.category)
        .bind(product.cost_price.minor())
        .bind(product.selling_price.minor())
        .bind(product.stock)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Updates the descriptive fields. Stock is left as stored.
    pub(crate) async fn update(
        conn: &mut SqliteConnection,
        product: &Product,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(id = %product.id, expected_version, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?3,
                category = ?4,
                cost_price = ?5,
                selling_price = ?6,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&product.id)
        .bind(expected_version)
        .bind(&product.name)
        .bind(product.category)
        .bind(product.cost_price.minor())
        .bind(product.selling_price.minor())
        .execute(&mut *conn)
        .await?;

        expect_one_row(result.rows_affected(), ENTITY, &product.id)
    }

    /// Writes a new stock level. Returns the row's new version.
    pub(crate) async fn set_stock(
        conn: &mut SqliteConnection,
        id: &str,
        stock: i64,
        expected_version: i64,
    ) -> DbResult<i64> {
        debug!(id = %id, stock, expected_version, "Updating stock");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = ?3, version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(stock)
        .execute(&mut *conn)
        .await?;

        expect_one_row(result.rows_affected(), ENTITY, id)?;
        Ok(expected_version + 1)
    }

    pub(crate) async fn delete(
        conn: &mut SqliteConnection,
        id: &str,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1 AND version = ?2")
            .bind(id)
            .bind(expected_version)
            .execute(&mut *conn)
            .await?;

        expect_one_row(result.rows_affected(), ENTITY, id)
    }

    pub(crate) async fn delete_all(conn: &mut SqliteConnection) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM products")
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
