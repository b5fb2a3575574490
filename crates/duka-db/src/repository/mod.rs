//! # Repository Module
//!
//! Database repository implementations for Duka Ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways In                                          │
//! │                                                                         │
//! │  Screens (read only)                LedgerService (read-modify-write)   │
//! │       │                                   │                             │
//! │       │  db.sales().list()                │  tx = pool.begin()          │
//! │       ▼                                   ▼                             │
//! │  SaleRepository { pool }           SaleRepository::fetch(&mut *tx, id) │
//! │  ├── list / get / find / count     SaleRepository::update(&mut *tx,    │
//! │  └── list_recent                        &sale, expected_version)        │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  SQLite Database ◄────────────────────────┘                             │
//! │                                                                         │
//! │  Writers take a connection so one transaction can span several         │
//! │  tables (sale row + product stock). Every write bumps `version` and     │
//! │  compares the version read earlier; zero rows touched = Conflict.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CustomerRepository`](customer::CustomerRepository)
//! - [`SupplierRepository`](supplier::SupplierRepository)
//! - [`ProductRepository`](product::ProductRepository) - includes stock updates
//! - [`SaleRepository`](sale::SaleRepository) - payments embedded as JSON
//! - [`PurchaseRepository`](purchase::PurchaseRepository) - payments embedded as JSON

use duka_core::Payment;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

pub mod customer;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod supplier;

/// An entity together with the row version it was read at.
///
/// Pass `version` back to the repository's `update`/`delete` to make the
/// write conditional on nobody having changed the row since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: i64) -> Self {
        Versioned { value, version }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Generates a new entity ID.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Serializes an embedded payment list for its TEXT column.
pub(crate) fn encode_payments(payments: &[Payment]) -> DbResult<String> {
    Ok(serde_json::to_string(payments)?)
}

/// Parses an embedded payment list. An empty column reads as no payments.
pub(crate) fn decode_payments(raw: &str) -> DbResult<Vec<Payment>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}

/// Maps the row count of a version-checked write to `Ok` or `Conflict`.
pub(crate) fn expect_one_row(rows_affected: u64, entity: &str, id: &str) -> DbResult<()> {
    if rows_affected == 0 {
        return Err(DbError::conflict(entity, id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use duka_core::Money;

    #[test]
    fn test_payment_column_roundtrip() {
        let payments = vec![Payment {
            id: "p1".into(),
            amount: Money::from_minor(7_000),
            date: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        }];

        let raw = encode_payments(&payments).unwrap();
        assert!(raw.contains("\"amount\":7000"));
        assert_eq!(decode_payments(&raw).unwrap(), payments);
        assert!(decode_payments("").unwrap().is_empty());
        assert!(decode_payments("{broken").is_err());
    }

    #[test]
    fn test_zero_rows_is_conflict() {
        assert!(expect_one_row(1, "Sale", "s1").is_ok());
        assert!(expect_one_row(0, "Sale", "s1").unwrap_err().is_retryable());
    }
}
