//! # Error Types
//!
//! Domain-specific error types for ledger operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Hierarchy                                 │
//! │                                                                         │
//! │  CoreError (top-level ledger errors)                                    │
//! │  ├── NotFound             - Party, product, record or payment missing   │
//! │  ├── InsufficientStock    - Sale (or purchase edit) would go below 0    │
//! │  ├── Overpayment          - Payments would exceed the record total      │
//! │  ├── ProductInUse         - Product still referenced by sales/purchases │
//! │  ├── CashPurchaseSettled  - Payment against a cash purchase             │
//! │  └── Validation           - Input validation failures                   │
//! │                                                                         │
//! │  ValidationError (input validation)                                     │
//! │  ├── Required             - Missing required field                      │
//! │  ├── TooLong              - String exceeds max length                   │
//! │  ├── MustBePositive       - Number must be > 0                          │
//! │  ├── OutOfRange           - Number outside valid range                  │
//! │  ├── InvalidFormat        - Wrong format                                │
//! │  └── InvalidRange         - Report range with start after end           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use duka_core::error::{CoreError, ValidationError};
//!
//! fn check_quantity(qty: i64) -> Result<(), ValidationError> {
//!     if qty <= 0 {
//!         return Err(ValidationError::MustBePositive {
//!             field: "quantity".to_string(),
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use chrono::NaiveDate;
use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Errors
// =============================================================================

/// Top-level ledger errors.
///
/// Every variant leaves the ledger untouched: the operation that produced
/// it has either not started writing or is rolled back by the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A referenced entity does not exist.
    ///
    /// Party-level queries (balance, statement) return this for a deleted
    /// customer or supplier instead of reporting a zero balance.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Not enough stock to take the requested units out.
    ///
    /// `available` already includes units the edited record gives back
    /// (the original quantity of a sale being edited on the same product).
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Payments would exceed the record's total amount.
    ///
    /// `outstanding` is what may still be paid (never negative), and
    /// `attempted` is the amount that was offered.
    #[error("Overpayment on {record_id}: outstanding {outstanding}, attempted {attempted}")]
    Overpayment {
        record_id: String,
        outstanding: Money,
        attempted: Money,
    },

    /// The product is still referenced and cannot be deleted.
    #[error("Product {product_id} is referenced by {sales} sale(s) and {purchases} purchase(s)")]
    ProductInUse {
        product_id: String,
        sales: usize,
        purchases: usize,
    },

    /// Cash purchases are settled when they are recorded.
    #[error("Purchase {purchase_id} was paid in cash and does not accept payments")]
    CashPurchaseSettled { purchase_id: String },

    /// Input validation failed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Input validation errors.
///
/// Used for validating user input before it reaches the ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A string field exceeds maximum length.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// A numeric field must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// A numeric field is outside the valid range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// A field has an invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A date range whose start lies after its end.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "prod-1".to_string(),
            available: 3,
            requested: 4,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product prod-1: available 3, requested 4"
        );

        let err = CoreError::Overpayment {
            record_id: "sale-1".to_string(),
            outstanding: Money::from_minor(3_000),
            attempted: Money::from_minor(4_000),
        };
        assert_eq!(
            err.to_string(),
            "Overpayment on sale-1: outstanding 3,000, attempted 4,000"
        );
    }

    #[test]
    fn test_validation_converts_into_core_error() {
        let err: CoreError = ValidationError::Required {
            field: "name".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(err.to_string(), "Validation error: name is required");
    }
}
