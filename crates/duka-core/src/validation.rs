//! # Validation Module
//!
//! Input validation for everything a shop keeper types into a form.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Where Validation Happens                            │
//! │                                                                         │
//! │  Form input (NewSale, CustomerDetails, ...)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_* (THIS MODULE)  ← shape checks: required, length, sign      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  stock / payments modules  ← state checks: stock, outstanding balance  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LedgerService transaction ← commit                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use duka_core::money::Money;
//! use duka_core::validation::{line_total, validate_quantity};
//!
//! validate_quantity(5).unwrap();
//! let total = line_total(Money::from_minor(35_000), 2).unwrap();
//! assert_eq!(total.minor(), 70_000);
//! ```

use chrono::NaiveDate;

use crate::error::{ValidationError, ValidationResult};
use crate::money::Money;
use crate::types::{CustomerDetails, NewPayment, NewProduct, SupplierDetails};
use crate::{MAX_NAME_LENGTH, MAX_NOTES_LENGTH, MAX_QUANTITY, MAX_UNIT_PRICE};

const MAX_PHONE_LENGTH: usize = 30;
const MAX_ADDRESS_LENGTH: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required display name (customer, supplier, product).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most [`MAX_NAME_LENGTH`] characters
///
/// ## Example
/// ```rust
/// use duka_core::validation::validate_name;
///
/// assert!(validate_name("name", "Asha Mwinyi").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    validate_max_length(field, name, MAX_NAME_LENGTH)
}

/// Validates an optional free-text field against a maximum length.
pub fn validate_max_length(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates an entity id supplied by the caller.
///
/// Ids from older backups are not UUIDs (`cust-0`, timestamps), so only
/// emptiness is checked.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale or purchase quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_QUANTITY`]
///
/// ## Example
/// ```rust
/// use duka_core::validation::validate_quantity;
///
/// assert!(validate_quantity(4).is_ok());
/// assert!(validate_quantity(0).is_err());
/// ```
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price (selling, cost, or per-sale price).
///
/// Zero is allowed for giveaways; negative prices are not. Prices above
/// [`MAX_UNIT_PRICE`] are refused so line totals and profit stay in range.
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() || price.minor() > MAX_UNIT_PRICE {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_UNIT_PRICE,
        });
    }
    Ok(())
}

/// Validates a single payment amount (must be > 0).
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    Ok(())
}

/// Computes `quantity × unit_price` after validating both.
///
/// ## Errors
/// - Quantity rules from [`validate_quantity`]
/// - Negative price
/// - A product that does not fit in `i64`
pub fn line_total(unit_price: Money, quantity: i64) -> ValidationResult<Money> {
    validate_quantity(quantity)?;
    validate_price("unitPrice", unit_price)?;

    unit_price
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "totalAmount".to_string(),
            min: 0,
            max: i64::MAX,
        })
}

// =============================================================================
// Date Validators
// =============================================================================

/// Validates an inclusive report range.
///
/// A single-day range (`start == end`) is valid.
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> ValidationResult<()> {
    if start > end {
        return Err(ValidationError::InvalidRange { start, end });
    }
    Ok(())
}

// =============================================================================
// Form Validators
// =============================================================================

/// Validates customer form fields.
pub fn validate_customer(details: &CustomerDetails) -> ValidationResult<()> {
    validate_name("name", &details.name)?;
    validate_max_length("phone", &details.phone, MAX_PHONE_LENGTH)?;
    validate_max_length("address", &details.address, MAX_ADDRESS_LENGTH)?;
    validate_max_length("notes", &details.notes, MAX_NOTES_LENGTH)
}

/// Validates supplier form fields.
pub fn validate_supplier(details: &SupplierDetails) -> ValidationResult<()> {
    validate_name("name", &details.name)?;
    validate_max_length("phone", &details.phone, MAX_PHONE_LENGTH)?;
    validate_max_length("address", &details.address, MAX_ADDRESS_LENGTH)?;
    validate_max_length("notes", &details.notes, MAX_NOTES_LENGTH)
}

/// Validates product form fields.
pub fn validate_product(product: &NewProduct) -> ValidationResult<()> {
    validate_name("name", &product.name)?;
    validate_price("costPrice", product.cost_price)?;
    validate_price("sellingPrice", product.selling_price)
}

/// Validates every down payment on a form.
pub fn validate_new_payments(payments: &[NewPayment]) -> ValidationResult<()> {
    payments
        .iter()
        .try_for_each(|p| validate_payment_amount(p.amount))
}

// =============================================================================
// Unit Tests
// =============================================================================
