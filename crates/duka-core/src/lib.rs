//! # duka-core: Pure Ledger Logic for Duka Ledger
//!
//! This crate is the **heart** of Duka Ledger. It turns a stream of sales,
//! purchases and partial payments into stock levels, running balances,
//! statements and profit figures, as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Duka Ledger Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                          Shop UI                                │   │
//! │  │   Sales ─ Purchases ─ Customers ─ Suppliers ─ Reports           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          duka-db: LedgerService (optimistic transactions)       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ duka-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  stock  │ │ payments │ │ balance │ │ profit │  │   │
//! │  │   │  money  │ │ adjust  │ │ balance  │ │statement│ │ report │  │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └─────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Customer, Sale, Purchase, Payment)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Form input validation
//! - [`stock`] - Stock adjustments, purchase-deletion clamp, stock audit
//! - [`payments`] - Payment recording and outstanding balances
//! - [`balance`] - Party balances, statements, debtor/creditor lists
//! - [`profit`] - Profit, reports and the dashboard summary
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use duka_core::payments::{record_payment, Settlement};
//! use duka_core::{Money, NewPayment, PaymentType, Sale};
//!
//! let mut sale = Sale {
//!     id: "sale-1".into(),
//!     customer_id: "cust-1".into(),
//!     product_id: "prod-1".into(),
//!     quantity: 1,
//!     unit_price: Money::from_minor(10_000),
//!     total_amount: Money::from_minor(10_000),
//!     date: Utc::now(),
//!     payments: vec![],
//!     payment_type: PaymentType::Credit,
//!     unit_cost: None,
//! };
//!
//! record_payment(&mut sale, NewPayment::new(Money::from_minor(7_000), Utc::now())).unwrap();
//! assert_eq!(sale.balance().minor(), 3_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod balance;
pub mod error;
pub mod money;
pub mod payments;
pub mod profit;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use duka_core::Money` instead of
// `use duka_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use payments::Settlement;
pub use profit::CostBasis;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest quantity accepted on a single sale or purchase line.
pub const MAX_QUANTITY: i64 = 1_000_000;

/// Largest accepted unit price, in minor units.
///
/// Any price at or below it times any quantity up to [`MAX_QUANTITY`]
/// fits in an i64, and so does any price difference times quantity.
pub const MAX_UNIT_PRICE: i64 = i64::MAX / MAX_QUANTITY;

/// Longest accepted name for a customer, supplier or product.
pub const MAX_NAME_LENGTH: usize = 200;

/// Longest accepted notes field.
pub const MAX_NOTES_LENGTH: usize = 1_000;

/// Products at or below this stock (and above zero) are flagged as low.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Length of ranked lists: top products, recent sales, top debtors.
pub const DEFAULT_TOP_N: usize = 5;
