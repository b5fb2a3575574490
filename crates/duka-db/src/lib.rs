//! # duka-db: Database Layer and Ledger Service for Duka Ledger
//!
//! This crate stores the five ledger collections in SQLite (via sqlx) and
//! runs every stock- and payment-mutating operation inside an optimistic
//! transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Duka Ledger Data Flow                            │
//! │                                                                         │
//! │  Shop UI (record sale, take payment, view statement)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     duka-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ LedgerService │    │  Repositories │    │  ChangeFeed  │  │   │
//! │  │   │  (ledger/)    │───►│ customer.rs   │    │ (changes.rs) │  │   │
//! │  │   │               │    │ supplier.rs   │    │              │  │   │
//! │  │   │ optimistic tx │    │ product.rs    │    │ broadcast of │  │   │
//! │  │   │ retry, rules  │    │ sale.rs       │    │ collections  │  │   │
//! │  │   │ from core     │    │ purchase.rs   │    │              │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           │                    │                               │   │
//! │  │           ▼                    ▼                               │   │
//! │  │   ┌───────────────┐    ┌───────────────┐                      │   │
//! │  │   │   Database    │    │  Migrations   │                      │   │
//! │  │   │   (pool.rs)   │    │  (embedded)   │                      │   │
//! │  │   └───────────────┘    └───────────────┘                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <platform data dir>/duka.db                                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`config`] - `duka.toml` loading and environment overrides
//! - [`changes`] - Per-collection change notification
//! - [`repository`] - One repository per collection
//! - [`ledger`] - The transactional ledger service
//!
//! ## Usage
//!
//! ```rust,ignore
//! use duka_db::{LedgerConfig, LedgerService};
//!
//! let config = LedgerConfig::load(None)?;
//! let ledger = LedgerService::open(&config).await?;
//!
//! let sale = ledger.record_sale(new_sale).await?;
//! let statement = ledger.customer_statement(&sale.customer_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod changes;
pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use changes::{ChangeFeed, Collection, Update};
pub use config::{LedgerConfig, RetryPolicy};
pub use error::{DbError, DbResult};
pub use ledger::{CascadeSummary, LedgerService, PurchaseDeletion};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::product::ProductRepository;
pub use repository::purchase::PurchaseRepository;
pub use repository::sale::SaleRepository;
pub use repository::supplier::SupplierRepository;
pub use repository::Versioned;
