//! # Domain Types
//!
//! Core domain types used throughout Duka Ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Model                                    │
//! │                                                                         │
//! │   Customer ◄──── customerId ──── Sale ──── productId ────► Product      │
//! │                                   │                          ▲          │
//! │                              payments[]                      │          │
//! │                                   │                       productId     │
//! │                                Payment                       │          │
//! │                                   │                          │          │
//! │                              payments[]                      │          │
//! │                                   │                          │          │
//! │   Supplier ◄── supplierId? ── Purchase ──────────────────────┘          │
//! │                                                                         │
//! │   Product.stock = Σ purchase.quantity − Σ sale.quantity                 │
//! │   balance(record) = totalAmount − Σ payments.amount                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Entities serialize with camelCase field names so a backup written here
//! loads in the web app and vice versa.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product Category
// =============================================================================

/// The shelf a product belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
pub enum ProductCategory {
    Cosmetics,
    Clothes,
    Devices,
    #[serde(rename = "Home Items")]
    HomeItems,
    Other,
}

impl ProductCategory {
    /// All categories in display order.
    pub const ALL: [ProductCategory; 5] = [
        ProductCategory::Cosmetics,
        ProductCategory::Clothes,
        ProductCategory::Devices,
        ProductCategory::HomeItems,
        ProductCategory::Other,
    ];

    /// Returns the label used in backups and on screen.
    pub fn label(&self) -> &'static str {
        match self {
            ProductCategory::Cosmetics => "Cosmetics",
            ProductCategory::Clothes => "Clothes",
            ProductCategory::Devices => "Devices",
            ProductCategory::HomeItems => "Home Items",
            ProductCategory::Other => "Other",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Payment Type
// =============================================================================

/// Whether the full amount was collected at transaction time.
///
/// On customers this is a standing preference. On sales and purchases it is
/// a derived flag: `Cash` once the record is fully paid, `Credit` while a
/// balance remains. Balance math never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
pub enum PaymentType {
    Cash,
    #[default]
    Credit,
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentType::Cash => write!(f, "Cash"),
            PaymentType::Credit => write!(f, "Credit"),
        }
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A partial (or full) settlement of a sale or purchase.
///
/// Payments only exist inside their parent record and are never addressed
/// on their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    /// Unique identifier within the parent record.
    pub id: String,

    /// Amount paid, always positive.
    pub amount: Money,

    /// When the money changed hands.
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
}

/// A payment as entered on a form, before it receives an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPayment {
    pub amount: Money,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
}

impl NewPayment {
    pub fn new(amount: Money, date: DateTime<Utc>) -> Self {
        NewPayment { amount, date }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product the shop buys and sells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    pub category: ProductCategory,

    /// Current buying price per unit.
    pub cost_price: Money,

    /// Default selling price per unit.
    pub selling_price: Money,

    /// On-hand quantity. Maintained by the stock ledger only.
    pub stock: i64,
}

impl Product {
    /// Margin per unit at the current prices.
    pub fn unit_margin(&self) -> Money {
        self.selling_price - self.cost_price
    }
}

/// Fields needed to add a product. Stock always starts at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub category: ProductCategory,
    pub cost_price: Money,
    pub selling_price: Money,
}

/// Editable product fields. Stock is deliberately absent.
pub type ProductUpdate = NewProduct;

// =============================================================================
// Customer
// =============================================================================

/// A customer the shop sells to, possibly on credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    /// Informational: how this customer usually pays.
    #[serde(default)]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub notes: String,
}

/// Customer fields used for both create and update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomerDetails {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub notes: String,
}

impl Customer {
    /// Builds a customer from form details under the given id.
    pub fn from_details(id: impl Into<String>, details: CustomerDetails) -> Self {
        Customer {
            id: id.into(),
            name: details.name,
            phone: details.phone,
            address: details.address,
            payment_type: details.payment_type,
            notes: details.notes,
        }
    }
}

// =============================================================================
// Supplier
// =============================================================================

/// A supplier the shop buys stock from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
}

/// Supplier fields used for both create and update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SupplierDetails {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
}

impl Supplier {
    /// Builds a supplier from form details under the given id.
    pub fn from_details(id: impl Into<String>, details: SupplierDetails) -> Self {
        Supplier {
            id: id.into(),
            name: details.name,
            phone: details.phone,
            address: details.address,
            notes: details.notes,
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale of one product line to one customer.
///
/// ## Lifecycle
/// ```text
/// record_sale ──► stock −= quantity, payments = down payment (optional)
///      │
///      ├── record_sale_payment / delete_sale_payment  (stock untouched)
///      │
///      ├── edit_sale ──► reverse old stock effect, apply new one
///      │
///      └── delete_sale ──► stock += quantity, record removed
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub customer_id: String,
    pub product_id: String,

    /// Units sold, always positive.
    pub quantity: i64,

    /// Price per unit at the time of sale (may differ from the list price).
    pub unit_price: Money,

    /// Always `quantity × unit_price`.
    pub total_amount: Money,

    #[ts(as = "String")]
    pub date: DateTime<Utc>,

    #[serde(default)]
    pub payments: Vec<Payment>,

    /// Cash once fully paid, Credit otherwise.
    #[serde(default)]
    pub payment_type: PaymentType,

    /// Product cost price captured when the sale was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<Money>,
}

/// Form input for a new sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewSale {
    pub customer_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    /// Down payment(s) taken at the counter.
    #[serde(default)]
    pub payments: Vec<NewPayment>,
}

/// Editable sale fields. Payments are kept as they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleUpdate {
    pub customer_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
}

// =============================================================================
// Purchase
// =============================================================================

/// A restocking purchase of one product line, optionally from a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Purchase {
    pub id: String,
    pub product_id: String,

    /// Walk-in cash purchases may have no supplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<String>,

    /// Units bought, always positive.
    pub quantity: i64,

    /// Price paid per unit.
    pub cost_price: Money,

    /// Always `quantity × cost_price`.
    pub total_amount: Money,

    #[ts(as = "String")]
    pub date: DateTime<Utc>,

    pub purchase_type: PaymentType,

    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl Purchase {
    /// A purchase is on account when bought on credit or when payments
    /// were ever recorded against it.
    pub fn is_on_account(&self) -> bool {
        self.purchase_type == PaymentType::Credit || !self.payments.is_empty()
    }
}

/// Form input for a new purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewPurchase {
    pub product_id: String,
    #[serde(default)]
    pub supplier_id: Option<String>,
    pub quantity: i64,
    pub cost_price: Money,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub purchase_type: PaymentType,
    /// Down payment(s) on a credit purchase.
    #[serde(default)]
    pub payments: Vec<NewPayment>,
}

/// Editable purchase fields. Payments are kept as they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PurchaseUpdate {
    pub product_id: String,
    #[serde(default)]
    pub supplier_id: Option<String>,
    pub quantity: i64,
    pub cost_price: Money,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub purchase_type: PaymentType,
}

// =============================================================================
// Ledger Snapshot (backup format)
// =============================================================================

/// The complete state of the five collections.
///
/// This is the backup file format. Field names and nesting match the web
/// app's `AppDataBackup`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub sales: Vec<Sale>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub suppliers: Vec<Supplier>,
    #[serde(default)]
    pub purchases: Vec<Purchase>,
}

impl LedgerSnapshot {
    /// Total number of entities across all collections.
    pub fn len(&self) -> usize {
        self.customers.len()
            + self.sales.len()
            + self.products.len()
            + self.suppliers.len()
            + self.purchases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
