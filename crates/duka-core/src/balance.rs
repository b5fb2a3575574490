//! # Balance Aggregator
//!
//! Per-party balances, chronological statements and debtor/creditor lists.
//!
//! ## Reconciliation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Customer statement                                                     │
//! │                                                                         │
//! │  date        description                    charge   payment  balance  │
//! │  ──────────  ─────────────────────────────  ───────  ───────  ───────  │
//! │  2024-05-01  Body Lotion (2 x 35,000)        70,000        0   70,000  │
//! │  2024-05-01  Payment                              0   20,000   50,000  │
//! │  2024-05-09  Payment                              0   30,000   20,000  │
//! │                                                                         │
//! │  closing balance (20,000) == Σ balance(sale) for the customer          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here is a pure read over a snapshot of the collections.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::payments::Settlement;
use crate::types::{Customer, Payment, PaymentType, Product, Purchase, Sale, Supplier};

// =============================================================================
// Party Balances
// =============================================================================

/// Σ balance(sale) over the customer's sales.
pub fn customer_balance(customer_id: &str, sales: &[Sale]) -> Money {
    sales
        .iter()
        .filter(|s| s.customer_id == customer_id)
        .map(|s| s.balance())
        .sum()
}

/// Σ balance(purchase) over the supplier's Credit purchases.
pub fn supplier_balance(supplier_id: &str, purchases: &[Purchase]) -> Money {
    purchases
        .iter()
        .filter(|p| p.supplier_id.as_deref() == Some(supplier_id))
        .filter(|p| p.purchase_type == PaymentType::Credit)
        .map(|p| p.balance())
        .sum()
}

/// A party together with what they owe (or are owed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PartyBalance {
    pub party_id: String,
    pub name: String,
    pub balance: Money,
}

/// Customers with a positive balance, largest first.
pub fn debtors(customers: &[Customer], sales: &[Sale]) -> Vec<PartyBalance> {
    let mut owed: HashMap<&str, Money> = HashMap::new();
    for sale in sales {
        *owed.entry(sale.customer_id.as_str()).or_default() += sale.balance();
    }

    rank(customers.iter().map(|c| PartyBalance {
        party_id: c.id.clone(),
        name: c.name.clone(),
        balance: owed.get(c.id.as_str()).copied().unwrap_or_default(),
    }))
}

/// Suppliers the shop still owes, largest first.
pub fn creditors(suppliers: &[Supplier], purchases: &[Purchase]) -> Vec<PartyBalance> {
    let mut owing: HashMap<&str, Money> = HashMap::new();
    for purchase in purchases {
        if purchase.purchase_type != PaymentType::Credit {
            continue;
        }
        if let Some(supplier_id) = purchase.supplier_id.as_deref() {
            *owing.entry(supplier_id).or_default() += purchase.balance();
        }
    }

    rank(suppliers.iter().map(|s| PartyBalance {
        party_id: s.id.clone(),
        name: s.name.clone(),
        balance: owing.get(s.id.as_str()).copied().unwrap_or_default(),
    }))
}

fn rank(parties: impl Iterator<Item = PartyBalance>) -> Vec<PartyBalance> {
    let mut ranked: Vec<PartyBalance> = parties.filter(|p| p.balance.is_positive()).collect();
    ranked.sort_by(|a, b| b.balance.cmp(&a.balance));
    ranked
}

/// Outstanding receivables from customers marked as Credit customers.
pub fn total_receivables(customers: &[Customer], sales: &[Sale]) -> Money {
    customers
        .iter()
        .filter(|c| c.payment_type == PaymentType::Credit)
        .map(|c| customer_balance(&c.id, sales))
        .sum()
}

/// Outstanding payables across every Credit purchase.
pub fn total_payables(purchases: &[Purchase]) -> Money {
    purchases
        .iter()
        .filter(|p| p.purchase_type == PaymentType::Credit)
        .map(|p| p.balance())
        .sum()
}

// =============================================================================
// Statements
// =============================================================================

/// Whether a statement line adds to or reduces the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum EntryKind {
    Charge,
    Payment,
}

/// One line of a party statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatementEntry {
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub kind: EntryKind,

    /// The sale or purchase this line belongs to.
    pub record_id: String,

    /// Set on payment lines.
    pub payment_id: Option<String>,

    /// Set on charge lines whose product still exists.
    pub product_name: Option<String>,

    /// Set on charge lines.
    pub quantity: Option<i64>,
    pub unit_price: Option<Money>,

    pub description: String,
    pub charge: Money,
    pub payment: Money,

    /// Running balance after this line.
    pub balance: Money,
}

/// A chronological account of one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Statement {
    pub party_id: String,
    pub entries: Vec<StatementEntry>,
    pub closing_balance: Money,
}

/// A charge line source shared by sales and purchases.
struct ChargeSource<'a> {
    record_id: &'a str,
    product_id: &'a str,
    quantity: i64,
    unit_price: Money,
    total: Money,
    date: DateTime<Utc>,
    payments: &'a [Payment],
}

/// Statement of every sale and sale payment for a customer.
pub fn customer_statement(customer_id: &str, sales: &[Sale], products: &[Product]) -> Statement {
    let sources = sales
        .iter()
        .filter(|s| s.customer_id == customer_id)
        .map(|s| ChargeSource {
            record_id: &s.id,
            product_id: &s.product_id,
            quantity: s.quantity,
            unit_price: s.unit_price,
            total: s.total_amount,
            date: s.date,
            payments: &s.payments,
        });

    build_statement(customer_id, sources, products)
}

/// Statement of every on-account purchase and its payments for a supplier.
///
/// Cash purchases settled at the counter never enter the supplier's account.
pub fn supplier_statement(
    supplier_id: &str,
    purchases: &[Purchase],
    products: &[Product],
) -> Statement {
    let sources = purchases
        .iter()
        .filter(|p| p.supplier_id.as_deref() == Some(supplier_id))
        .filter(|p| p.is_on_account())
        .map(|p| ChargeSource {
            record_id: &p.id,
            product_id: &p.product_id,
            quantity: p.quantity,
            unit_price: p.cost_price,
            total: p.total_amount,
            date: p.date,
            payments: &p.payments,
        });

    build_statement(supplier_id, sources, products)
}

fn build_statement<'a>(
    party_id: &str,
    sources: impl Iterator<Item = ChargeSource<'a>>,
    products: &[Product],
) -> Statement {
    let names: HashMap<&str, &str> = products
        .iter()
        .map(|p| (p.id.as_str(), p.name.as_str()))
        .collect();

    let mut entries = Vec::new();
    for source in sources {
        let product_name = names.get(source.product_id).map(|n| n.to_string());
        let line = format!("{} x {}", source.quantity, source.unit_price);
        let description = match &product_name {
            Some(name) => format!("{} ({})", name, line),
            None => line,
        };

        entries.push(StatementEntry {
            date: source.date,
            kind: EntryKind::Charge,
            record_id: source.record_id.to_string(),
            payment_id: None,
            product_name,
            quantity: Some(source.quantity),
            unit_price: Some(source.unit_price),
            description,
            charge: source.total,
            payment: Money::zero(),
            balance: Money::zero(),
        });

        for payment in source.payments {
            entries.push(StatementEntry {
                date: payment.date,
                kind: EntryKind::Payment,
                record_id: source.record_id.to_string(),
                payment_id: Some(payment.id.clone()),
                product_name: None,
                quantity: None,
                unit_price: None,
                description: "Payment".to_string(),
                charge: Money::zero(),
                payment: payment.amount,
                balance: Money::zero(),
            });
        }
    }

    // Stable: a charge stays ahead of a payment made at the same instant.
    entries.sort_by_key(|e| e.date);

    let mut running = Money::zero();
    for entry in &mut entries {
        running += entry.charge - entry.payment;
        entry.balance = running;
    }

    Statement {
        party_id: party_id.to_string(),
        entries,
        closing_balance: running,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::record_payment;
    use crate::types::{NewPayment, ProductCategory};
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, 10, 0, 0).unwrap()
    }

    fn customer(id: &str, payment_type: PaymentType) -> Customer {
        Customer {
            id: id.to_string(),
            name: format!("Customer {}", id),
            phone: String::new(),
            address: String::new(),
            payment_type,
            notes: String::new(),
        }
    }

    fn lotion() -> Product {
        Product {
            id: "p1".to_string(),
            name: "Body Lotion".to_string(),
            category: ProductCategory::Cosmetics,
            cost_price: Money::from_minor(25_000),
            selling_price: Money::from_minor(35_000),
            stock: 10,
        }
    }

    fn sale(id: &str, customer_id: &str, qty: i64, price: i64, date: DateTime<Utc>) -> Sale {
        Sale {
            id: id.to_string(),
            customer_id: customer_id.to_string(),
            product_id: "p1".to_string(),
            quantity: qty,
            unit_price: Money::from_minor(price),
            total_amount: Money::from_minor(qty * price),
            date,
            payments: vec![],
            payment_type: PaymentType::Credit,
            unit_cost: None,
        }
    }

    fn credit_purchase(id: &str, supplier_id: &str, total: i64) -> Purchase {
        Purchase {
            id: id.to_string(),
            product_id: "p1".to_string(),
            supplier_id: Some(supplier_id.to_string()),
            quantity: 1,
            cost_price: Money::from_minor(total),
            total_amount: Money::from_minor(total),
            date: day(2),
            purchase_type: PaymentType::Credit,
            payments: vec![],
        }
    }

    #[test]
    fn test_statement_reconciles_with_balance() {
        let mut s1 = sale("s1", "c1", 2, 35_000, day(1));
        record_payment(&mut s1, NewPayment::new(Money::from_minor(20_000), day(1))).unwrap();
        record_payment(&mut s1, NewPayment::new(Money::from_minor(30_000), day(9))).unwrap();
        let s2 = sale("s2", "c1", 1, 35_000, day(5));
        let other = sale("s3", "c2", 1, 35_000, day(3));
        let sales = vec![s1, s2, other];

        let statement = customer_statement("c1", &sales, &[lotion()]);
        assert_eq!(statement.entries.len(), 4);
        assert_eq!(statement.closing_balance, customer_balance("c1", &sales));
        assert_eq!(statement.closing_balance, Money::from_minor(55_000));

        // Chronological, charge ahead of the same-instant down payment.
        let kinds: Vec<EntryKind> = statement.entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntryKind::Charge,
                EntryKind::Payment,
                EntryKind::Charge,
                EntryKind::Payment
            ]
        );
        assert_eq!(statement.entries[0].description, "Body Lotion (2 x 35,000)");
        assert_eq!(statement.entries[1].balance, Money::from_minor(50_000));
    }

    #[test]
    fn test_statement_without_product_name() {
        let sales = vec![sale("s1", "c1", 3, 1_000, day(1))];
        let statement = customer_statement("c1", &sales, &[]);
        assert_eq!(statement.entries[0].product_name, None);
        assert_eq!(statement.entries[0].description, "3 x 1,000");
    }

    #[test]
    fn test_supplier_balance_counts_credit_only() {
        let mut paid_off = credit_purchase("pu1", "s1", 40_000);
        record_payment(&mut paid_off, NewPayment::new(Money::from_minor(40_000), day(3))).unwrap();
        assert_eq!(paid_off.purchase_type, PaymentType::Cash);

        let mut cash = credit_purchase("pu2", "s1", 10_000);
        cash.purchase_type = PaymentType::Cash;

        let open = credit_purchase("pu3", "s1", 25_000);
        let purchases = vec![paid_off, cash, open];

        assert_eq!(supplier_balance("s1", &purchases), Money::from_minor(25_000));

        let statement = supplier_statement("s1", &purchases, &[lotion()]);
        // Cash purchase excluded; the flipped one keeps its history.
        assert_eq!(statement.entries.len(), 3);
        assert_eq!(statement.closing_balance, Money::from_minor(25_000));
    }

    #[test]
    fn test_debtors_and_receivables() {
        let customers = vec![
            customer("c1", PaymentType::Credit),
            customer("c2", PaymentType::Cash),
            customer("c3", PaymentType::Credit),
        ];
        let sales = vec![
            sale("s1", "c1", 1, 10_000, day(1)),
            sale("s2", "c2", 1, 50_000, day(1)),
            sale("s3", "c3", 1, 0, day(1) + Duration::hours(1)),
        ];

        let ranked = debtors(&customers, &sales);
        let ids: Vec<&str> = ranked.iter().map(|p| p.party_id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);

        // Cash customers are excluded from the dashboard receivables.
        assert_eq!(total_receivables(&customers, &sales), Money::from_minor(10_000));
    }

    #[test]
    fn test_creditors_and_payables() {
        let suppliers = vec![Supplier {
            id: "s1".to_string(),
            name: "Kariakoo Wholesale".to_string(),
            phone: String::new(),
            address: String::new(),
            notes: String::new(),
        }];
        let purchases = vec![
            credit_purchase("pu1", "s1", 30_000),
            credit_purchase("pu2", "s9", 5_000),
        ];

        let ranked = creditors(&suppliers, &purchases);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].balance, Money::from_minor(30_000));
        assert_eq!(total_payables(&purchases), Money::from_minor(35_000));
    }
}
