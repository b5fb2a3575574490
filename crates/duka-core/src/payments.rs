//! # Payment Ledger
//!
//! Partial payments embedded in sales and purchases, and the outstanding
//! balance they leave behind.
//!
//! ## Balance Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  balance(record) = totalAmount − Σ payments.amount                      │
//! │                                                                         │
//! │  record payment:  0 < amount ≤ balance      else Validation/Overpayment │
//! │  delete payment:  removes exactly one payment, stock untouched          │
//! │  after either:    flag = Cash if balance ≤ 0, Credit otherwise          │
//! │                                                                         │
//! │  Example (total 10,000):                                                │
//! │    pay 7,000  → balance 3,000  Credit                                   │
//! │    pay 4,000  → Overpayment (outstanding 3,000)                         │
//! │    pay 3,000  → balance 0      Cash                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The flag is informational; balance math never reads it.

use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{NewPayment, Payment, PaymentType, Purchase, Sale};
use crate::validation::{validate_new_payments, validate_payment_amount};

// =============================================================================
// Settlement Trait
// =============================================================================

/// A record that carries a total and a list of payments against it.
pub trait Settlement {
    /// Id used in error messages.
    fn record_id(&self) -> &str;

    fn total_amount(&self) -> Money;

    fn payments(&self) -> &[Payment];

    fn payments_mut(&mut self) -> &mut Vec<Payment>;

    /// Stores the derived Cash/Credit flag.
    fn set_settlement(&mut self, payment_type: PaymentType);

    /// Sum of all payments.
    fn total_paid(&self) -> Money {
        self.payments().iter().map(|p| p.amount).sum()
    }

    /// What is still owed. Zero or negative means settled.
    fn balance(&self) -> Money {
        self.total_amount() - self.total_paid()
    }

    fn is_settled(&self) -> bool {
        !self.balance().is_positive()
    }

    /// Recomputes the flag from the current payments.
    fn refresh_settlement(&mut self) {
        let payment_type = settlement_type(self.total_amount(), self.total_paid());
        self.set_settlement(payment_type);
    }
}

impl Settlement for Sale {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn total_amount(&self) -> Money {
        self.total_amount
    }

    fn payments(&self) -> &[Payment] {
        &self.payments
    }

    fn payments_mut(&mut self) -> &mut Vec<Payment> {
        &mut self.payments
    }

    fn set_settlement(&mut self, payment_type: PaymentType) {
        self.payment_type = payment_type;
    }
}

impl Settlement for Purchase {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn total_amount(&self) -> Money {
        self.total_amount
    }

    fn payments(&self) -> &[Payment] {
        &self.payments
    }

    fn payments_mut(&mut self) -> &mut Vec<Payment> {
        &mut self.payments
    }

    fn set_settlement(&mut self, payment_type: PaymentType) {
        self.purchase_type = payment_type;
    }
}

/// Cash when `paid` covers `total`, Credit otherwise.
pub fn settlement_type(total: Money, paid: Money) -> PaymentType {
    if paid >= total {
        PaymentType::Cash
    } else {
        PaymentType::Credit
    }
}

// =============================================================================
// Payment Operations
// =============================================================================

/// Appends a payment with a fresh id and refreshes the flag.
///
/// ## Errors
/// - `Validation` when `amount ≤ 0`
/// - `Overpayment` when `amount` exceeds the outstanding balance
pub fn record_payment<R: Settlement>(record: &mut R, payment: NewPayment) -> CoreResult<Payment> {
    validate_payment_amount(payment.amount)?;

    let outstanding = record.balance();
    if payment.amount > outstanding {
        return Err(CoreError::Overpayment {
            record_id: record.record_id().to_string(),
            outstanding: outstanding.max(Money::zero()),
            attempted: payment.amount,
        });
    }

    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        amount: payment.amount,
        date: payment.date,
    };
    record.payments_mut().push(payment.clone());
    record.refresh_settlement();

    Ok(payment)
}

/// Removes one payment by id and refreshes the flag.
pub fn delete_payment<R: Settlement>(record: &mut R, payment_id: &str) -> CoreResult<Payment> {
    let index = record
        .payments()
        .iter()
        .position(|p| p.id == payment_id)
        .ok_or_else(|| CoreError::not_found("Payment", payment_id))?;

    let removed = record.payments_mut().remove(index);
    record.refresh_settlement();

    Ok(removed)
}

/// Records a payment against a purchase.
///
/// A Cash purchase with no payment history was settled at the counter and
/// takes no further payments.
pub fn record_purchase_payment(
    purchase: &mut Purchase,
    payment: NewPayment,
) -> CoreResult<Payment> {
    if !purchase.is_on_account() {
        return Err(CoreError::CashPurchaseSettled {
            purchase_id: purchase.id.clone(),
        });
    }
    record_payment(purchase, payment)
}

/// Turns down payments from a form into stored payments.
///
/// ## Errors
/// - `Validation` when any amount is not positive
/// - `Overpayment` when their sum exceeds `total` (or does not fit in i64)
pub fn initial_payments(
    record_id: &str,
    total: Money,
    payments: Vec<NewPayment>,
) -> CoreResult<Vec<Payment>> {
    validate_new_payments(&payments)?;

    let offered = payments
        .iter()
        .try_fold(Money::zero(), |sum, p| sum.checked_add(p.amount));
    match offered {
        Some(offered) if offered <= total => {}
        _ => {
            return Err(CoreError::Overpayment {
                record_id: record_id.to_string(),
                outstanding: total,
                attempted: offered.unwrap_or(Money::from_minor(i64::MAX)),
            });
        }
    }

    Ok(payments
        .into_iter()
        .map(|p| Payment {
            id: Uuid::new_v4().to_string(),
            amount: p.amount,
            date: p.date,
        })
        .collect())
}

/// Refuses an edit that would drop the total below what was already paid.
pub fn ensure_total_covers_payments<R: Settlement>(record: &R, new_total: Money) -> CoreResult<()> {
    let paid = record.total_paid();
    if new_total < paid {
        return Err(CoreError::Overpayment {
            record_id: record.record_id().to_string(),
            outstanding: new_total,
            attempted: paid,
        });
    }
    Ok(())
}

/// Type of a purchase given the type picked on the form.
///
/// Without payments the declared type stands. Once payments exist the
/// purchase is on account and the flag follows its balance.
pub fn resolve_purchase_type(
    declared: PaymentType,
    total: Money,
    payments: &[Payment],
) -> PaymentType {
    if payments.is_empty() {
        declared
    } else {
        let paid: Money = payments.iter().map(|p| p.amount).sum();
        settlement_type(total, paid)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
