//! # Ledger Service
//!
//! The single entry point for every operation that changes stock, payments
//! or the parties they belong to.
//!
//! ## Optimistic Transactions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    run_optimistic(operation)                            │
//! │                                                                         │
//! │  attempt 1..=max_attempts:                                              │
//! │     BEGIN                                                               │
//! │       read rows (value + version)                                       │
//! │       validate with duka-core (stock floor, overpayment, ...)           │
//! │       write  ... WHERE id = ? AND version = ?                           │
//! │     COMMIT ───────────────────────────────► Ok, publish change feed     │
//! │                                                                         │
//! │     Conflict (0 rows / SQLITE_BUSY) ──► ROLLBACK, sleep n × backoff,    │
//! │                                          try again from a fresh read    │
//! │     Any other error ──────────────────► ROLLBACK, return it             │
//! │                                                                         │
//! │  out of attempts ──► TransactionFailed { attempts }                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation either commits all of its writes or none of them.
//!
//! ## Operations
//! - [`sales`]: record / edit / delete a sale
//! - [`purchases`]: record / edit / delete a purchase
//! - [`payments`]: record / delete payments on sales and purchases
//! - [`parties`]: customers, suppliers and products (cascading deletes)
//! - [`reports`]: balances, statements, profit report, dashboard
//! - [`backup`]: snapshot export/restore, backup files, reset

use std::future::Future;

use duka_core::profit::DashboardSettings;
use tracing::{debug, warn};

use crate::changes::{ChangeFeed, Collection};
use crate::config::{LedgerConfig, RetryPolicy};
use crate::error::{DbError, DbResult};
use crate::pool::Database;

pub mod backup;
pub mod parties;
pub mod payments;
pub mod purchases;
pub mod reports;
pub mod sales;

pub use parties::CascadeSummary;
pub use purchases::PurchaseDeletion;

/// Transactional ledger operations over a [`Database`].
///
/// ## Usage
/// ```rust,ignore
/// let ledger = LedgerService::open(&LedgerConfig::load(None)?).await?;
///
/// let sale = ledger.record_sale(new_sale).await?;
/// let balance = ledger.customer_balance(&sale.customer_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct LedgerService {
    db: Database,
    retry: RetryPolicy,
    settings: DashboardSettings,
}

impl LedgerService {
    /// Wraps a database with default retry and report settings.
    pub fn new(db: Database) -> Self {
        LedgerService {
            db,
            retry: RetryPolicy::default(),
            settings: DashboardSettings::default(),
        }
    }

    /// Wraps a database with settings from `config`.
    pub fn with_config(db: Database, config: &LedgerConfig) -> Self {
        LedgerService {
            db,
            retry: config.retry_policy(),
            settings: config.dashboard_settings(),
        }
    }

    /// Connects to the configured database and wraps it.
    pub async fn open(config: &LedgerConfig) -> DbResult<Self> {
        let db = Database::new(config.db_config()).await?;
        Ok(Self::with_config(db, config))
    }

    /// Overrides the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn changes(&self) -> &ChangeFeed {
        self.db.changes()
    }

    pub fn settings(&self) -> DashboardSettings {
        self.settings
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    // =========================================================================
    // Transaction Plumbing
    // =========================================================================

    /// Runs `attempt` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent.
    ///
    /// `attempt` must open, use and commit its own transaction; dropping an
    /// uncommitted transaction rolls it back.
    pub(crate) async fn run_optimistic<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);

        for n in 1..=max_attempts {
            match attempt().await {
                Err(err) if err.is_retryable() => {
                    warn!(
                        operation,
                        attempt = n,
                        max_attempts,
                        error = %err,
                        "Write conflict, retrying"
                    );
                    if n < max_attempts {
                        tokio::time::sleep(self.retry.delay_after(n)).await;
                    }
                }
                result => return result,
            }
        }

        Err(DbError::TransactionFailed {
            attempts: max_attempts,
        })
    }

    /// Sends the current contents of `collections` to subscribers.
    ///
    /// Runs after commit. A failed read is logged and skipped: the write
    /// already happened.
    pub(crate) async fn publish(&self, collections: &[Collection]) {
        let feed = self.db.changes();

        for &collection in collections {
            if feed.receiver_count(collection) == 0 {
                continue;
            }

            let result = match collection {
                Collection::Customers => self
                    .db
                    .customers()
                    .list()
                    .await
                    .map(|list| feed.publish_customers(list)),
                Collection::Suppliers => self
                    .db
                    .suppliers()
                    .list()
                    .await
                    .map(|list| feed.publish_suppliers(list)),
                Collection::Products => self
                    .db
                    .products()
                    .list()
                    .await
                    .map(|list| feed.publish_products(list)),
                Collection::Sales => self
                    .db
                    .sales()
                    .list()
                    .await
                    .map(|list| feed.publish_sales(list)),
                Collection::Purchases => self
                    .db
                    .purchases()
                    .list()
                    .await
                    .map(|list| feed.publish_purchases(list)),
            };

            match result {
                Ok(()) => debug!(%collection, "Change published"),
                Err(e) => warn!(%collection, error = %e, "Failed to publish change"),
            }
        }
    }
}

// =============================================================================
// Test Support
// =============================================================================


#[cfg(test)]
mod tests {
    use super::test_support::ledger;
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_conflicts_are_retried_until_success() {
        let ledger = ledger().await.with_retry_policy(RetryPolicy {
            max_attempts: 5,
            backoff: Duration::from_millis(1),
        });
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = ledger
            .run_optimistic("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(DbError::conflict("Sale", "s1"))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let ledger = ledger().await.with_retry_policy(RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        });
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: DbResult<()> = ledger
            .run_optimistic("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DbError::conflict("Product", "p1"))
            })
            .await;

        assert!(matches!(
            result,
            Err(DbError::TransactionFailed { attempts: 3 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let ledger = ledger().await;
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: DbResult<()> = ledger
            .run_optimistic("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DbError::not_found("Sale", "s1"))
            })
            .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
