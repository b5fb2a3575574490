//! # Reports
//!
//! Read-only views over the ledger: party balances and statements,
//! debtor/creditor lists, the profit report, the dashboard and the stock
//! audit.
//!
//! Each call reads the rows it needs inside one read transaction, then hands
//! them to the pure functions in `duka_core::balance`, `duka_core::profit`
//! and `duka_core::stock`.

use chrono::NaiveDate;
use duka_core::balance::{self, PartyBalance, Statement};
use duka_core::profit::{self, CategorySales, DashboardSummary, DateRange, ProfitReport};
use duka_core::stock::{self, StockDiscrepancy};
use duka_core::{CoreError, Money, Product, Purchase, Sale};
use sqlx::SqliteConnection;

use super::LedgerService;
use crate::error::DbResult;
use crate::repository::customer::CustomerRepository;
use crate::repository::product::ProductRepository;
use crate::repository::purchase::PurchaseRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::supplier::SupplierRepository;

impl LedgerService {
    // =========================================================================
    // Party Balances
    // =========================================================================

    /// What a customer still owes across all of their sales.
    ///
    /// ## Errors
    /// - `NotFound` when the customer does not exist
    pub async fn customer_balance(&self, customer_id: &str) -> DbResult<Money> {
        let mut conn = self.db.pool().acquire().await?;
        let sales = customer_sales(&mut conn, customer_id).await?;
        Ok(balance::customer_balance(customer_id, &sales))
    }

    /// What the shop still owes a supplier on Credit purchases.
    ///
    /// ## Errors
    /// - `NotFound` when the supplier does not exist
    pub async fn supplier_balance(&self, supplier_id: &str) -> DbResult<Money> {
        let mut conn = self.db.pool().acquire().await?;
        let purchases = supplier_purchases(&mut conn, supplier_id).await?;
        Ok(balance::supplier_balance(supplier_id, &purchases))
    }

    /// Chronological charges and payments for a customer.
    pub async fn customer_statement(&self, customer_id: &str) -> DbResult<Statement> {
        let mut tx = self.db.pool().begin().await?;
        let sales = customer_sales(&mut tx, customer_id).await?;
        let products = ProductRepository::fetch_all(&mut tx).await?;
        tx.commit().await?;

        Ok(balance::customer_statement(customer_id, &sales, &products))
    }

    /// Chronological on-account purchases and payments for a supplier.
    pub async fn supplier_statement(&self, supplier_id: &str) -> DbResult<Statement> {
        let mut tx = self.db.pool().begin().await?;
        let purchases = supplier_purchases(&mut tx, supplier_id).await?;
        let products = ProductRepository::fetch_all(&mut tx).await?;
        tx.commit().await?;

        Ok(balance::supplier_statement(supplier_id, &purchases, &products))
    }

    /// Customers who owe money, largest balance first.
    pub async fn debtors(&self) -> DbResult<Vec<PartyBalance>> {
        let mut tx = self.db.pool().begin().await?;
        let customers = CustomerRepository::fetch_all(&mut tx).await?;
        let sales = SaleRepository::fetch_all(&mut tx).await?;
        tx.commit().await?;

        Ok(balance::debtors(&customers, &sales))
    }

    /// Suppliers the shop owes, largest balance first.
    pub async fn creditors(&self) -> DbResult<Vec<PartyBalance>> {
        let mut tx = self.db.pool().begin().await?;
        let suppliers = SupplierRepository::fetch_all(&mut tx).await?;
        let purchases = PurchaseRepository::fetch_all(&mut tx).await?;
        tx.commit().await?;

        Ok(balance::creditors(&suppliers, &purchases))
    }

    // =========================================================================
    // Profit & Dashboard
    // =========================================================================

    /// Sales, purchases and profit for an inclusive range of days.
    pub async fn profit_report(&self, range: DateRange) -> DbResult<ProfitReport> {
        let mut tx = self.db.pool().begin().await?;
        let sales = SaleRepository::fetch_all(&mut tx).await?;
        let purchases = PurchaseRepository::fetch_all(&mut tx).await?;
        let products = ProductRepository::fetch_all(&mut tx).await?;
        tx.commit().await?;

        Ok(profit::profit_report(
            range,
            &sales,
            &purchases,
            &products,
            self.settings.cost_basis,
            self.settings.top_n,
        ))
    }

    /// Units sold per category over all time, largest first.
    pub async fn category_sales(&self) -> DbResult<Vec<CategorySales>> {
        let mut tx = self.db.pool().begin().await?;
        let sales = SaleRepository::fetch_all(&mut tx).await?;
        let products = ProductRepository::fetch_all(&mut tx).await?;
        tx.commit().await?;

        Ok(profit::category_sales(&sales, &products))
    }

    /// The home-screen summary, with the sales trend ending at `today`.
    pub async fn dashboard(&self, today: NaiveDate) -> DbResult<DashboardSummary> {
        let snapshot = self.export_snapshot().await?;
        Ok(profit::dashboard_summary(&snapshot, today, self.settings))
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Products whose stored stock differs from Σ purchases − Σ sales.
    pub async fn audit_stock(&self) -> DbResult<Vec<StockDiscrepancy>> {
        let snapshot = self.export_snapshot().await?;
        Ok(stock::audit_stock(
            &snapshot.products,
            &snapshot.sales,
            &snapshot.purchases,
        ))
    }

    /// Products at or below the configured low-stock threshold, lowest
    /// first. Out-of-stock products are not listed.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let products = self.db.products().list().await?;
        Ok(stock::low_stock(&products, self.settings.low_stock_threshold))
    }
}

async fn customer_sales(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<Vec<Sale>> {
    if CustomerRepository::fetch(conn, customer_id).await?.is_none() {
        return Err(CoreError::not_found("Customer", customer_id).into());
    }
    SaleRepository::fetch_by_customer(conn, customer_id).await
}

async fn supplier_purchases(
    conn: &mut SqliteConnection,
    supplier_id: &str,
) -> DbResult<Vec<Purchase>> {
    if SupplierRepository::fetch(conn, supplier_id).await?.is_none() {
        return Err(CoreError::not_found("Supplier", supplier_id).into());
    }
    let purchases = PurchaseRepository::fetch_versioned_by_supplier(conn, supplier_id).await?;
    Ok(purchases.into_iter().map(|p| p.into_inner()).collect())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::config::LedgerConfig;
    use crate::ledger::LedgerService;
    use chrono::NaiveDate;
    use duka_core::balance::EntryKind;
    use duka_core::profit::{CostBasis, DateRange};
    use duka_core::{NewPayment, NewProduct, PaymentType, ProductCategory};

    fn may(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[tokio::test]
    async fn test_statement_reconciles_with_balance() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Body Lotion", 10).await;
        let customer_id = customer(&ledger, "Asha Mwinyi").await;

        let mut first = sale_input(&customer_id, &product_id, 2, 1_500);
        first.date = at(1, 9);
        first.payments = vec![NewPayment::new(tzs(1_000), at(1, 9))];
        let first = ledger.record_sale(first).await.unwrap();

        let mut second = sale_input(&customer_id, &product_id, 1, 1_500);
        second.date = at(5, 9);
        ledger.record_sale(second).await.unwrap();

        ledger
            .record_sale_payment(&first.id, NewPayment::new(tzs(500), at(3, 12)))
            .await
            .unwrap();

        let statement = ledger.customer_statement(&customer_id).await.unwrap();
        let kinds: Vec<EntryKind> = statement.entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntryKind::Charge,
                EntryKind::Payment,
                EntryKind::Payment,
                EntryKind::Charge
            ]
        );
        assert_eq!(
            statement.entries[0].product_name.as_deref(),
            Some("Body Lotion")
        );

        let balance = ledger.customer_balance(&customer_id).await.unwrap();
        assert_eq!(balance, tzs(3_000));
        assert_eq!(statement.closing_balance, balance);
        assert_eq!(statement.entries.last().unwrap().balance, balance);
    }

    #[tokio::test]
    async fn test_unknown_party_is_not_found() {
        let ledger = ledger().await;
        assert!(ledger
            .customer_statement("nobody")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(ledger
            .supplier_balance("nobody")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_supplier_statement_leaves_out_cash_purchases() {
        let ledger = ledger().await;
        let product_id = product(&ledger, "Kitenge", 4_000, 6_000).await;
        let supplier_id = supplier(&ledger, "Kariakoo Wholesale").await;

        ledger
            .record_purchase(purchase_input(
                &product_id,
                Some(&supplier_id),
                5,
                4_000,
                PaymentType::Credit,
            ))
            .await
            .unwrap();
        ledger
            .record_purchase(purchase_input(
                &product_id,
                Some(&supplier_id),
                2,
                4_000,
                PaymentType::Cash,
            ))
            .await
            .unwrap();

        let statement = ledger.supplier_statement(&supplier_id).await.unwrap();
        assert_eq!(statement.entries.len(), 1);
        assert_eq!(statement.closing_balance, tzs(20_000));

        let creditors = ledger.creditors().await.unwrap();
        assert_eq!(creditors.len(), 1);
        assert_eq!(creditors[0].party_id, supplier_id);
        assert_eq!(creditors[0].balance, tzs(20_000));
    }

    #[tokio::test]
    async fn test_debtors_are_ranked() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Radio", 10).await;
        let small = customer(&ledger, "Neema Said").await;
        let large = customer(&ledger, "Baraka Mushi").await;
        let settled = customer(&ledger, "Amina Juma").await;

        ledger
            .record_sale(sale_input(&small, &product_id, 1, 1_500))
            .await
            .unwrap();
        ledger
            .record_sale(sale_input(&large, &product_id, 3, 1_500))
            .await
            .unwrap();
        let mut paid = sale_input(&settled, &product_id, 1, 1_500);
        paid.payments = vec![NewPayment::new(tzs(1_500), at(2, 10))];
        ledger.record_sale(paid).await.unwrap();

        let debtors = ledger.debtors().await.unwrap();
        let ids: Vec<&str> = debtors.iter().map(|d| d.party_id.as_str()).collect();
        assert_eq!(ids, vec![large.as_str(), small.as_str()]);
    }

    #[tokio::test]
    async fn test_profit_report() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Shoes", 10).await;
        let customer_id = customer(&ledger, "Baraka Mushi").await;

        ledger
            .record_sale(sale_input(&customer_id, &product_id, 2, 1_500))
            .await
            .unwrap();

        let range = DateRange::new(may(1), may(31)).unwrap();
        let report = ledger.profit_report(range).await.unwrap();
        assert_eq!(report.total_sales, tzs(3_000));
        assert_eq!(report.total_purchases, tzs(10_000));
        assert_eq!(report.total_profit, tzs(1_000));
        assert_eq!(report.number_of_sales, 1);
        assert_eq!(report.daily.len(), 1);
        assert_eq!(report.daily[0].date, may(2));
        assert_eq!(report.top_products[0].quantity_sold, 2);

        let empty = ledger.profit_report(DateRange::day(may(3))).await.unwrap();
        assert_eq!(empty.number_of_sales, 0);
        assert!(empty.total_profit.is_zero());
    }

    #[tokio::test]
    async fn test_cost_basis_follows_config() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Shoes", 10).await;
        let customer_id = customer(&ledger, "Baraka Mushi").await;
        ledger
            .record_sale(sale_input(&customer_id, &product_id, 2, 1_500))
            .await
            .unwrap();

        // Cost goes up after the sale
        ledger
            .update_product(
                &product_id,
                NewProduct {
                    name: "Shoes".into(),
                    category: ProductCategory::Clothes,
                    cost_price: tzs(1_200),
                    selling_price: tzs(1_800),
                },
            )
            .await
            .unwrap();

        let range = DateRange::day(may(2));
        let snapshot = ledger.profit_report(range).await.unwrap();
        assert_eq!(snapshot.total_profit, tzs(1_000));

        let mut config = LedgerConfig::default();
        config.ledger.cost_basis = CostBasis::Current;
        let current = LedgerService::with_config(ledger.database().clone(), &config);
        let report = current.profit_report(range).await.unwrap();
        assert_eq!(report.total_profit, tzs(600));
    }

    #[tokio::test]
    async fn test_dashboard() {
        let ledger = ledger().await;
        let product_id = stocked_product(&ledger, "Body Lotion", 6).await;
        let customer_id = customer(&ledger, "Asha Mwinyi").await;

        ledger
            .record_sale(sale_input(&customer_id, &product_id, 2, 1_500))
            .await
            .unwrap();

        let summary = ledger.dashboard(may(2)).await.unwrap();
        assert_eq!(summary.total_sales, tzs(3_000));
        assert_eq!(summary.total_receivables, tzs(3_000));
        assert_eq!(summary.total_profit, tzs(1_000));
        assert_eq!(summary.best_selling_category, Some(ProductCategory::Cosmetics));
        assert_eq!(summary.sales_trend.len(), 7);
        assert_eq!(summary.sales_trend.last().unwrap().sales, tzs(3_000));
        assert_eq!(summary.recent_sales.len(), 1);
        assert_eq!(summary.top_debtors[0].party_id, customer_id);

        // 4 units left, under the default threshold of 5
        assert_eq!(summary.low_stock.len(), 1);
        assert_eq!(ledger.low_stock().await.unwrap()[0].stock, 4);

        let categories = ledger.category_sales().await.unwrap();
        assert_eq!(categories[0].category, ProductCategory::Cosmetics);
        assert_eq!(categories[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_empty_ledger_has_no_best_category() {
        let ledger = ledger().await;
        let summary = ledger.dashboard(may(2)).await.unwrap();
        assert_eq!(summary.best_selling_category, None);
        assert!(summary.total_sales.is_zero());
        assert!(ledger.audit_stock().await.unwrap().is_empty());
    }
}
