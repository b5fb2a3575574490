//! # Change Feed
//!
//! Publishes the full, updated contents of a collection after every
//! committed write, so screens can re-render without polling.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LedgerService ── commit ──► ChangeFeed::publish_*(Arc<Vec<T>>)         │
//! │                                     │                                   │
//! │                ┌────────────────────┼────────────────────┐              │
//! │                ▼                    ▼                    ▼              │
//! │        subscribe_sales()   subscribe_products()   subscribe_...()       │
//! │        (broadcast::Receiver, one channel per collection)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A lagging receiver skips intermediate versions. Only the latest list
//! matters, so that is fine.

use std::fmt;
use std::sync::Arc;

use duka_core::{Customer, Product, Purchase, Sale, Supplier};
use tokio::sync::broadcast;
use tracing::debug;

/// The five observable collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Customers,
    Suppliers,
    Products,
    Sales,
    Purchases,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collection::Customers => "customers",
            Collection::Suppliers => "suppliers",
            Collection::Products => "products",
            Collection::Sales => "sales",
            Collection::Purchases => "purchases",
        };
        f.write_str(name)
    }
}

/// Latest contents of a collection.
pub type Update<T> = Arc<Vec<T>>;

/// One broadcast channel per collection.
#[derive(Debug)]
pub struct ChangeFeed {
    customers: broadcast::Sender<Update<Customer>>,
    suppliers: broadcast::Sender<Update<Supplier>>,
    products: broadcast::Sender<Update<Product>>,
    sales: broadcast::Sender<Update<Sale>>,
    purchases: broadcast::Sender<Update<Purchase>>,
}

impl ChangeFeed {
    /// Creates a feed whose channels buffer `capacity` updates each.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ChangeFeed {
            customers: broadcast::channel(capacity).0,
            suppliers: broadcast::channel(capacity).0,
            products: broadcast::channel(capacity).0,
            sales: broadcast::channel(capacity).0,
            purchases: broadcast::channel(capacity).0,
        }
    }

    pub fn subscribe_customers(&self) -> broadcast::Receiver<Update<Customer>> {
        self.customers.subscribe()
    }

    pub fn subscribe_suppliers(&self) -> broadcast::Receiver<Update<Supplier>> {
        self.suppliers.subscribe()
    }

    pub fn subscribe_products(&self) -> broadcast::Receiver<Update<Product>> {
        self.products.subscribe()
    }

    pub fn subscribe_sales(&self) -> broadcast::Receiver<Update<Sale>> {
        self.sales.subscribe()
    }

    pub fn subscribe_purchases(&self) -> broadcast::Receiver<Update<Purchase>> {
        self.purchases.subscribe()
    }

    /// Number of live receivers on a collection.
    pub fn receiver_count(&self, collection: Collection) -> usize {
        match collection {
            Collection::Customers => self.customers.receiver_count(),
            Collection::Suppliers => self.suppliers.receiver_count(),
            Collection::Products => self.products.receiver_count(),
            Collection::Sales => self.sales.receiver_count(),
            Collection::Purchases => self.purchases.receiver_count(),
        }
    }

    pub(crate) fn publish_customers(&self, list: Vec<Customer>) {
        Self::send(&self.customers, Collection::Customers, list);
    }

    pub(crate) fn publish_suppliers(&self, list: Vec<Supplier>) {
        Self::send(&self.suppliers, Collection::Suppliers, list);
    }

    pub(crate) fn publish_products(&self, list: Vec<Product>) {
        Self::send(&self.products, Collection::Products, list);
    }

    pub(crate) fn publish_sales(&self, list: Vec<Sale>) {
        Self::send(&self.sales, Collection::Sales, list);
    }

    pub(crate) fn publish_purchases(&self, list: Vec<Purchase>) {
        Self::send(&self.purchases, Collection::Purchases, list);
    }

    fn send<T>(sender: &broadcast::Sender<Update<T>>, collection: Collection, list: Vec<T>) {
        let len = list.len();
        // No receivers is not an error
        match sender.send(Arc::new(list)) {
            Ok(receivers) => debug!(%collection, len, receivers, "Published collection"),
            Err(_) => debug!(%collection, len, "No subscribers"),
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        ChangeFeed::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duka_core::SupplierDetails;

    #[tokio::test]
    async fn test_subscriber_sees_latest_list() {
        let feed = ChangeFeed::new(4);
        let mut rx = feed.subscribe_suppliers();
        assert_eq!(feed.receiver_count(Collection::Suppliers), 1);

        let supplier = Supplier::from_details(
            "sup-1",
            SupplierDetails {
                name: "Kariakoo Wholesale".into(),
                ..Default::default()
            },
        );
        feed.publish_suppliers(vec![supplier.clone()]);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.as_slice(), &[supplier]);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let feed = ChangeFeed::default();
        feed.publish_sales(Vec::new());
        assert_eq!(feed.receiver_count(Collection::Sales), 0);
    }
}
