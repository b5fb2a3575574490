//! # Seed Data Generator
//!
//! Populates the ledger with the demo shop used during development.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database (duka.toml / DUKA_DB_PATH)
//! cargo run -p duka-db --bin seed
//!
//! # Specify database path
//! cargo run -p duka-db --bin seed -- --db ./data/duka.db
//! ```
//!
//! ## Generated Data
//! - 5 products across the four main categories, starting at zero stock
//! - 3 customers (two on credit) and 2 suppliers
//! - 5 purchases, then 5 sales, all recorded through the ledger service so
//!   stock and payment flags come out exactly as the shop would see them

use std::env;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use duka_core::{
    CustomerDetails, Money, NewPayment, NewProduct, NewPurchase, NewSale, PaymentType,
    ProductCategory, SupplierDetails,
};
use duka_db::{LedgerConfig, LedgerService};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// (name, category, cost price, selling price)
const PRODUCTS: &[(&str, ProductCategory, i64, i64)] = &[
    ("Handbag", ProductCategory::Clothes, 25_000, 35_000),
    ("Face Cream", ProductCategory::Cosmetics, 10_000, 15_000),
    ("Bluetooth Speaker", ProductCategory::Devices, 60_000, 80_000),
    ("Blender", ProductCategory::HomeItems, 90_000, 120_000),
    ("Lipstick", ProductCategory::Cosmetics, 5_000, 8_000),
];

/// (name, phone, address, payment type, notes)
const CUSTOMERS: &[(&str, &str, &str, PaymentType, &str)] = &[
    (
        "Asha Juma",
        "0712345678",
        "Mbezi Beach, Dar es Salaam",
        PaymentType::Credit,
        "Pays at the end of the month",
    ),
    (
        "John Doe",
        "0655123456",
        "Sinza, Dar es Salaam",
        PaymentType::Cash,
        "",
    ),
    (
        "Fatuma Hamisi",
        "0788990011",
        "Kariakoo, Dar es Salaam",
        PaymentType::Credit,
        "Buys clothes in bulk",
    ),
];

/// (name, phone, address, notes)
const SUPPLIERS: &[(&str, &str, &str, &str)] = &[
    (
        "Kariakoo Supplies",
        "0711112222",
        "Kariakoo",
        "Main supplier for cosmetics",
    ),
    (
        "China Town Electronics",
        "0688998877",
        "Mlimani City",
        "Gadgets supplier",
    ),
];

type SeedPayment = (i64, &'static str);

/// (product, supplier, quantity, cost price, date, type, payments)
const PURCHASES: &[(
    &str,
    Option<&str>,
    i64,
    i64,
    &str,
    PaymentType,
    &[SeedPayment],
)] = &[
    (
        "Handbag",
        Some("Kariakoo Supplies"),
        20,
        25_000,
        "2023-10-15T09:00:00Z",
        PaymentType::Credit,
        &[(300_000, "2023-10-20T09:00:00Z")],
    ),
    (
        "Face Cream",
        Some("Kariakoo Supplies"),
        50,
        10_000,
        "2023-10-16T11:00:00Z",
        PaymentType::Cash,
        &[],
    ),
    (
        "Bluetooth Speaker",
        Some("China Town Electronics"),
        10,
        60_000,
        "2023-10-17T14:00:00Z",
        PaymentType::Credit,
        &[],
    ),
    (
        "Blender",
        None,
        5,
        90_000,
        "2023-10-18T10:00:00Z",
        PaymentType::Cash,
        &[],
    ),
    (
        "Lipstick",
        Some("Kariakoo Supplies"),
        50,
        5_000,
        "2023-10-19T12:00:00Z",
        PaymentType::Credit,
        &[(100_000, "2023-10-25T12:00:00Z")],
    ),
];

/// (customer, product, quantity, unit price, date, payments)
const SALES: &[(&str, &str, i64, i64, &str, &[SeedPayment])] = &[
    (
        "Asha Juma",
        "Handbag",
        1,
        35_000,
        "2023-10-25T10:00:00Z",
        &[(15_000, "2023-10-25T10:00:00Z")],
    ),
    (
        "John Doe",
        "Face Cream",
        2,
        15_000,
        "2023-10-24T14:30:00Z",
        &[(30_000, "2023-10-24T14:30:00Z")],
    ),
    (
        "Fatuma Hamisi",
        "Bluetooth Speaker",
        1,
        80_000,
        "2023-10-22T09:00:00Z",
        &[],
    ),
    (
        "Asha Juma",
        "Blender",
        1,
        120_000,
        "2023-10-20T11:00:00Z",
        &[
            (50_000, "2023-10-20T11:00:00Z"),
            (30_000, "2023-10-28T15:00:00Z"),
        ],
    ),
    (
        "Asha Juma",
        "Lipstick",
        2,
        8_000,
        "2023-10-29T11:00:00Z",
        &[],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Duka Ledger Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: from duka.toml)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = LedgerConfig::load(None)?;
    if let Some(path) = db_path {
        config.database.path = Some(path);
    }

    println!("🌱 Duka Ledger Seed Data Generator");
    println!("==================================");
    println!("Database: {}", config.database_path().display());
    println!();

    let ledger = LedgerService::open(&config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = ledger.database().products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Parties and products first; ids are looked up by name below
    let mut product_ids = Vec::with_capacity(PRODUCTS.len());
    for &(name, category, cost, price) in PRODUCTS {
        let product = ledger
            .add_product(NewProduct {
                name: name.to_string(),
                category,
                cost_price: Money::from_minor(cost),
                selling_price: Money::from_minor(price),
            })
            .await?;
        product_ids.push((name, product.id));
    }

    let mut customer_ids = Vec::with_capacity(CUSTOMERS.len());
    for &(name, phone, address, payment_type, notes) in CUSTOMERS {
        let customer = ledger
            .add_customer(CustomerDetails {
                name: name.to_string(),
                phone: phone.to_string(),
                address: address.to_string(),
                payment_type,
                notes: notes.to_string(),
            })
            .await?;
        customer_ids.push((name, customer.id));
    }

    let mut supplier_ids = Vec::with_capacity(SUPPLIERS.len());
    for &(name, phone, address, notes) in SUPPLIERS {
        let supplier = ledger
            .add_supplier(SupplierDetails {
                name: name.to_string(),
                phone: phone.to_string(),
                address: address.to_string(),
                notes: notes.to_string(),
            })
            .await?;
        supplier_ids.push((name, supplier.id));
    }
    println!(
        "✓ Added {} products, {} customers, {} suppliers",
        product_ids.len(),
        customer_ids.len(),
        supplier_ids.len()
    );

    // Purchases before sales so the stock is there to sell
    for &(product, supplier, quantity, cost, date, purchase_type, payments) in PURCHASES {
        let supplier_id = match supplier {
            Some(name) => Some(lookup(&supplier_ids, name)?),
            None => None,
        };
        ledger
            .record_purchase(NewPurchase {
                product_id: lookup(&product_ids, product)?,
                supplier_id,
                quantity,
                cost_price: Money::from_minor(cost),
                date: parse_date(date)?,
                purchase_type,
                payments: seed_payments(payments)?,
            })
            .await?;
    }
    println!("✓ Recorded {} purchases", PURCHASES.len());

    for &(customer, product, quantity, price, date, payments) in SALES {
        ledger
            .record_sale(NewSale {
                customer_id: lookup(&customer_ids, customer)?,
                product_id: lookup(&product_ids, product)?,
                quantity,
                unit_price: Money::from_minor(price),
                date: parse_date(date)?,
                payments: seed_payments(payments)?,
            })
            .await?;
    }
    println!("✓ Recorded {} sales", SALES.len());

    // Quick summary from the same service the UI uses
    let today = NaiveDate::from_ymd_opt(2023, 10, 29).ok_or("invalid summary date")?;
    let summary = ledger.dashboard(today).await?;
    println!();
    println!("  Total sales:       {}", summary.total_sales);
    println!("  Total profit:      {}", summary.total_profit);
    println!("  Receivables:       {}", summary.total_receivables);
    println!("  Payables:          {}", summary.total_payables);
    if let Some(category) = summary.best_selling_category {
        println!("  Best category:     {}", category);
    }

    info!(
        products = product_ids.len(),
        sales = SALES.len(),
        purchases = PURCHASES.len(),
        "Seed complete"
    );
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Installs the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=duka=trace` - Show trace for duka crates only
/// - Default: INFO level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,duka=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn lookup(ids: &[(&str, String)], name: &str) -> Result<String, String> {
    ids.iter()
        .find(|(n, _)| *n == name)
        .map(|(_, id)| id.clone())
        .ok_or_else(|| format!("seed data references unknown name: {}", name))
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn seed_payments(payments: &[SeedPayment]) -> Result<Vec<NewPayment>, chrono::ParseError> {
    payments
        .iter()
        .map(|&(amount, date)| Ok(NewPayment::new(Money::from_minor(amount), parse_date(date)?)))
        .collect()
}
