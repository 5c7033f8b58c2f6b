//! # Seed Data Generator
//!
//! Populates the database with a demo catalog, opening stock, and a few
//! active discounts and promotions for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p meridian-db --bin seed
//!
//! # Specify database path
//! cargo run -p meridian-db --bin seed -- --db ./data/meridian.db
//! ```
//!
//! ## What Gets Seeded
//! - A small minimart catalog (each product with an opening stock level
//!   and a matching opening ledger entry)
//! - `SAVE10`: 10% percentage discount, valid for 30 days
//! - `FLAT5`: $5.00 fixed discount, valid for 30 days
//! - `Snack Week`: promotion backed by SAVE10, attached to the snack SKUs

use chrono::{Duration, Utc};
use std::env;

use meridian_core::{Discount, Money, Product, Promotion, StockEntry};
use meridian_db::{Database, DbConfig};

/// Demo catalog: (sku, name, price in cents, opening stock).
const CATALOG: &[(&str, &str, i64, i64)] = &[
    ("BEV-001", "Cola 330ml", 250, 120),
    ("BEV-002", "Sparkling Water 500ml", 180, 95),
    ("BEV-003", "Orange Juice 1L", 450, 40),
    ("BEV-004", "Cold Brew Coffee", 520, 30),
    ("BEV-005", "Lemon Iced Tea", 300, 60),
    ("SNK-001", "Sea Salt Chips", 350, 80),
    ("SNK-002", "Chocolate Bar", 220, 150),
    ("SNK-003", "Trail Mix 200g", 640, 45),
    ("SNK-004", "Butter Cookies", 480, 55),
    ("SNK-005", "Salted Pretzels", 290, 70),
    ("DRY-001", "Whole Milk 1L", 320, 35),
    ("DRY-002", "Greek Yogurt", 410, 28),
    ("DRY-003", "Cheddar Block 250g", 690, 22),
    ("DRY-004", "Butter 250g", 540, 30),
    ("GRO-001", "Spaghetti 500g", 260, 90),
    ("GRO-002", "Basmati Rice 1kg", 580, 65),
    ("GRO-003", "Canned Tomatoes", 190, 110),
    ("GRO-004", "Peanut Butter 340g", 620, 38),
    ("GRO-005", "Wheat Bread Loaf", 340, 25),
    ("GRO-006", "Olive Oil 500ml", 1150, 18),
    ("HSH-001", "Dish Soap 750ml", 430, 42),
    ("HSH-002", "Paper Towels 2pk", 510, 50),
    ("HSH-003", "Laundry Pods 16ct", 1290, 20),
    ("HSH-004", "Trash Bags 30ct", 780, 33),
];

/// SKUs the demo promotion applies to.
const PROMO_SKUS: &[&str] = &["SNK-001", "SNK-002", "SNK-003", "SNK-004", "SNK-005"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./meridian_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Meridian POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./meridian_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Meridian POS Seed Data Generator");
    println!("===================================");
    println!("Database: {}", db_path);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing products
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Seed the catalog with opening stock in a single atomic unit
    println!();
    println!("Seeding catalog...");

    let start = std::time::Instant::now();

    let mut tx = db.pool().begin().await?;

    for (sku, name, price_cents, opening_stock) in CATALOG {
        let mut product = Product::new(*sku, *name, Money::from_cents(*price_cents));
        product.stock = *opening_stock;

        db.products().insert(&mut tx, &product).await?;

        let entry = StockEntry::new(
            &product.id,
            *opening_stock,
            Some("opening stock".to_string()),
            Some("seed".to_string()),
        );
        db.stock_entries().insert(&mut tx, &entry).await?;
    }

    tx.commit().await?;

    println!("✓ Seeded {} products with opening stock", CATALOG.len());

    // Discounts and a promotion, valid from now for 30 days
    println!();
    println!("Seeding discounts and promotions...");

    let now = Utc::now();
    let ends = now + Duration::days(30);

    let save10 = Discount::percentage("SAVE10", 1000, now, ends);
    db.discounts().insert(&save10).await?;
    println!("  SAVE10: 10% off");

    let flat5 = Discount::fixed("FLAT5", Money::from_cents(500), now, ends);
    db.discounts().insert(&flat5).await?;
    println!("  FLAT5: $5.00 off");

    let promo = Promotion::new("Snack Week", &save10.id, now, ends);
    db.promotions().insert(&promo).await?;

    let mut attached = 0;
    for sku in PROMO_SKUS {
        if let Some(product) = db.products().get_by_sku(sku).await? {
            db.promotions().add_product(&promo.id, &product.id).await?;
            attached += 1;
        }
    }
    println!("  Snack Week: backed by SAVE10, {} eligible products", attached);

    let elapsed = start.elapsed();
    println!();
    println!("✓ Seed complete in {:?}", elapsed);

    Ok(())
}
